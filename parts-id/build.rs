//! Build script for parts-id
//!
//! Stamps the binary with the revision, build time and profile that
//! `main` prints in its startup line. Source tarballs without a `.git`
//! directory can supply the revision through `PARTS_BUILD_REVISION`.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rustc-env=GIT_HASH={}", revision());
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_time());
    println!(
        "cargo:rustc-env=BUILD_PROFILE={}",
        env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string())
    );

    println!("cargo:rerun-if-env-changed=PARTS_BUILD_REVISION");
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=src");
}

/// Short commit hash, marked `-dirty` when the tree has local changes
fn revision() -> String {
    if let Ok(revision) = env::var("PARTS_BUILD_REVISION") {
        if !revision.trim().is_empty() {
            return revision.trim().to_string();
        }
    }

    let Some(hash) = git(&["rev-parse", "--short=8", "HEAD"]) else {
        return "unknown".to_string();
    };

    match git(&["status", "--porcelain", "--untracked-files=no"]) {
        Some(changes) if !changes.is_empty() => format!("{}-dirty", hash),
        _ => hash,
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

/// UTC, to match the timestamps the service reports
fn build_time() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
