//! Automation command fallback
//!
//! Runs an external program (typically a headless browser script that drives
//! a vision chat UI) with the uploaded photos written to a temporary
//! directory. Image paths are appended to the configured arguments; the
//! program prints its answer on stdout, either as a JSON object or as free
//! text, which goes through the normal reply parser.
//!
//! The child process is killed when the run is cancelled or times out.

use super::{FallbackError, FallbackIdentifier};
use crate::parser::parse_model_reply;
use crate::types::{PartImage, RawIdentification};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Extension written for each image, chosen from its MIME type
fn extension_for(image: &PartImage) -> &'static str {
    match image.content_type.as_str() {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// External automation command
pub struct CommandFallback {
    program: String,
    args: Vec<String>,
}

impl CommandFallback {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv list; `None` when the list is empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn write_images(
        dir: &tempfile::TempDir,
        images: &[PartImage],
    ) -> Result<Vec<PathBuf>, FallbackError> {
        images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                let path = dir.path().join(format!("part_{:02}.{}", index, extension_for(image)));
                std::fs::write(&path, &image.data)
                    .map_err(|e| FallbackError::Failed(format!("Failed to stage image: {}", e)))?;
                Ok(path)
            })
            .collect()
    }
}

#[async_trait]
impl FallbackIdentifier for CommandFallback {
    fn name(&self) -> &str {
        "command"
    }

    async fn identify(
        &self,
        images: Arc<[PartImage]>,
        cancel: CancellationToken,
    ) -> Result<RawIdentification, FallbackError> {
        let staging = tempfile::tempdir()
            .map_err(|e| FallbackError::Failed(format!("Failed to create staging dir: {}", e)))?;
        let paths = Self::write_images(&staging, &images)?;

        debug!(
            program = %self.program,
            image_count = paths.len(),
            "Launching fallback automation command"
        );

        let child = Command::new(&self.program)
            .args(&self.args)
            .args(&paths)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FallbackError::Failed(format!("Failed to launch '{}': {}", self.program, e)))?;

        // Dropping the wait future drops the child, which kills it
        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| FallbackError::Failed(format!("Automation command I/O error: {}", e)))?,
            _ = cancel.cancelled() => return Err(FallbackError::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FallbackError::Failed(format!(
                "Automation command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Err(FallbackError::Failed(
                "Automation command produced no output".to_string(),
            ));
        }

        Ok(parse_model_reply(&stdout)?)
    }
}
