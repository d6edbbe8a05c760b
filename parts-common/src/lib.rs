//! # Parts Common Library
//!
//! Shared code for the auto parts services:
//! - Error types
//! - Configuration file discovery and TOML/ENV loading

pub mod config;
pub mod error;

pub use error::{Error, Result};
