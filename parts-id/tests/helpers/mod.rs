//! Test Helper Utilities
//!
//! Shared stubs for testing parts-id

#![allow(dead_code)]

pub mod stubs;

pub use stubs::{
    clean_raw, images, low_confidence_raw, orchestrator, ScriptedIdentifier, StubFallback,
};
