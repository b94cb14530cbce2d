//! Shared types for the wsl-secret-service workspace.
//!
//! This crate provides the common error type, the bus path codec, and the
//! clock helpers used by every other crate in the workspace.

pub mod error;
pub mod paths;
pub mod time;

pub use error::{Error, Result};
