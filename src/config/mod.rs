//! # Configuration
//!
//! Environment-sourced configuration, read once at startup.

pub mod rotation;

pub use rotation::{is_truthy, LogFormat, RotationConfig};
