//! # Observability
//!
//! Structured logging for the rotation handler.
//!
//! - `logging`: tracing subscriber setup (JSON or text output)

pub mod logging;

pub use logging::init_tracing;
