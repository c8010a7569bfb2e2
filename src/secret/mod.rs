//! # Secret Model
//!
//! Secret record parsing/validation and transport-security resolution.

pub mod record;
pub mod ssl;

pub use record::SecretRecord;
pub use ssl::SslPolicy;
