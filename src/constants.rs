//! # Constants
//!
//! Shared constants used throughout the rotation handler.
//!
//! These values represent the documented defaults. The password policy knobs,
//! the trusted-root location and the connect timeout can be overridden via
//! environment variables (see [`crate::config::RotationConfig`]).

/// Stage label of the active credential
pub const STAGE_CURRENT: &str = "AWSCURRENT";

/// Stage label of the candidate credential being rotated in
pub const STAGE_PENDING: &str = "AWSPENDING";

/// Stage label of the last-known-good prior credential
pub const STAGE_PREVIOUS: &str = "AWSPREVIOUS";

/// Engines this handler knows how to rotate
pub const SUPPORTED_ENGINES: &[&str] = &["postgres", "aurora-postgresql"];

/// Port used when the secret does not carry one
pub const DEFAULT_PORT: u16 = 5432;

/// Database used when the secret does not carry a `dbname`
pub const DEFAULT_DBNAME: &str = "postgres";

/// Trusted-root bundle used for verify-full TLS connections
pub const DEFAULT_SSL_ROOT_CERT: &str = "/etc/pki/tls/cert.pem";

/// Per-attempt connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Characters unsafe in shell and URL contexts, excluded from generated passwords
pub const DEFAULT_EXCLUDE_CHARACTERS: &str = ":/@\"'\\";

/// Generated password length
pub const DEFAULT_PASSWORD_LENGTH: i64 = 32;

pub const DEFAULT_EXCLUDE_NUMBERS: bool = false;
pub const DEFAULT_EXCLUDE_PUNCTUATION: bool = true;
pub const DEFAULT_EXCLUDE_UPPERCASE: bool = false;
pub const DEFAULT_EXCLUDE_LOWERCASE: bool = false;
pub const DEFAULT_REQUIRE_EACH_INCLUDED_TYPE: bool = true;

/// Values accepted as `true` for boolean environment variables (compared case-insensitively)
pub const TRUTHY_VALUES: &[&str] = &["true", "1", "y", "yes"];

/// Default tracing filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "pg_secret_rotator=info";
