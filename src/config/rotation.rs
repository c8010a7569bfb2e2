//! # Rotation Configuration
//!
//! Handler-level settings loaded from environment variables.

use std::time::Duration;

use crate::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_EXCLUDE_CHARACTERS, DEFAULT_EXCLUDE_LOWERCASE,
    DEFAULT_EXCLUDE_NUMBERS, DEFAULT_EXCLUDE_PUNCTUATION, DEFAULT_EXCLUDE_UPPERCASE,
    DEFAULT_PASSWORD_LENGTH, DEFAULT_REQUIRE_EACH_INCLUDED_TYPE, DEFAULT_SSL_ROOT_CERT,
    TRUTHY_VALUES,
};

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Json
        }
    }
}

/// Rotation handler configuration
///
/// Populated once at startup and passed explicitly to the components that need it.
/// All settings have documented defaults and can be overridden via environment
/// variables set on the function.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Secrets Manager endpoint override (`SECRETS_MANAGER_ENDPOINT`)
    /// Typically a VPC endpoint when the function has no internet egress
    pub secrets_manager_endpoint: Option<String>,
    /// Characters excluded from generated passwords
    pub exclude_characters: String,
    /// Generated password length
    pub password_length: i64,
    pub exclude_numbers: bool,
    pub exclude_punctuation: bool,
    pub exclude_uppercase: bool,
    pub exclude_lowercase: bool,
    /// Require at least one character from every class that is not excluded
    pub require_each_included_type: bool,
    /// Trusted-root bundle for verify-full TLS
    pub ssl_root_cert: String,
    /// Per-attempt database connect timeout (seconds)
    pub connect_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            secrets_manager_endpoint: None,
            exclude_characters: DEFAULT_EXCLUDE_CHARACTERS.to_string(),
            password_length: DEFAULT_PASSWORD_LENGTH,
            exclude_numbers: DEFAULT_EXCLUDE_NUMBERS,
            exclude_punctuation: DEFAULT_EXCLUDE_PUNCTUATION,
            exclude_uppercase: DEFAULT_EXCLUDE_UPPERCASE,
            exclude_lowercase: DEFAULT_EXCLUDE_LOWERCASE,
            require_each_included_type: DEFAULT_REQUIRE_EACH_INCLUDED_TYPE,
            ssl_root_cert: DEFAULT_SSL_ROOT_CERT.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            log_format: LogFormat::Json,
        }
    }
}

impl RotationConfig {
    /// Load configuration from the process environment with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            secrets_manager_endpoint: lookup("SECRETS_MANAGER_ENDPOINT")
                .filter(|v| !v.trim().is_empty()),
            exclude_characters: lookup("EXCLUDE_CHARACTERS")
                .unwrap_or_else(|| DEFAULT_EXCLUDE_CHARACTERS.to_string()),
            password_length: parse_or_default(
                lookup("PASSWORD_LENGTH"),
                DEFAULT_PASSWORD_LENGTH,
            ),
            exclude_numbers: parse_bool_or_default(
                lookup("EXCLUDE_NUMBERS"),
                DEFAULT_EXCLUDE_NUMBERS,
            ),
            exclude_punctuation: parse_bool_or_default(
                lookup("EXCLUDE_PUNCTUATION"),
                DEFAULT_EXCLUDE_PUNCTUATION,
            ),
            exclude_uppercase: parse_bool_or_default(
                lookup("EXCLUDE_UPPERCASE"),
                DEFAULT_EXCLUDE_UPPERCASE,
            ),
            exclude_lowercase: parse_bool_or_default(
                lookup("EXCLUDE_LOWERCASE"),
                DEFAULT_EXCLUDE_LOWERCASE,
            ),
            require_each_included_type: parse_bool_or_default(
                lookup("REQUIRE_EACH_INCLUDED_TYPE"),
                DEFAULT_REQUIRE_EACH_INCLUDED_TYPE,
            ),
            ssl_root_cert: lookup("DB_SSL_ROOT_CERT")
                .unwrap_or_else(|| DEFAULT_SSL_ROOT_CERT.to_string()),
            // Zero would expire every attempt before it starts
            connect_timeout_secs: lookup("DB_CONNECT_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            log_format: lookup("LOG_FORMAT")
                .map_or(LogFormat::Json, |v| LogFormat::parse(&v)),
        }
    }

    /// Get the per-attempt connect timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Parse a value or return the default when absent or malformed
fn parse_or_default<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parse a boolean using the truthy set, or return the default when absent
///
/// Any present value outside the truthy set is `false`.
fn parse_bool_or_default(value: Option<String>, default: bool) -> bool {
    value.map_or(default, |v| is_truthy(&v))
}

/// Check a string against the case-insensitive truthy set
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    let lowered = value.to_lowercase();
    TRUTHY_VALUES.contains(&lowered.as_str())
}
