//! # Rotation Errors
//!
//! Error taxonomy for a single step invocation. Nothing here is retried
//! internally; the invoking platform re-invokes the step instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("Secret {secret_id} is not enabled for rotation")]
    RotationDisabled { secret_id: String },

    #[error("Secret version {token} has no stage for rotation of secret {secret_id}")]
    VersionNotStaged { secret_id: String, token: String },

    #[error("Secret version {token} not set as AWSPENDING for rotation of secret {secret_id}")]
    VersionNotPending { secret_id: String, token: String },

    #[error("Invalid step parameter {step} for secret {secret_id}")]
    UnknownStep { secret_id: String, step: String },

    /// Secret JSON is malformed, lacks a required field, or names an unsupported engine
    #[error("Invalid secret schema: {0}")]
    Schema(String),

    #[error("Unable to log into database with {attempted} secret of secret {secret_id}")]
    Authentication {
        secret_id: String,
        attempted: &'static str,
    },

    /// Pending credential targets a different principal or host than an active one
    #[error("Attempting to modify {field} {pending} other than {against} {expected}")]
    IdentityMismatch {
        field: &'static str,
        pending: String,
        against: &'static str,
        expected: String,
    },

    #[error("Secret store request failed: {0:#}")]
    Store(#[from] anyhow::Error),

    /// Failure after a connection was established (escape lookup, ALTER, test query)
    #[error("Database statement failed: {0}")]
    Database(#[source] sqlx::Error),
}

impl RotationError {
    /// Stable identifier used as a structured log field
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RotationError::RotationDisabled { .. } => "rotation_disabled",
            RotationError::VersionNotStaged { .. } => "version_not_staged",
            RotationError::VersionNotPending { .. } => "version_not_pending",
            RotationError::UnknownStep { .. } => "unknown_step",
            RotationError::Schema(_) => "schema",
            RotationError::Authentication { .. } => "authentication",
            RotationError::IdentityMismatch { .. } => "identity_mismatch",
            RotationError::Store(_) => "store",
            RotationError::Database(_) => "database",
        }
    }

    /// Staging inconsistencies are surfaced before anything is read or mutated
    #[must_use]
    pub fn is_staging_error(&self) -> bool {
        matches!(
            self,
            RotationError::RotationDisabled { .. }
                | RotationError::VersionNotStaged { .. }
                | RotationError::VersionNotPending { .. }
                | RotationError::UnknownStep { .. }
        )
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        RotationError::Schema(message.into())
    }
}
