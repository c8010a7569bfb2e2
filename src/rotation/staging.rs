//! # Staging Validation
//!
//! Checks run before any step is dispatched. Nothing is mutated here.

use crate::error::RotationError;
use crate::provider::{SecretMetadata, VersionStage};

/// Where the requested version sits in the rotation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    /// Version already promoted; every step is a no-op
    AlreadyCurrent,
    /// Version is the rotation candidate
    Pending,
}

/// Validate that `token` is staged for rotation of `secret_id`
///
/// # Errors
///
/// - [`RotationError::RotationDisabled`] if the store reports rotation disabled
///   (an absent flag counts as enabled)
/// - [`RotationError::VersionNotStaged`] if the token has no stage set
/// - [`RotationError::VersionNotPending`] if the token is neither current nor pending
pub fn validate_staging(
    metadata: &SecretMetadata,
    secret_id: &str,
    token: &str,
) -> Result<StagingState, RotationError> {
    if metadata.rotation_enabled == Some(false) {
        return Err(RotationError::RotationDisabled {
            secret_id: secret_id.to_string(),
        });
    }

    let stages = metadata
        .stages_for(token)
        .ok_or_else(|| RotationError::VersionNotStaged {
            secret_id: secret_id.to_string(),
            token: token.to_string(),
        })?;

    let has = |stage: VersionStage| stages.iter().any(|s| s == stage.as_str());

    if has(VersionStage::Current) {
        Ok(StagingState::AlreadyCurrent)
    } else if has(VersionStage::Pending) {
        Ok(StagingState::Pending)
    } else {
        Err(RotationError::VersionNotPending {
            secret_id: secret_id.to_string(),
            token: token.to_string(),
        })
    }
}
