//! # finishSecret
//!
//! Promotes the token's version to the current stage. Writes only to the secret store.

use tracing::info;

use super::StepOutcome;
use crate::error::RotationError;
use crate::provider::{SecretMetadata, SecretStore, VersionStage};

/// Move the current label onto `token` in one relabeling request
///
/// `metadata` is the describe response already fetched for staging validation.
pub(crate) async fn finish_secret<S>(
    store: &S,
    metadata: &SecretMetadata,
    secret_id: &str,
    token: &str,
) -> Result<StepOutcome, RotationError>
where
    S: SecretStore + ?Sized,
{
    let current_version = metadata.version_with_stage(VersionStage::Current);

    if current_version == Some(token) {
        info!(
            secret_id = secret_id,
            token = token,
            "finishSecret: Version {} already marked as AWSCURRENT for {}", token, secret_id
        );
        return Ok(StepOutcome::AlreadyCurrent);
    }

    store
        .update_secret_version_stage(secret_id, VersionStage::Current, token, current_version)
        .await?;

    info!(
        secret_id = secret_id,
        token = token,
        previous_version = current_version,
        "finishSecret: Successfully set AWSCURRENT stage to version {} for secret {}",
        token,
        secret_id
    );
    Ok(StepOutcome::Promoted)
}
