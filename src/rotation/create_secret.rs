//! # createSecret
//!
//! Ensures a pending version exists for the token. Writes only to the secret store.

use tracing::info;

use super::{fetch_record, require_record, StepOutcome};
use crate::error::RotationError;
use crate::password::{generate_password, PasswordPolicy};
use crate::provider::{SecretStore, VersionStage};

/// Generate and store a pending version unless one already exists for `token`
///
/// The pending record is the current record with only its password replaced.
pub(crate) async fn create_secret<S>(
    store: &S,
    policy: &PasswordPolicy,
    secret_id: &str,
    token: &str,
) -> Result<StepOutcome, RotationError>
where
    S: SecretStore + ?Sized,
{
    let current = require_record(store, secret_id, VersionStage::Current, None).await?;

    if fetch_record(store, secret_id, VersionStage::Pending, Some(token))
        .await?
        .is_some()
    {
        info!(
            secret_id = secret_id,
            token = token,
            "createSecret: Successfully retrieved secret for {}", secret_id
        );
        return Ok(StepOutcome::PendingExists);
    }

    let password = generate_password(store, policy).await?;
    let pending = current.with_password(&password);
    let secret_string = pending.to_secret_string()?;

    store
        .put_secret_value(secret_id, token, &secret_string, &[VersionStage::Pending])
        .await?;

    info!(
        secret_id = secret_id,
        token = token,
        "createSecret: Successfully put secret for {} and version {}", secret_id, token
    );
    Ok(StepOutcome::PendingCreated)
}
