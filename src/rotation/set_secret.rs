//! # setSecret
//!
//! Applies the pending password to the live database user. Writes only to
//! the database.

use tracing::{info, warn};

use super::{fetch_record, require_record, StepOutcome};
use crate::database::{get_connection, DatabaseConnector, DatabaseSession};
use crate::error::RotationError;
use crate::provider::{SecretStore, VersionStage};
use crate::secret::SecretRecord;

pub(crate) async fn set_secret<S, C>(
    store: &S,
    connector: &C,
    secret_id: &str,
    token: &str,
) -> Result<StepOutcome, RotationError>
where
    S: SecretStore + ?Sized,
    C: DatabaseConnector + ?Sized,
{
    let previous = load_previous(store, secret_id).await?;
    let current = require_record(store, secret_id, VersionStage::Current, None).await?;
    let pending = require_record(store, secret_id, VersionStage::Pending, Some(token)).await?;

    // Pending already authenticates: the password was applied by an earlier invocation
    if let Some(session) = get_connection(connector, &pending).await.session() {
        session.close().await;
        info!(
            secret_id = secret_id,
            "setSecret: AWSPENDING secret is already set as password in PostgreSQL DB for secret {}",
            secret_id
        );
        return Ok(StepOutcome::PasswordAlreadySet);
    }

    ensure_same_identity(&pending, &current, "current user", "current host")?;
    let mut session = get_connection(connector, &current).await.session();

    if session.is_none() {
        if let Some(mut previous) = previous {
            ensure_same_identity(&pending, &previous, "previous valid user", "previous valid host")?;
            previous.inherit_ssl_from(&current);
            session = get_connection(connector, &previous).await.session();
        }
    }

    let Some(mut session) = session else {
        return Err(RotationError::Authentication {
            secret_id: secret_id.to_string(),
            attempted: "previous, current, or pending",
        });
    };

    let result = session
        .set_password(pending.username(), pending.password())
        .await;
    session.close().await;
    result?;

    info!(
        secret_id = secret_id,
        username = pending.username(),
        "setSecret: Successfully set password for user {} in PostgreSQL DB for secret {}",
        pending.username(),
        secret_id
    );
    Ok(StepOutcome::PasswordSet)
}

/// Previous version, treated as absent when missing or malformed
async fn load_previous<S>(store: &S, secret_id: &str) -> Result<Option<SecretRecord>, RotationError>
where
    S: SecretStore + ?Sized,
{
    match fetch_record(store, secret_id, VersionStage::Previous, None).await {
        Ok(previous) => Ok(previous),
        Err(RotationError::Schema(reason)) => {
            warn!(
                secret_id = secret_id,
                reason = %reason,
                "setSecret: Ignoring AWSPREVIOUS version that failed validation"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Rotation must never target a different principal or host than `other`
///
/// Transport policy is not compared; the previous credential takes the current
/// credential's `ssl` setting before connecting.
fn ensure_same_identity(
    pending: &SecretRecord,
    other: &SecretRecord,
    user_label: &'static str,
    host_label: &'static str,
) -> Result<(), RotationError> {
    if pending.username() != other.username() {
        return Err(RotationError::IdentityMismatch {
            field: "user",
            pending: pending.username().to_string(),
            against: user_label,
            expected: other.username().to_string(),
        });
    }
    if pending.host() != other.host() {
        return Err(RotationError::IdentityMismatch {
            field: "user for host",
            pending: pending.host().to_string(),
            against: host_label,
            expected: other.host().to_string(),
        });
    }
    Ok(())
}
