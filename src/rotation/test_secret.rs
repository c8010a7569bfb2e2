//! # testSecret
//!
//! Confirms the pending credential authenticates and can run a query. Mutates nothing.

use tracing::info;

use super::{require_record, StepOutcome};
use crate::database::{get_connection, DatabaseConnector, DatabaseSession};
use crate::error::RotationError;
use crate::provider::{SecretStore, VersionStage};

pub(crate) async fn test_secret<S, C>(
    store: &S,
    connector: &C,
    secret_id: &str,
    token: &str,
) -> Result<StepOutcome, RotationError>
where
    S: SecretStore + ?Sized,
    C: DatabaseConnector + ?Sized,
{
    let pending = require_record(store, secret_id, VersionStage::Pending, Some(token)).await?;

    let Some(mut session) = get_connection(connector, &pending).await.session() else {
        return Err(RotationError::Authentication {
            secret_id: secret_id.to_string(),
            attempted: "pending",
        });
    };

    let result = session.check().await;
    session.close().await;
    result?;

    info!(
        secret_id = secret_id,
        "testSecret: Successfully signed into PostgreSQL DB with AWSPENDING secret in {}",
        secret_id
    );
    Ok(StepOutcome::Tested)
}
