//! # Rotation
//!
//! Four-step state machine for single-user password rotation.
//!
//! Every invocation carries a secret id, a client request token (the version
//! being rotated in) and a step name. The step name and the version's staging
//! are validated before anything is read or mutated. Each step is idempotent:
//! re-invoking a step that already took effect is a successful no-op.
//!
//! - `createSecret` writes a pending version to the secret store
//! - `setSecret` applies the pending password to the database
//! - `testSecret` proves the pending credential works
//! - `finishSecret` promotes the pending version to current

mod create_secret;
mod finish_secret;
mod set_secret;
pub mod staging;
mod test_secret;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};

use crate::database::DatabaseConnector;
use crate::error::RotationError;
use crate::password::PasswordPolicy;
use crate::provider::{SecretStore, VersionStage};
use crate::secret::SecretRecord;

pub use staging::{validate_staging, StagingState};

/// Invocation payload delivered by the secret store's rotation scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEvent {
    #[serde(rename = "SecretId")]
    pub secret_id: String,
    #[serde(rename = "ClientRequestToken")]
    pub client_request_token: String,
    #[serde(rename = "Step")]
    pub step: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStep {
    CreateSecret,
    SetSecret,
    TestSecret,
    FinishSecret,
}

impl RotationStep {
    pub const ALL: [RotationStep; 4] = [
        RotationStep::CreateSecret,
        RotationStep::SetSecret,
        RotationStep::TestSecret,
        RotationStep::FinishSecret,
    ];

    /// Parse a step name as sent on the wire (case-sensitive)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == name)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStep::CreateSecret => "createSecret",
            RotationStep::SetSecret => "setSecret",
            RotationStep::TestSecret => "testSecret",
            RotationStep::FinishSecret => "finishSecret",
        }
    }
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Token is already the current version; nothing was done
    AlreadyCurrent,
    PendingCreated,
    /// A pending version already existed for the token
    PendingExists,
    PasswordSet,
    /// The pending credential already authenticated
    PasswordAlreadySet,
    Tested,
    Promoted,
}

impl StepOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::AlreadyCurrent => "already_current",
            StepOutcome::PendingCreated => "pending_created",
            StepOutcome::PendingExists => "pending_exists",
            StepOutcome::PasswordSet => "password_set",
            StepOutcome::PasswordAlreadySet => "password_already_set",
            StepOutcome::Tested => "tested",
            StepOutcome::Promoted => "promoted",
        }
    }

    /// Whether the step changed anything in the store or the database
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            StepOutcome::PendingCreated | StepOutcome::PasswordSet | StepOutcome::Promoted
        )
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatches rotation events against a secret store and a database connector
#[derive(Debug)]
pub struct Rotator<S, C> {
    store: S,
    connector: C,
    password_policy: PasswordPolicy,
}

impl<S, C> Rotator<S, C>
where
    S: SecretStore,
    C: DatabaseConnector,
{
    pub fn new(store: S, connector: C, password_policy: PasswordPolicy) -> Self {
        Self {
            store,
            connector,
            password_policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run one step of the rotation
    ///
    /// # Errors
    ///
    /// Any [`RotationError`]; the error is logged with the secret id, token and
    /// step before it is returned.
    pub async fn handle(&self, event: &RotationEvent) -> Result<StepOutcome, RotationError> {
        let span = info_span!(
            "rotation.step",
            secret.id = %event.secret_id,
            rotation.token = %event.client_request_token,
            rotation.step = %event.step
        );

        async {
            let result = self.dispatch(event).await;
            match &result {
                Ok(outcome) => info!(
                    outcome = outcome.as_str(),
                    mutated = outcome.is_mutation(),
                    "Rotation step {} completed for secret {}",
                    event.step,
                    event.secret_id
                ),
                Err(e) => error!(
                    secret_id = %event.secret_id,
                    token = %event.client_request_token,
                    step = %event.step,
                    error.kind = e.kind(),
                    error.staging = e.is_staging_error(),
                    error = %e,
                    "Rotation step failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, event: &RotationEvent) -> Result<StepOutcome, RotationError> {
        let secret_id = event.secret_id.as_str();
        let token = event.client_request_token.as_str();

        let step =
            RotationStep::from_name(&event.step).ok_or_else(|| RotationError::UnknownStep {
                secret_id: secret_id.to_string(),
                step: event.step.clone(),
            })?;

        let metadata = self.store.describe_secret(secret_id).await?;
        if validate_staging(&metadata, secret_id, token)? == StagingState::AlreadyCurrent {
            info!(
                "Secret version {} already set as AWSCURRENT for secret {}",
                token, secret_id
            );
            return Ok(StepOutcome::AlreadyCurrent);
        }

        match step {
            RotationStep::CreateSecret => {
                create_secret::create_secret(&self.store, &self.password_policy, secret_id, token)
                    .await
            }
            RotationStep::SetSecret => {
                set_secret::set_secret(&self.store, &self.connector, secret_id, token).await
            }
            RotationStep::TestSecret => {
                test_secret::test_secret(&self.store, &self.connector, secret_id, token).await
            }
            RotationStep::FinishSecret => {
                finish_secret::finish_secret(&self.store, &metadata, secret_id, token).await
            }
        }
    }
}

/// Fetch and validate one version; `Ok(None)` when the store has no such version
async fn fetch_record<S>(
    store: &S,
    secret_id: &str,
    stage: VersionStage,
    version_id: Option<&str>,
) -> Result<Option<SecretRecord>, RotationError>
where
    S: SecretStore + ?Sized,
{
    match store.get_secret_value(secret_id, stage, version_id).await? {
        Some(raw) => SecretRecord::parse(&raw).map(Some),
        None => Ok(None),
    }
}

/// Like [`fetch_record`], but a missing version is a store error
async fn require_record<S>(
    store: &S,
    secret_id: &str,
    stage: VersionStage,
    version_id: Option<&str>,
) -> Result<SecretRecord, RotationError>
where
    S: SecretStore + ?Sized,
{
    fetch_record(store, secret_id, stage, version_id)
        .await?
        .ok_or_else(|| match version_id {
            Some(version) => anyhow::anyhow!(
                "Secret {secret_id} has no {stage} version with id {version}"
            ),
            None => anyhow::anyhow!("Secret {secret_id} has no {stage} version"),
        })
        .map_err(RotationError::from)
}
