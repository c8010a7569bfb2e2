//! # AWS Secrets Manager Client
//!
//! Implements [`SecretStore`] on top of the AWS Secrets Manager API.
//!
//! This module provides functionality to:
//! - Describe a secret's rotation flag and version stages
//! - Read and write versioned secret strings
//! - Move stage labels between versions
//! - Generate random passwords server-side

use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use tracing::{debug, info, info_span, Instrument};
use zeroize::Zeroizing;

use crate::config::RotationConfig;
use crate::error::RotationError;
use crate::password::PasswordPolicy;
use crate::provider::{SecretMetadata, SecretStore, VersionStage};

pub mod auth;

/// AWS Secrets Manager store implementation
pub struct AwsSecretsManager {
    client: SecretsManagerClient,
    endpoint: Option<String>,
}

impl std::fmt::Debug for AwsSecretsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsSecretsManager")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AwsSecretsManager {
    /// Create a new AWS Secrets Manager client from the handler configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK configuration cannot be loaded.
    pub async fn new(config: &RotationConfig) -> Result<Self> {
        let endpoint = config.secrets_manager_endpoint.clone();
        let sdk_config = auth::create_sdk_config(endpoint.as_deref()).await?;

        Ok(Self {
            client: SecretsManagerClient::new(&sdk_config),
            endpoint,
        })
    }

    /// Wrap an already configured SDK client
    #[must_use]
    pub fn from_client(client: SecretsManagerClient) -> Self {
        Self {
            client,
            endpoint: None,
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, RotationError> {
        let span = info_span!("aws.secret.describe", secret.id = secret_id);
        let start = Instant::now();

        async move {
            let output = self
                .client
                .describe_secret()
                .secret_id(secret_id)
                .send()
                .await
                .with_context(|| format!("Failed to describe secret {secret_id}"))?;

            debug!(
                duration_ms = start.elapsed().as_millis(),
                versions = output.version_ids_to_stages().map_or(0, |v| v.len()),
                "Described secret"
            );

            Ok::<_, RotationError>(SecretMetadata {
                rotation_enabled: output.rotation_enabled(),
                version_ids_to_stages: output.version_ids_to_stages().cloned().unwrap_or_default(),
            })
        }
        .instrument(span)
        .await
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<Option<Zeroizing<String>>, RotationError> {
        let span = tracing::debug_span!(
            "aws.secret.get",
            secret.id = secret_id,
            secret.stage = stage.as_str(),
            secret.version = version_id
        );
        let start = Instant::now();

        let fetch = async move {
            let response = self
                .client
                .get_secret_value()
                .secret_id(secret_id)
                .version_stage(stage.as_str())
                .set_version_id(version_id.map(ToString::to_string))
                .send()
                .await;

            match response {
                Ok(output) => {
                    debug!(
                        duration_ms = start.elapsed().as_millis(),
                        found = true,
                        "Fetched secret value"
                    );
                    let value = output.secret_string().with_context(|| {
                        format!("Secret {secret_id} at stage {stage} has no SecretString")
                    })?;
                    Ok::<_, RotationError>(Some(Zeroizing::new(value.to_string())))
                }
                Err(e)
                    if e.as_service_error()
                        .is_some_and(GetSecretValueError::is_resource_not_found_exception) =>
                {
                    debug!(
                        duration_ms = start.elapsed().as_millis(),
                        found = false,
                        "Secret version not found"
                    );
                    Ok(None)
                }
                Err(e) => Err(anyhow::Error::new(e)
                    .context(format!(
                        "Failed to get secret {secret_id} at stage {stage}"
                    ))
                    .into()),
            }
        };
        fetch.instrument(span).await
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[VersionStage],
    ) -> Result<(), RotationError> {
        let span = info_span!("aws.secret.put", secret.id = secret_id, secret.version = token);

        async move {
            let request = stages.iter().fold(
                self.client
                    .put_secret_value()
                    .secret_id(secret_id)
                    .client_request_token(token)
                    .secret_string(secret_string),
                |request, stage| request.version_stages(stage.as_str()),
            );

            request
                .send()
                .await
                .with_context(|| format!("Failed to put secret {secret_id} version {token}"))?;

            info!(
                secret_id = secret_id,
                token = token,
                stages = ?stages,
                "Put secret version"
            );
            Ok::<_, RotationError>(())
        }
        .instrument(span)
        .await
    }

    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: VersionStage,
        move_to_version: &str,
        remove_from_version: Option<&str>,
    ) -> Result<(), RotationError> {
        let span = info_span!(
            "aws.secret.update_stage",
            secret.id = secret_id,
            secret.stage = stage.as_str()
        );

        async move {
            self.client
                .update_secret_version_stage()
                .secret_id(secret_id)
                .version_stage(stage.as_str())
                .move_to_version_id(move_to_version)
                .set_remove_from_version_id(remove_from_version.map(ToString::to_string))
                .send()
                .await
                .with_context(|| {
                    format!("Failed to move {stage} to version {move_to_version} of {secret_id}")
                })?;

            info!(
                secret_id = secret_id,
                stage = stage.as_str(),
                move_to = move_to_version,
                remove_from = remove_from_version,
                "Updated secret version stage"
            );
            Ok::<_, RotationError>(())
        }
        .instrument(span)
        .await
    }

    async fn get_random_password(
        &self,
        policy: &PasswordPolicy,
    ) -> Result<Zeroizing<String>, RotationError> {
        let output = self
            .client
            .get_random_password()
            .exclude_characters(&policy.exclude_characters)
            .password_length(policy.password_length)
            .exclude_numbers(policy.exclude_numbers)
            .exclude_punctuation(policy.exclude_punctuation)
            .exclude_uppercase(policy.exclude_uppercase)
            .exclude_lowercase(policy.exclude_lowercase)
            .require_each_included_type(policy.require_each_included_type)
            .send()
            .await
            .context("Failed to generate random password")?;

        let password = output
            .random_password()
            .context("GetRandomPassword response has no RandomPassword")?;
        Ok(Zeroizing::new(password.to_string()))
    }
}
