//! # Provider Modules
//!
//! The secret store is an external collaborator reached through a narrow
//! request/response contract. The rotation state machine only depends on the
//! `SecretStore` trait; `aws` is the production implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::constants::{STAGE_CURRENT, STAGE_PENDING, STAGE_PREVIOUS};
use crate::error::RotationError;
use crate::password::PasswordPolicy;

/// Stage labels this handler reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionStage {
    Current,
    Pending,
    Previous,
}

impl VersionStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStage::Current => STAGE_CURRENT,
            VersionStage::Pending => STAGE_PENDING,
            VersionStage::Previous => STAGE_PREVIOUS,
        }
    }
}

impl std::fmt::Display for VersionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rotation-relevant subset of a describe-secret response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretMetadata {
    /// `None` when the store omits the flag
    pub rotation_enabled: Option<bool>,
    pub version_ids_to_stages: HashMap<String, Vec<String>>,
}

impl SecretMetadata {
    /// Stage labels attached to a version, if the version is known
    #[must_use]
    pub fn stages_for(&self, version_id: &str) -> Option<&[String]> {
        self.version_ids_to_stages.get(version_id).map(Vec::as_slice)
    }

    /// Version currently holding `stage`, if any
    #[must_use]
    pub fn version_with_stage(&self, stage: VersionStage) -> Option<&str> {
        self.version_ids_to_stages
            .iter()
            .find(|(_, stages)| stages.iter().any(|s| s == stage.as_str()))
            .map(|(version, _)| version.as_str())
    }
}

/// Versioned secret storage with stage labels
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Rotation flag and version-to-stages map
    async fn describe_secret(&self, secret_id: &str) -> Result<SecretMetadata, RotationError>;

    /// Secret string of the version carrying `stage` (and `version_id`, when given)
    /// Returns `Ok(None)` if no such version exists
    async fn get_secret_value(
        &self,
        secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<Option<Zeroizing<String>>, RotationError>;

    /// Store a new version under `token` with the given stages
    async fn put_secret_value(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[VersionStage],
    ) -> Result<(), RotationError>;

    /// Atomically move `stage` onto `move_to_version`, removing it from `remove_from_version`
    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: VersionStage,
        move_to_version: &str,
        remove_from_version: Option<&str>,
    ) -> Result<(), RotationError>;

    /// Generate one random password according to `policy`
    async fn get_random_password(
        &self,
        policy: &PasswordPolicy,
    ) -> Result<Zeroizing<String>, RotationError>;
}

pub mod aws;

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(entries: &[(&str, &[&str])]) -> SecretMetadata {
        SecretMetadata {
            rotation_enabled: Some(true),
            version_ids_to_stages: entries
                .iter()
                .map(|(v, stages)| {
                    (
                        (*v).to_string(),
                        stages.iter().map(|s| (*s).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_version_with_stage() {
        let meta = metadata(&[
            ("v1", &["AWSPREVIOUS"]),
            ("v2", &["AWSCURRENT"]),
            ("v3", &["AWSPENDING"]),
        ]);
        assert_eq!(meta.version_with_stage(VersionStage::Current), Some("v2"));
        assert_eq!(meta.version_with_stage(VersionStage::Pending), Some("v3"));
        assert_eq!(meta.version_with_stage(VersionStage::Previous), Some("v1"));
        assert_eq!(meta.stages_for("v4"), None);
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(VersionStage::Current.to_string(), "AWSCURRENT");
        assert_eq!(VersionStage::Pending.as_str(), "AWSPENDING");
        assert_eq!(VersionStage::Previous.as_str(), "AWSPREVIOUS");
    }
}
