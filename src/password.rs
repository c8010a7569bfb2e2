//! # Password Generator
//!
//! Assembles the random-password request from configuration. Entropy comes
//! from the secret store's generation capability, not from this process.

use tracing::debug;
use zeroize::Zeroizing;

use crate::config::RotationConfig;
use crate::error::RotationError;
use crate::provider::SecretStore;

/// Parameters of one random-password request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub exclude_characters: String,
    pub password_length: i64,
    pub exclude_numbers: bool,
    pub exclude_punctuation: bool,
    pub exclude_uppercase: bool,
    pub exclude_lowercase: bool,
    pub require_each_included_type: bool,
}

impl PasswordPolicy {
    #[must_use]
    pub fn from_config(config: &RotationConfig) -> Self {
        Self {
            exclude_characters: config.exclude_characters.clone(),
            password_length: config.password_length,
            exclude_numbers: config.exclude_numbers,
            exclude_punctuation: config.exclude_punctuation,
            exclude_uppercase: config.exclude_uppercase,
            exclude_lowercase: config.exclude_lowercase,
            require_each_included_type: config.require_each_included_type,
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}

/// Request one random password from the store
///
/// # Errors
///
/// Propagates the store's error; an empty password is rejected as a store error.
pub async fn generate_password<S>(
    store: &S,
    policy: &PasswordPolicy,
) -> Result<Zeroizing<String>, RotationError>
where
    S: SecretStore + ?Sized,
{
    debug!(
        password.length = policy.password_length,
        password.exclude_punctuation = policy.exclude_punctuation,
        password.require_each_included_type = policy.require_each_included_type,
        "Requesting random password"
    );
    let password = store.get_random_password(policy).await?;
    if password.is_empty() {
        return Err(anyhow::anyhow!("Secret store returned an empty random password").into());
    }
    Ok(password)
}
