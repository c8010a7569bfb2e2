//! Common test utilities
//!
//! Provides rustls crypto provider setup for Pact tests and in-memory stand-ins
//! for the secret store and the database used by the rotation tests.

#![allow(dead_code, reason = "each test binary uses a different subset of helpers")]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use serde_json::{json, Value};
use zeroize::Zeroizing;

use pg_secret_rotator::constants::{STAGE_CURRENT, STAGE_PENDING, STAGE_PREVIOUS};
use pg_secret_rotator::database::{
    ConnectFailure, ConnectOutcome, DatabaseConnector, DatabaseSession, TlsFailureKind,
};
use pg_secret_rotator::password::PasswordPolicy;
use pg_secret_rotator::provider::{SecretMetadata, SecretStore, VersionStage};
use pg_secret_rotator::secret::SecretRecord;
use pg_secret_rotator::RotationError;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Pact's mock server may already have installed the same provider
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
        }
    });
}

pub const SECRET_ID: &str = "arn:aws:secretsmanager:us-east-1:123456789012:secret:prod/app/postgres";
pub const HOST: &str = "db.internal.example.com";

/// Secret JSON for the `app` database with the given user and password
pub fn pg_secret(username: &str, password: &str) -> Value {
    json!({
        "engine": "postgres",
        "host": HOST,
        "username": username,
        "password": password,
        "dbname": "appdb",
        "port": 5432
    })
}

/// `pg_secret` with extra or overridden fields
pub fn pg_secret_with(username: &str, password: &str, extra: &Value) -> Value {
    let mut secret = pg_secret(username, password);
    if let (Some(target), Some(source)) = (secret.as_object_mut(), extra.as_object()) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
    secret
}

// ---------------------------------------------------------------------------
// Secret store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Describe,
    Get {
        stage: String,
        version_id: Option<String>,
    },
    Put {
        token: String,
        stages: Vec<String>,
    },
    UpdateStage {
        stage: String,
        move_to: String,
        remove_from: Option<String>,
    },
    RandomPassword,
}

impl StoreCall {
    pub fn is_mutation(&self) -> bool {
        matches!(self, StoreCall::Put { .. } | StoreCall::UpdateStage { .. })
    }
}

#[derive(Debug, Default)]
struct StoredVersion {
    /// `None` for a version that is staged but has no value yet
    value: Option<String>,
    stages: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    rotation_enabled: Option<bool>,
    versions: BTreeMap<String, StoredVersion>,
    calls: Vec<StoreCall>,
    password_requests: Vec<PasswordPolicy>,
}

/// In-memory secret store following Secrets Manager's stage-label semantics
///
/// A stage label is attached to at most one version. Moving `AWSCURRENT` moves
/// `AWSPREVIOUS` onto the version it was removed from.
#[derive(Debug)]
pub struct FakeSecretStore {
    state: Mutex<StoreState>,
}

impl Default for FakeSecretStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState {
                rotation_enabled: Some(true),
                ..StoreState::default()
            }),
        }
    }

    pub fn with_rotation_enabled(self, enabled: Option<bool>) -> Self {
        self.state.lock().unwrap().rotation_enabled = enabled;
        self
    }

    /// Add a version holding `value` with the given stage labels
    pub fn with_version(self, version_id: &str, value: &Value, stages: &[&str]) -> Self {
        self.with_raw_version(version_id, &value.to_string(), stages)
    }

    pub fn with_raw_version(self, version_id: &str, value: &str, stages: &[&str]) -> Self {
        self.state.lock().unwrap().versions.insert(
            version_id.to_string(),
            StoredVersion {
                value: Some(value.to_string()),
                stages: stages.iter().map(ToString::to_string).collect(),
            },
        );
        self
    }

    /// Token labelled `AWSPENDING` before createSecret has written a value
    pub fn with_staged_token(self, token: &str) -> Self {
        self.state.lock().unwrap().versions.insert(
            token.to_string(),
            StoredVersion {
                value: None,
                stages: vec![STAGE_PENDING.to_string()],
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_mutation).collect()
    }

    pub fn password_requests(&self) -> Vec<PasswordPolicy> {
        self.state.lock().unwrap().password_requests.clone()
    }

    pub fn value_of(&self, version_id: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .versions
            .get(version_id)
            .and_then(|v| v.value.as_deref())
            .map(|raw| serde_json::from_str(raw).expect("stored value is JSON"))
    }

    pub fn stages_of(&self, version_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .versions
            .get(version_id)
            .map(|v| v.stages.clone())
            .unwrap_or_default()
    }

    /// Parsed record at `version_id`
    pub fn record_of(&self, version_id: &str) -> SecretRecord {
        let value = self.value_of(version_id).expect("version has a value");
        SecretRecord::parse(&value.to_string()).expect("stored value is a valid secret")
    }
}

fn detach_stage(versions: &mut BTreeMap<String, StoredVersion>, stage: &str) {
    for version in versions.values_mut() {
        version.stages.retain(|s| s != stage);
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn describe_secret(&self, _secret_id: &str) -> Result<SecretMetadata, RotationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Describe);
        Ok(SecretMetadata {
            rotation_enabled: state.rotation_enabled,
            version_ids_to_stages: state
                .versions
                .iter()
                .map(|(id, v)| (id.clone(), v.stages.clone()))
                .collect(),
        })
    }

    async fn get_secret_value(
        &self,
        _secret_id: &str,
        stage: VersionStage,
        version_id: Option<&str>,
    ) -> Result<Option<Zeroizing<String>>, RotationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::Get {
            stage: stage.as_str().to_string(),
            version_id: version_id.map(ToString::to_string),
        });

        let found = state.versions.iter().find(|(id, v)| {
            v.stages.iter().any(|s| s == stage.as_str())
                && version_id.map_or(true, |wanted| wanted == id.as_str())
        });
        Ok(found
            .and_then(|(_, v)| v.value.clone())
            .map(Zeroizing::new))
    }

    async fn put_secret_value(
        &self,
        _secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[VersionStage],
    ) -> Result<(), RotationError> {
        let mut state = self.state.lock().unwrap();
        let labels: Vec<String> = stages.iter().map(|s| s.as_str().to_string()).collect();
        state.calls.push(StoreCall::Put {
            token: token.to_string(),
            stages: labels.clone(),
        });

        for label in &labels {
            detach_stage(&mut state.versions, label);
        }
        let version = state.versions.entry(token.to_string()).or_default();
        version.value = Some(secret_string.to_string());
        version.stages = labels;
        Ok(())
    }

    async fn update_secret_version_stage(
        &self,
        _secret_id: &str,
        stage: VersionStage,
        move_to_version: &str,
        remove_from_version: Option<&str>,
    ) -> Result<(), RotationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::UpdateStage {
            stage: stage.as_str().to_string(),
            move_to: move_to_version.to_string(),
            remove_from: remove_from_version.map(ToString::to_string),
        });

        let holder = state
            .versions
            .iter()
            .find(|(_, v)| v.stages.iter().any(|s| s == stage.as_str()))
            .map(|(id, _)| id.clone());
        if let Some(holder) = &holder {
            if holder != move_to_version && remove_from_version != Some(holder.as_str()) {
                return Err(anyhow::anyhow!(
                    "InvalidParameterException: {stage} is attached to {holder}"
                )
                .into());
            }
        }

        detach_stage(&mut state.versions, stage.as_str());
        if stage == VersionStage::Current {
            if let Some(old) = remove_from_version {
                detach_stage(&mut state.versions, STAGE_PREVIOUS);
                if let Some(version) = state.versions.get_mut(old) {
                    version.stages.push(STAGE_PREVIOUS.to_string());
                }
            }
        }
        state
            .versions
            .entry(move_to_version.to_string())
            .or_default()
            .stages
            .push(stage.as_str().to_string());
        Ok(())
    }

    async fn get_random_password(
        &self,
        policy: &PasswordPolicy,
    ) -> Result<Zeroizing<String>, RotationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(StoreCall::RandomPassword);
        state.password_requests.push(policy.clone());

        let length = usize::try_from(policy.password_length).unwrap();
        let generation = state.password_requests.len();
        let password: String = format!("Rot{generation}x")
            .chars()
            .chain("aB3cD4eF5".chars().cycle())
            .take(length)
            .collect();
        Ok(Zeroizing::new(password))
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectAttempt {
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbStatement {
    SetPassword { username: String, password: String },
    Check { username: String },
}

#[derive(Debug)]
struct DbState {
    /// (host, username) -> password
    users: HashMap<(String, String), String>,
    tls_enabled: bool,
    tls_required: bool,
    /// Statements on an established session fail
    statements_fail: bool,
    attempts: Vec<ConnectAttempt>,
    statements: Vec<DbStatement>,
    open_sessions: usize,
}

/// In-memory PostgreSQL server that authenticates by (host, username, password)
#[derive(Debug, Clone)]
pub struct FakeDatabase {
    state: Arc<Mutex<DbState>>,
}

impl Default for FakeDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DbState {
                users: HashMap::new(),
                tls_enabled: true,
                tls_required: false,
                statements_fail: false,
                attempts: Vec::new(),
                statements: Vec::new(),
                open_sessions: 0,
            })),
        }
    }

    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .insert((HOST.to_string(), username.to_string()), password.to_string());
        self
    }

    /// Server without TLS support
    pub fn without_tls(self) -> Self {
        self.state.lock().unwrap().tls_enabled = false;
        self
    }

    /// Server rejecting plaintext connections
    pub fn requiring_tls(self) -> Self {
        self.state.lock().unwrap().tls_required = true;
        self
    }

    /// Server that accepts logins but fails every statement
    pub fn with_failing_statements(self) -> Self {
        self.state.lock().unwrap().statements_fail = true;
        self
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&(HOST.to_string(), username.to_string()))
            .cloned()
    }

    pub fn attempts(&self) -> Vec<ConnectAttempt> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn statements(&self) -> Vec<DbStatement> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open_sessions
    }
}

#[derive(Debug)]
pub struct FakeSession {
    state: Arc<Mutex<DbState>>,
    host: String,
    username: String,
}

#[async_trait]
impl DatabaseSession for FakeSession {
    async fn set_password(&mut self, username: &str, password: &str) -> Result<(), RotationError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(DbStatement::SetPassword {
            username: username.to_string(),
            password: password.to_string(),
        });
        if state.statements_fail {
            return Err(statement_error("permission denied to alter role"));
        }
        state
            .users
            .insert((self.host.clone(), username.to_string()), password.to_string());
        Ok(())
    }

    async fn check(&mut self) -> Result<(), RotationError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(DbStatement::Check {
            username: self.username.clone(),
        });
        if state.statements_fail {
            return Err(statement_error("canceling statement due to statement timeout"));
        }
        Ok(())
    }

    async fn close(self) {
        let mut state = self.state.lock().unwrap();
        state.open_sessions -= 1;
    }
}

fn statement_error(message: &str) -> RotationError {
    RotationError::Database(sqlx::Error::Protocol(message.to_string()))
}

#[async_trait]
impl DatabaseConnector for FakeDatabase {
    type Session = FakeSession;

    async fn connect_and_authenticate(
        &self,
        record: &SecretRecord,
        use_tls: bool,
    ) -> ConnectOutcome<FakeSession> {
        let mut state = self.state.lock().unwrap();

        let outcome = if use_tls && !state.tls_enabled {
            Err(ConnectFailure::tls(
                TlsFailureKind::ServerLacksTls,
                "server does not support TLS",
            ))
        } else if !use_tls && state.tls_required {
            Err(ConnectFailure::tls(
                TlsFailureKind::ServerRequiresTls,
                "no pg_hba.conf entry for host, SSL off",
            ))
        } else {
            let key = (record.host().to_string(), record.username().to_string());
            match state.users.get(&key) {
                Some(password) if password == record.password() => Ok(()),
                _ => Err(ConnectFailure::new(format!(
                    "password authentication failed for user \"{}\"",
                    record.username()
                ))),
            }
        };

        state.attempts.push(ConnectAttempt {
            username: record.username().to_string(),
            password: record.password().to_string(),
            use_tls,
            connected: outcome.is_ok(),
        });

        match outcome {
            Ok(()) => {
                state.open_sessions += 1;
                ConnectOutcome::Connected(FakeSession {
                    state: Arc::clone(&self.state),
                    host: record.host().to_string(),
                    username: record.username().to_string(),
                })
            }
            Err(failure) => ConnectOutcome::Failed(failure),
        }
    }
}

/// Stage labels as owned strings, for assertions
pub fn labels(stages: &[&str]) -> Vec<String> {
    stages.iter().map(ToString::to_string).collect()
}

pub const CURRENT: &str = STAGE_CURRENT;
pub const PENDING: &str = STAGE_PENDING;
pub const PREVIOUS: &str = STAGE_PREVIOUS;
