//! # Database Connector
//!
//! Opens one authenticated connection per attempt. Ordinary authentication
//! and network failures never surface as errors here: they collapse into
//! [`ConnectOutcome::Failed`], which carries a diagnostic classification for
//! logging and drives the TLS fallback and previous-credential logic.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::RotationError;
use crate::secret::SecretRecord;

pub mod postgres;

pub use postgres::{PgConnector, PgSession};

/// Why an attempt failed at the transport-security layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsFailureKind {
    /// TLS was required but the server does not offer it
    ServerLacksTls,
    /// Certificate chain or hostname verification failed
    HostnameMismatch,
    /// Server policy (pg_hba) rejects the unencrypted attempt
    ServerRequiresTls,
}

impl TlsFailureKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsFailureKind::ServerLacksTls => "server_lacks_tls",
            TlsFailureKind::HostnameMismatch => "hostname_mismatch",
            TlsFailureKind::ServerRequiresTls => "server_requires_tls",
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            TlsFailureKind::ServerLacksTls => {
                "Unable to establish SSL/TLS handshake, SSL/TLS is not enabled on the host"
            }
            TlsFailureKind::HostnameMismatch => {
                "Hostname verification failed when establishing SSL/TLS handshake with host"
            }
            TlsFailureKind::ServerRequiresTls => {
                "Unable to establish connection, SSL/TLS is enforced on the host"
            }
        }
    }
}

/// Negative result of one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectFailure {
    pub tls: Option<TlsFailureKind>,
    pub timed_out: bool,
    pub message: String,
}

impl ConnectFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            tls: None,
            timed_out: false,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn tls(kind: TlsFailureKind, message: impl Into<String>) -> Self {
        Self {
            tls: Some(kind),
            ..Self::new(message)
        }
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(message)
        }
    }
}

/// Result of one connection attempt
#[derive(Debug)]
pub enum ConnectOutcome<S> {
    Connected(S),
    Failed(ConnectFailure),
}

impl<S> ConnectOutcome<S> {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectOutcome::Connected(_))
    }

    /// Session handle, if connected
    pub fn session(self) -> Option<S> {
        match self {
            ConnectOutcome::Connected(session) => Some(session),
            ConnectOutcome::Failed(_) => None,
        }
    }
}

/// An open, authenticated database session
///
/// Sessions are scoped to one step invocation and must be closed before the
/// step returns.
#[async_trait]
pub trait DatabaseSession: Send {
    /// Change `username`'s password to `password` and commit
    async fn set_password(&mut self, username: &str, password: &str)
        -> Result<(), RotationError>;

    /// Run a trivial read-only statement
    async fn check(&mut self) -> Result<(), RotationError>;

    async fn close(self);
}

/// Opens sessions for a credential
#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    type Session: DatabaseSession;

    /// Single attempt with TLS either required (verify-full) or disabled
    async fn connect_and_authenticate(
        &self,
        record: &SecretRecord,
        use_tls: bool,
    ) -> ConnectOutcome<Self::Session>;
}

/// Connect with `record`, honoring its transport-security policy
///
/// Makes at most two attempts: TLS first, then exactly one plaintext attempt
/// when the policy permits fallback.
pub async fn get_connection<C>(connector: &C, record: &SecretRecord) -> ConnectOutcome<C::Session>
where
    C: DatabaseConnector + ?Sized,
{
    let policy = record.ssl_policy();
    let mut last_failure = None;

    for use_tls in policy.attempts() {
        match connector.connect_and_authenticate(record, use_tls).await {
            ConnectOutcome::Connected(session) => {
                info!(
                    host = record.host(),
                    username = record.username(),
                    tls = use_tls,
                    "Successfully established {} connection as user '{}' with host: '{}'",
                    if use_tls { "SSL/TLS" } else { "non SSL/TLS" },
                    record.username(),
                    record.host()
                );
                return ConnectOutcome::Connected(session);
            }
            ConnectOutcome::Failed(failure) => {
                log_failure(record, use_tls, &failure);
                last_failure = Some(failure);
            }
        }
    }

    ConnectOutcome::Failed(
        last_failure.unwrap_or_else(|| ConnectFailure::new("no connection attempt was made")),
    )
}

fn log_failure(record: &SecretRecord, use_tls: bool, failure: &ConnectFailure) {
    match failure.tls {
        Some(kind) => error!(
            host = record.host(),
            username = record.username(),
            tls = use_tls,
            tls_failure = kind.as_str(),
            "{}: {}",
            kind.describe(),
            record.host()
        ),
        None => warn!(
            host = record.host(),
            username = record.username(),
            tls = use_tls,
            timed_out = failure.timed_out,
            error = %failure.message,
            "Connection attempt failed"
        ),
    }
}
