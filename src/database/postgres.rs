//! # PostgreSQL Connector
//!
//! Single connections over sqlx, verify-full TLS against a pinned root bundle
//! when encryption is required.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{ConnectOptions, Connection, Executor};
use tracing::debug;
use zeroize::Zeroizing;

use super::{ConnectFailure, ConnectOutcome, DatabaseConnector, DatabaseSession, TlsFailureKind};
use crate::config::RotationConfig;
use crate::error::RotationError;
use crate::secret::SecretRecord;

/// SQLSTATE `invalid_authorization_specification`, raised for pg_hba rejections
const SQLSTATE_INVALID_AUTHORIZATION: &str = "28000";

const NO_HBA_ENTRY: &str = "no pg_hba.conf entry";

/// Suffixes PostgreSQL appends to `NO_HBA_ENTRY` for unencrypted connections
const PLAINTEXT_MARKERS: [&str; 2] = ["SSL off", "no encryption"];

const APPLICATION_NAME: &str = "pg-secret-rotator";

#[derive(Debug, Clone)]
pub struct PgConnector {
    ssl_root_cert: PathBuf,
    connect_timeout: Duration,
}

impl PgConnector {
    #[must_use]
    pub fn new(ssl_root_cert: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            ssl_root_cert: ssl_root_cert.into(),
            connect_timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &RotationConfig) -> Self {
        Self::new(&config.ssl_root_cert, config.connect_timeout())
    }

    fn connect_options(&self, record: &SecretRecord, use_tls: bool) -> PgConnectOptions {
        let options = PgConnectOptions::new_without_pgpass()
            .host(record.host())
            .port(record.port())
            .username(record.username())
            .password(record.password())
            .database(record.dbname())
            .application_name(APPLICATION_NAME);

        let options = if use_tls {
            options
                .ssl_mode(PgSslMode::VerifyFull)
                .ssl_root_cert(&self.ssl_root_cert)
        } else {
            options.ssl_mode(PgSslMode::Disable)
        };

        // Statements carry escaped passwords
        options.disable_statement_logging()
    }
}

#[async_trait]
impl DatabaseConnector for PgConnector {
    type Session = PgSession;

    async fn connect_and_authenticate(
        &self,
        record: &SecretRecord,
        use_tls: bool,
    ) -> ConnectOutcome<PgSession> {
        let options = self.connect_options(record, use_tls);

        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options)).await
        {
            Ok(Ok(conn)) => ConnectOutcome::Connected(PgSession { conn }),
            Ok(Err(e)) => ConnectOutcome::Failed(classify_connect_error(&e, use_tls)),
            Err(_elapsed) => ConnectOutcome::Failed(ConnectFailure::timeout(format!(
                "connect timed out after {}s",
                self.connect_timeout.as_secs()
            ))),
        }
    }
}

#[derive(Debug)]
pub struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl DatabaseSession for PgSession {
    async fn set_password(&mut self, username: &str, password: &str) -> Result<(), RotationError> {
        let mut tx = self.conn.begin().await.map_err(RotationError::Database)?;

        // Both values are escaped server-side; the password only travels as a bind parameter
        let (escaped_username, escaped_password): (String, String) =
            sqlx::query_as("SELECT quote_ident($1), quote_literal($2)")
                .bind(username)
                .bind(password)
                .persistent(false)
                .fetch_one(&mut *tx)
                .await
                .map_err(RotationError::Database)?;
        let escaped_password = Zeroizing::new(escaped_password);

        let alter_role = Zeroizing::new(format!(
            "ALTER USER {escaped_username} WITH PASSWORD {}",
            escaped_password.as_str()
        ));
        (&mut *tx)
            .execute(sqlx::raw_sql(alter_role.as_str()))
            .await
            .map_err(RotationError::Database)?;

        tx.commit().await.map_err(RotationError::Database)
    }

    async fn check(&mut self) -> Result<(), RotationError> {
        let mut tx = self.conn.begin().await.map_err(RotationError::Database)?;
        sqlx::query("SELECT NOW()")
            .execute(&mut *tx)
            .await
            .map_err(RotationError::Database)?;
        tx.commit().await.map_err(RotationError::Database)
    }

    async fn close(self) {
        if let Err(e) = self.conn.close().await {
            debug!(error = %e, "Error while closing database connection");
        }
    }
}

/// Map a connect error onto the diagnostic categories
pub fn classify_connect_error(error: &sqlx::Error, use_tls: bool) -> ConnectFailure {
    let message = error.to_string();

    if use_tls {
        if find_rustls_error(error).is_some_and(is_name_mismatch) {
            return ConnectFailure::tls(TlsFailureKind::HostnameMismatch, message);
        }
        if let sqlx::Error::Tls(inner) = error {
            if inner.to_string().contains("does not support") {
                return ConnectFailure::tls(TlsFailureKind::ServerLacksTls, message);
            }
        }
    } else if let sqlx::Error::Database(db) = error {
        if rejects_plaintext(db.code().as_deref(), db.message()) {
            return ConnectFailure::tls(TlsFailureKind::ServerRequiresTls, message);
        }
    }

    ConnectFailure::new(message)
}

/// pg_hba rejected the connection because it was not encrypted
///
/// SQLSTATE 28000 alone also covers unknown roles and explicit `reject` rules.
fn rejects_plaintext(code: Option<&str>, message: &str) -> bool {
    code == Some(SQLSTATE_INVALID_AUTHORIZATION)
        && message.contains(NO_HBA_ENTRY)
        && PLAINTEXT_MARKERS.iter().any(|marker| message.contains(marker))
}

fn is_name_mismatch(error: &rustls::Error) -> bool {
    match error {
        rustls::Error::InvalidCertificate(cert) => {
            matches!(cert, rustls::CertificateError::NotValidForName)
                || format!("{cert:?}").starts_with("NotValidForName")
        }
        _ => false,
    }
}

/// Walk the source chain looking for a rustls error, including ones wrapped in `io::Error`
fn find_rustls_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a rustls::Error> {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(tls) = err.downcast_ref::<rustls::Error>() {
            return Some(tls);
        }
        if let Some(tls) = err
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::get_ref)
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        {
            return Some(tls);
        }
        current = err.source();
    }
    None
}
