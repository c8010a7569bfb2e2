//! # Secret Record
//!
//! Validated view of a database credential secret. Records are never
//! persisted locally; they live for the duration of one step invocation.

use serde_json::{Map, Value};
use zeroize::Zeroizing;

use super::ssl::SslPolicy;
use crate::constants::{DEFAULT_DBNAME, DEFAULT_PORT, SUPPORTED_ENGINES};
use crate::error::RotationError;

const REQUIRED_FIELDS: [&str; 3] = ["host", "username", "password"];

/// Database credential as stored in the secret
///
/// Unknown JSON fields are carried through untouched so a regenerated pending
/// version differs from the current one only in its password.
#[derive(Clone)]
pub struct SecretRecord {
    /// Every field of the secret except `password`
    fields: Map<String, Value>,
    password: Zeroizing<String>,
    engine: String,
    host: String,
    username: String,
    dbname: String,
    port: u16,
}

impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("dbname", &self.dbname)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl SecretRecord {
    /// Parse and validate a secret string
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Schema`] if the string is not a JSON object, the
    /// engine is missing or unsupported, a required field is missing or not a
    /// string, or `port`/`dbname` are malformed.
    pub fn parse(secret_string: &str) -> Result<Self, RotationError> {
        let value: Value = serde_json::from_str(secret_string)
            .map_err(|e| RotationError::schema(format!("secret is not valid JSON: {e}")))?;
        let Value::Object(mut fields) = value else {
            return Err(RotationError::schema("secret JSON must be an object"));
        };

        let engine = match fields.get("engine") {
            Some(Value::String(engine)) if SUPPORTED_ENGINES.contains(&engine.as_str()) => {
                engine.clone()
            }
            _ => {
                return Err(RotationError::schema(format!(
                    "Database engine must be set to one of {SUPPORTED_ENGINES:?} in order to use this rotation handler"
                )))
            }
        };

        for field in REQUIRED_FIELDS {
            match fields.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(RotationError::schema(format!(
                        "{field} key must be a string"
                    )))
                }
                None => {
                    return Err(RotationError::schema(format!(
                        "{field} key is missing from secret JSON"
                    )))
                }
            }
        }

        let password = match fields.remove("password") {
            Some(Value::String(password)) => Zeroizing::new(password),
            _ => return Err(RotationError::schema("password key is missing from secret JSON")),
        };
        let host = string_field(&fields, "host")?;
        let username = string_field(&fields, "username")?;
        let port = parse_port(fields.get("port"))?;
        let dbname = match fields.get("dbname") {
            None => DEFAULT_DBNAME.to_string(),
            Some(Value::String(dbname)) => dbname.clone(),
            Some(_) => return Err(RotationError::schema("dbname key must be a string")),
        };

        Ok(Self {
            fields,
            password,
            engine,
            host,
            username,
            dbname,
            port,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &str {
        &self.engine
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Raw `ssl` field, if present
    #[must_use]
    pub fn ssl(&self) -> Option<&Value> {
        self.fields.get("ssl")
    }

    #[must_use]
    pub fn ssl_policy(&self) -> SslPolicy {
        SslPolicy::resolve(self.ssl())
    }

    /// Copy of this record carrying a different password
    #[must_use]
    pub fn with_password(&self, password: &str) -> Self {
        let mut record = self.clone();
        record.password = Zeroizing::new(password.to_string());
        record
    }

    /// Replace this record's `ssl` field with `other`'s
    ///
    /// The field is removed when `other` has none, so the resulting policy is
    /// exactly the one `other` would resolve to.
    pub fn inherit_ssl_from(&mut self, other: &SecretRecord) {
        self.fields.remove("ssl");
        if let Some(ssl) = other.ssl() {
            self.fields.insert("ssl".to_string(), ssl.clone());
        }
    }

    /// Serialize back to the secret string format
    ///
    /// # Errors
    ///
    /// Returns [`RotationError::Schema`] if serialization fails.
    pub fn to_secret_string(&self) -> Result<Zeroizing<String>, RotationError> {
        let mut fields = self.fields.clone();
        fields.insert(
            "password".to_string(),
            Value::String(self.password.as_str().to_string()),
        );
        serde_json::to_string(&Value::Object(fields))
            .map(Zeroizing::new)
            .map_err(|e| RotationError::schema(format!("failed to serialize secret: {e}")))
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Result<String, RotationError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| RotationError::schema(format!("{key} key is missing from secret JSON")))
}

/// `port` may be a JSON number or a numeric string
fn parse_port(value: Option<&Value>) -> Result<u16, RotationError> {
    let invalid = || RotationError::schema("port must be an integer between 1 and 65535");
    let port = match value {
        None => return Ok(DEFAULT_PORT),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid)?,
        Some(Value::String(s)) => s.trim().parse::<u64>().ok().ok_or_else(invalid)?,
        Some(_) => return Err(invalid()),
    };
    u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(invalid)
}
