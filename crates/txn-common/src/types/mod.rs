//! Common types used across the workspace

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CommonError, Result};

// ============================================================================
// Connection Parameters
// ============================================================================

/// Credential bundle needed to reach the relational store.
///
/// Decoded from the secret's JSON payload. The password never appears in
/// `Debug` output, so the struct can be logged with `?params`.
///
/// # Examples
///
/// ```rust
/// use txn_common::types::ConnectionParams;
///
/// let params = ConnectionParams::from_secret_json(
///     r#"{"host":"db.internal","port":"5432","dbname":"ledger","user":"etl","password":"s3cret"}"#,
/// ).unwrap();
/// assert_eq!(params.port, 5432);
/// assert!(!format!("{:?}", params).contains("s3cret"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub host: String,

    /// Accepted as a JSON number or a numeric string
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,

    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl ConnectionParams {
    /// Decode and validate a secret payload
    pub fn from_secret_json(json: &str) -> Result<Self> {
        let params: ConnectionParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject payloads that decode but cannot possibly connect
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CommonError::InvalidConnectionParams("host is empty".to_string()));
        }
        if self.dbname.trim().is_empty() {
            return Err(CommonError::InvalidConnectionParams("dbname is empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(CommonError::InvalidConnectionParams("user is empty".to_string()));
        }
        if self.port == 0 {
            return Err(CommonError::InvalidConnectionParams(
                "port must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {:?}", text))),
    }
}

// ============================================================================
// Transaction Record
// ============================================================================

/// A cleaned transaction, ready to be appended to the target table.
///
/// `transaction_id` is the unique key of the target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub user_id: i32,
    pub amount: f64,
    pub transaction_date: NaiveDate,
}
