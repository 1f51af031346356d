//! Configuration management

use anyhow::{bail, Context};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::handoff::HandoffKey;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Secret holding the database credential bundle.
pub const DEFAULT_SECRET_ID: &str = "adsum_db_credentials_2";

/// Region of the secrets service.
pub const DEFAULT_SECRET_REGION: &str = "us-west-2";

/// Location of the transactions CSV.
pub const DEFAULT_SOURCE_URL: &str =
    "https://drive.google.com/file/d/1jORbN_ETnT92S_tIrYqYBLJ37aEyrShV/view?usp=sharing";

/// Download timeout in seconds.
pub const DEFAULT_SOURCE_TIMEOUT_SECS: u64 = 60;

/// Maximum connections per stage pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Database connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Rows per multi-row INSERT statement.
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 1000;

/// Largest batch that fits PostgreSQL's 65535 bind parameters at four per row.
pub const MAX_INSERT_BATCH_SIZE: usize = u16::MAX as usize / 4;

/// Daily run time, UTC.
pub const DEFAULT_SCHEDULE_TIME: &str = "00:00";

/// Reruns after a failed scheduled run.
pub const DEFAULT_SCHEDULE_MAX_RETRIES: u32 = 1;

/// Delay between a failed run and its retry, in seconds (5 minutes).
pub const DEFAULT_SCHEDULE_RETRY_DELAY_SECS: u64 = 300;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Key for stage hand-off values
    pub handoff_key: HandoffKey,
    pub secrets: SecretsConfig,
    pub source: SourceConfig,
    pub database: DatabaseConfig,
    pub schedule: ScheduleConfig,
}

/// Secrets service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsConfig {
    pub secret_id: String,
    pub region: String,
    /// Endpoint override, e.g. LocalStack
    pub endpoint: Option<String>,
}

/// Remote source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// Database pool and load configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub insert_batch_size: usize,
}

/// Daily schedule configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Time of day (UTC) to start a run
    pub run_at: NaiveTime,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            secret_id: DEFAULT_SECRET_ID.to_string(),
            region: DEFAULT_SECRET_REGION.to_string(),
            endpoint: None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            timeout_secs: DEFAULT_SOURCE_TIMEOUT_SECS,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DB_CONNECT_TIMEOUT_SECS,
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            run_at: NaiveTime::MIN,
            max_retries: DEFAULT_SCHEDULE_MAX_RETRIES,
            retry_delay_secs: DEFAULT_SCHEDULE_RETRY_DELAY_SECS,
        }
    }
}

impl PipelineConfig {
    /// Configuration with defaults for everything but the key
    pub fn with_key(handoff_key: HandoffKey) -> Self {
        Self {
            handoff_key,
            secrets: SecretsConfig::default(),
            source: SourceConfig::default(),
            database: DatabaseConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Load configuration from `.env`, the environment, and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> anyhow::Result<Self> {
        let key_text = std::env::var("TXN_HANDOFF_KEY")
            .context("TXN_HANDOFF_KEY must be set (generate one with `txn-pipeline keygen`)")?;
        let handoff_key = HandoffKey::parse(&key_text).context("Invalid TXN_HANDOFF_KEY")?;

        let config = Self {
            handoff_key,
            secrets: SecretsConfig {
                secret_id: env_or("TXN_SECRET_ID", DEFAULT_SECRET_ID),
                region: env_or("TXN_SECRET_REGION", DEFAULT_SECRET_REGION),
                endpoint: std::env::var("TXN_SECRETS_ENDPOINT")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
            },
            source: SourceConfig {
                url: env_or("TXN_SOURCE_URL", DEFAULT_SOURCE_URL),
                timeout_secs: env_parse("TXN_SOURCE_TIMEOUT_SECS", DEFAULT_SOURCE_TIMEOUT_SECS)?,
            },
            database: DatabaseConfig {
                max_connections: env_parse("TXN_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
                connect_timeout_secs: env_parse(
                    "TXN_DB_CONNECT_TIMEOUT_SECS",
                    DEFAULT_DB_CONNECT_TIMEOUT_SECS,
                )?,
                insert_batch_size: env_parse("TXN_INSERT_BATCH_SIZE", DEFAULT_INSERT_BATCH_SIZE)?,
            },
            schedule: ScheduleConfig {
                run_at: parse_time_of_day(&env_or("TXN_SCHEDULE_TIME", DEFAULT_SCHEDULE_TIME))?,
                max_retries: env_parse("TXN_SCHEDULE_MAX_RETRIES", DEFAULT_SCHEDULE_MAX_RETRIES)?,
                retry_delay_secs: env_parse(
                    "TXN_SCHEDULE_RETRY_DELAY_SECS",
                    DEFAULT_SCHEDULE_RETRY_DELAY_SECS,
                )?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secrets.secret_id.trim().is_empty() {
            bail!("Secret id cannot be empty");
        }

        if self.secrets.region.trim().is_empty() {
            bail!("Secret region cannot be empty");
        }

        if !(self.source.url.starts_with("http://") || self.source.url.starts_with("https://")) {
            bail!("Source URL must be http(s): {}", self.source.url);
        }

        if self.source.timeout_secs == 0 {
            bail!("Source timeout must be greater than 0");
        }

        if self.database.max_connections == 0 {
            bail!("Database max_connections must be greater than 0");
        }

        if self.database.insert_batch_size == 0 {
            bail!("Insert batch size must be greater than 0");
        }

        if self.database.insert_batch_size > MAX_INSERT_BATCH_SIZE {
            bail!(
                "Insert batch size ({}) cannot be greater than {}",
                self.database.insert_batch_size,
                MAX_INSERT_BATCH_SIZE
            );
        }

        Ok(())
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", name, value, e)),
        Err(_) => Ok(default),
    }
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(text: &str) -> anyhow::Result<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .with_context(|| format!("Invalid schedule time {:?}, expected HH:MM", text))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "TXN_HANDOFF_KEY",
        "TXN_SECRET_ID",
        "TXN_SECRET_REGION",
        "TXN_SECRETS_ENDPOINT",
        "TXN_SOURCE_URL",
        "TXN_SOURCE_TIMEOUT_SECS",
        "TXN_DB_MAX_CONNECTIONS",
        "TXN_DB_CONNECT_TIMEOUT_SECS",
        "TXN_INSERT_BATCH_SIZE",
        "TXN_SCHEDULE_TIME",
        "TXN_SCHEDULE_MAX_RETRIES",
        "TXN_SCHEDULE_RETRY_DELAY_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn test_key() -> String {
        HandoffKey::from_bytes([3u8; 32]).to_base64()
    }

    #[test]
    #[serial]
    fn defaults_apply() {
        clear_env();
        std::env::set_var("TXN_HANDOFF_KEY", test_key());

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.handoff_key, HandoffKey::from_bytes([3u8; 32]));
        assert_eq!(config.secrets, SecretsConfig::default());
        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.database, DatabaseConfig::default());
        assert_eq!(config.schedule, ScheduleConfig::default());
        assert_eq!(config.schedule.retry_delay(), Duration::from_secs(300));

        clear_env();
    }

    #[test]
    #[serial]
    fn overrides_apply() {
        clear_env();
        std::env::set_var("TXN_HANDOFF_KEY", test_key());
        std::env::set_var("TXN_SECRET_ID", "other_secret");
        std::env::set_var("TXN_SECRETS_ENDPOINT", "http://localhost:4566");
        std::env::set_var("TXN_SOURCE_URL", "https://example.com/t.csv");
        std::env::set_var("TXN_INSERT_BATCH_SIZE", "250");
        std::env::set_var("TXN_SCHEDULE_TIME", "06:30");
        std::env::set_var("TXN_SCHEDULE_MAX_RETRIES", "3");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.secrets.secret_id, "other_secret");
        assert_eq!(config.secrets.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.source.url, "https://example.com/t.csv");
        assert_eq!(config.database.insert_batch_size, 250);
        assert_eq!(config.schedule.run_at, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(config.schedule.max_retries, 3);

        clear_env();
    }

    #[test]
    #[serial]
    fn key_is_required() {
        clear_env();
        let err = PipelineConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TXN_HANDOFF_KEY"));

        std::env::set_var("TXN_HANDOFF_KEY", "too-short");
        assert!(PipelineConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn malformed_numbers_rejected() {
        clear_env();
        std::env::set_var("TXN_HANDOFF_KEY", test_key());
        std::env::set_var("TXN_DB_MAX_CONNECTIONS", "lots");

        let err = PipelineConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("TXN_DB_MAX_CONNECTIONS"));

        std::env::set_var("TXN_DB_MAX_CONNECTIONS", "0");
        assert!(PipelineConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn oversized_insert_batch_rejected() {
        clear_env();
        std::env::set_var("TXN_HANDOFF_KEY", test_key());

        std::env::set_var("TXN_INSERT_BATCH_SIZE", MAX_INSERT_BATCH_SIZE.to_string());
        assert_eq!(
            PipelineConfig::from_env().unwrap().database.insert_batch_size,
            16383
        );

        std::env::set_var("TXN_INSERT_BATCH_SIZE", (MAX_INSERT_BATCH_SIZE + 1).to_string());
        let err = PipelineConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("Insert batch size"));

        clear_env();
    }

    #[test]
    fn time_of_day_forms() {
        assert_eq!(parse_time_of_day("00:00").unwrap(), NaiveTime::MIN);
        assert_eq!(
            parse_time_of_day("23:59:30").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 30).unwrap()
        );
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("midnight").is_err());
    }
}
