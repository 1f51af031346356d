//! Secret store access for database credentials

pub mod aws;

use async_trait::async_trait;
use std::collections::HashMap;

pub use aws::AwsSecretsManager;

use crate::error::{SecretAccessError, SecretAccessKind};

/// Resolves a secret id to its string payload
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret_string(&self, secret_id: &str) -> Result<String, SecretAccessError>;
}

/// Secrets held in memory, keyed by secret id
#[derive(Default, Clone)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, secret_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(secret_id.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String, SecretAccessError> {
        self.secrets.get(secret_id).cloned().ok_or_else(|| {
            SecretAccessError::new(
                SecretAccessKind::NotFound,
                secret_id,
                "no such secret in static store",
            )
        })
    }
}
