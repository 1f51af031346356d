use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use txn_common::{CommonError, ConnectionParams};

use super::{Stage, StageName};
use crate::error::{Result, SecretAccessError, SecretAccessKind};
use crate::handoff::{RunContext, CONNECTION_PARAMS};
use crate::secrets::SecretStore;

/// Reads database credentials from the secret store and seals them
pub struct CredentialLoader {
    secrets: Arc<dyn SecretStore>,
    secret_id: String,
}

impl CredentialLoader {
    pub fn new(secrets: Arc<dyn SecretStore>, secret_id: impl Into<String>) -> Self {
        Self {
            secrets,
            secret_id: secret_id.into(),
        }
    }
}

#[async_trait]
impl Stage for CredentialLoader {
    fn name(&self) -> StageName {
        StageName::Credentials
    }

    fn reads(&self) -> &'static [&'static str] {
        &[]
    }

    fn writes(&self) -> Option<&'static str> {
        Some(CONNECTION_PARAMS.name())
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let payload = self.secrets.secret_string(&self.secret_id).await?;

        let params = ConnectionParams::from_secret_json(&payload).map_err(|err| {
            // serde messages can quote payload values, so only the position is kept
            let message = match err {
                CommonError::Serialization(e) => format!(
                    "payload is not a connection parameter object (line {}, column {})",
                    e.line(),
                    e.column()
                ),
                other => other.to_string(),
            };
            SecretAccessError::new(SecretAccessKind::Malformed, &self.secret_id, message)
        })?;

        ctx.publish(&CONNECTION_PARAMS, &params)?;
        info!(
            secret_id = %self.secret_id,
            host = %params.host,
            dbname = %params.dbname,
            "Connection parameters loaded"
        );
        Ok(())
    }
}
