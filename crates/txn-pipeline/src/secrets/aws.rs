//! AWS Secrets Manager backend

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::{
    config::Region,
    error::{DisplayErrorContext, ProvideErrorMetadata},
    Client,
};
use tracing::{debug, info, instrument};

use super::SecretStore;
use crate::config::SecretsConfig;
use crate::error::{SecretAccessError, SecretAccessKind};

#[derive(Clone)]
pub struct AwsSecretsManager {
    client: Client,
}

impl AwsSecretsManager {
    /// Build a client from the default credential chain for the configured region
    pub async fn new(config: &SecretsConfig) -> Self {
        debug!(
            region = %config.region,
            endpoint = ?config.endpoint,
            "Initializing Secrets Manager client"
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        info!(region = %config.region, "Secrets Manager client initialized");

        Self {
            client: Client::new(&sdk_config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    #[instrument(skip(self))]
    async fn secret_string(&self, secret_id: &str) -> Result<String, SecretAccessError> {
        let output = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|err| {
                let kind = kind_from_code(err.code());
                SecretAccessError::new(kind, secret_id, DisplayErrorContext(&err).to_string())
            })?;

        output.secret_string().map(str::to_string).ok_or_else(|| {
            SecretAccessError::new(
                SecretAccessKind::Malformed,
                secret_id,
                "secret has no string value",
            )
        })
    }
}

/// Map a Secrets Manager error code to the failure kinds the pipeline reports
pub fn kind_from_code(code: Option<&str>) -> SecretAccessKind {
    match code {
        Some("ResourceNotFoundException") => SecretAccessKind::NotFound,
        Some("AccessDeniedException") | Some("UnrecognizedClientException") => {
            SecretAccessKind::AccessDenied
        }
        Some("ThrottlingException") | Some("TooManyRequestsException") => {
            SecretAccessKind::Throttled
        }
        _ => SecretAccessKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_classified() {
        assert_eq!(
            kind_from_code(Some("ResourceNotFoundException")),
            SecretAccessKind::NotFound
        );
        assert_eq!(
            kind_from_code(Some("AccessDeniedException")),
            SecretAccessKind::AccessDenied
        );
        assert_eq!(
            kind_from_code(Some("ThrottlingException")),
            SecretAccessKind::Throttled
        );
        assert_eq!(
            kind_from_code(Some("InternalServiceError")),
            SecretAccessKind::Other
        );
        assert_eq!(kind_from_code(None), SecretAccessKind::Other);
    }
}
