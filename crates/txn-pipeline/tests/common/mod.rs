//! Shared helpers for txn-pipeline integration tests
//!
//! - In-memory collaborators for driving the whole pipeline without network
//! - A PostgreSQL container for store tests (requires Docker)

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::sync::Arc;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;
use txn_common::ConnectionParams;
use txn_pipeline::handoff::{HandoffCipher, HandoffKey};
use txn_pipeline::secrets::StaticSecretStore;
use txn_pipeline::source::StaticSource;
use txn_pipeline::store::{MemoryConnector, MemoryStore};
use txn_pipeline::{Collaborators, Pipeline};

pub const SECRET_ID: &str = "adsum_db_credentials_2";

pub const DB_PASSWORD: &str = "hunter2-very-secret";

pub const HEADER: &str = "transaction_id,user_id,amount,transaction_date";

pub fn test_cipher() -> HandoffCipher {
    HandoffCipher::new(&HandoffKey::from_bytes([42u8; 32]))
}

pub fn secret_json() -> String {
    format!(
        r#"{{"host":"db.internal","port":5432,"dbname":"ledger","user":"etl","password":"{}"}}"#,
        DB_PASSWORD
    )
}

/// Build a CSV body from data lines
pub fn csv(lines: &[&str]) -> String {
    let mut body = String::from(HEADER);
    for line in lines {
        body.push('\n');
        body.push_str(line);
    }
    body.push('\n');
    body
}

/// Standard pipeline over in-memory collaborators
pub fn memory_pipeline(body: &str, store: &MemoryStore) -> Pipeline {
    pipeline_with(
        StaticSecretStore::new().with_secret(SECRET_ID, secret_json()),
        body,
        store,
    )
}

pub fn pipeline_with(secrets: StaticSecretStore, body: &str, store: &MemoryStore) -> Pipeline {
    Pipeline::standard(
        test_cipher(),
        Collaborators {
            secrets: Arc::new(secrets),
            secret_id: SECRET_ID.to_string(),
            source: Arc::new(StaticSource::new("memory://transactions.csv", body)),
            store: Arc::new(MemoryConnector::new(store.clone())),
        },
    )
    .expect("standard pipeline is a valid chain")
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    params: ConnectionParams,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let params = ConnectionParams {
            host: host.to_string(),
            port,
            dbname: "postgres".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
        };

        Ok(Self {
            _container: container,
            params,
        })
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }
}
