//! PostgreSQL store on sqlx

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument};
use txn_common::{ConnectionParams, TransactionRecord};

use super::{StoreConnector, TransactionStore, CREATE_TABLE_SQL};
use crate::config::{DatabaseConfig, MAX_INSERT_BATCH_SIZE};
use crate::error::DatabaseError;

/// Ids per `IN (...)` lookup
const LOOKUP_CHUNK_SIZE: usize = 500;

/// Builds a connection pool per [`StoreConnector::connect`] call
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: DatabaseConfig,
}

impl PgConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreConnector for PgConnector {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn TransactionStore>, DatabaseError> {
        let store = PgTransactionStore::connect(params, &self.config).await?;
        Ok(Box::new(store))
    }
}

#[derive(Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
    insert_batch_size: usize,
}

impl PgTransactionStore {
    pub async fn connect(
        params: &ConnectionParams,
        config: &DatabaseConfig,
    ) -> Result<Self, DatabaseError> {
        let options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .database(&params.dbname)
            .username(&params.user)
            .password(&params.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect_with(options)
            .await
            .map_err(DatabaseError::Connect)?;

        debug!(
            host = %params.host,
            port = params.port,
            dbname = %params.dbname,
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self::from_pool(pool, config.insert_batch_size))
    }

    pub fn from_pool(pool: PgPool, insert_batch_size: usize) -> Self {
        Self {
            pool,
            insert_batch_size: insert_batch_size.clamp(1, MAX_INSERT_BATCH_SIZE),
        }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    #[instrument(skip(self))]
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(CREATE_TABLE_SQL).execute(&self.pool).await?;
        info!("Target table 'transactions' is present");
        Ok(())
    }

    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, DatabaseError> {
        let mut existing = HashSet::new();

        for chunk in ids.chunks(LOOKUP_CHUNK_SIZE) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "SELECT transaction_id FROM transactions WHERE transaction_id IN (",
            );

            let mut separated = query_builder.separated(", ");
            for id in chunk {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");

            let rows = query_builder.build().fetch_all(&self.pool).await?;
            for row in rows {
                let id: String = row.try_get("transaction_id")?;
                existing.insert(id);
            }
        }

        debug!(found = existing.len(), "Looked up existing transaction ids");
        Ok(existing)
    }

    #[instrument(skip(self, records), fields(records = records.len()))]
    async fn append(&self, records: &[TransactionRecord]) -> Result<u64, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for batch in records.chunks(self.insert_batch_size) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO transactions (transaction_id, user_id, amount, transaction_date) ",
            );

            query_builder.push_values(batch, |mut b, record| {
                b.push_bind(&record.transaction_id)
                    .push_bind(record.user_id)
                    .push_bind(record.amount)
                    .push_bind(record.transaction_date);
            });

            // Dropping `tx` on error rolls the whole load back
            let result = query_builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        info!(inserted, "Appended rows to 'transactions'");
        Ok(inserted)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
