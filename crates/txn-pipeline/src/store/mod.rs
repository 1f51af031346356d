//! Target table access
//!
//! Stages open a store from decrypted [`ConnectionParams`] through a
//! [`StoreConnector`] and close it again before returning.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashSet;
use txn_common::{ConnectionParams, TransactionRecord};

pub use memory::{MemoryConnector, MemoryStore};
pub use postgres::{PgConnector, PgTransactionStore};

use crate::error::DatabaseError;

/// DDL for the target table
pub const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id SERIAL PRIMARY KEY,
    transaction_id VARCHAR(50) UNIQUE NOT NULL,
    user_id INT NOT NULL,
    amount FLOAT NOT NULL,
    transaction_date DATE NOT NULL
)
"#;

/// Operations the pipeline needs from the `transactions` table
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Create the table if it does not exist
    async fn ensure_schema(&self) -> Result<(), DatabaseError>;

    /// The subset of `ids` already present in the table
    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, DatabaseError>;

    /// Insert all records atomically, returning the number of rows written
    async fn append(&self, records: &[TransactionRecord]) -> Result<u64, DatabaseError>;

    async fn close(&self) {}
}

/// Opens a [`TransactionStore`] for a set of connection parameters
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn TransactionStore>, DatabaseError>;
}
