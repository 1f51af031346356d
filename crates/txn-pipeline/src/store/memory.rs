//! In-memory store with the target table's uniqueness rule

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use txn_common::{ConnectionParams, TransactionRecord};

use super::{StoreConnector, TransactionStore};
use crate::error::DatabaseError;

/// Shared in-memory `transactions` table.
///
/// Clones share the same rows, so a test can keep one handle and inspect
/// what the pipeline wrote through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<TransactionRecord>>>,
    schema_calls: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed rows as if an earlier run had loaded them
    pub fn with_rows(rows: Vec<TransactionRecord>) -> Self {
        let store = Self::default();
        *store.lock() = rows;
        store
    }

    pub fn rows(&self) -> Vec<TransactionRecord> {
        self.lock().clone()
    }

    pub fn schema_calls(&self) -> usize {
        self.schema_calls.load(Ordering::SeqCst)
    }

    /// Number of times a connector opened this store
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TransactionRecord>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn existing_ids(&self, ids: &[String]) -> Result<HashSet<String>, DatabaseError> {
        let rows = self.lock();
        let present: HashSet<&str> = rows.iter().map(|r| r.transaction_id.as_str()).collect();
        Ok(ids
            .iter()
            .filter(|id| present.contains(id.as_str()))
            .cloned()
            .collect())
    }

    async fn append(&self, records: &[TransactionRecord]) -> Result<u64, DatabaseError> {
        let mut rows = self.lock();

        let mut seen: HashSet<&str> = rows.iter().map(|r| r.transaction_id.as_str()).collect();
        for record in records {
            if !seen.insert(record.transaction_id.as_str()) {
                return Err(DatabaseError::ConstraintViolation(format!(
                    "duplicate key value violates unique constraint: transaction_id={}",
                    record.transaction_id
                )));
            }
        }

        rows.extend_from_slice(records);
        Ok(records.len() as u64)
    }
}

/// Connector handing out clones of one [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
}

impl MemoryConnector {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(
        &self,
        _params: &ConnectionParams,
    ) -> Result<Box<dyn TransactionStore>, DatabaseError> {
        self.store.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.store.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str) -> TransactionRecord {
        TransactionRecord {
            transaction_id: id.to_string(),
            user_id: 1,
            amount: 10.0,
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn existing_ids_reports_overlap() {
        let store = MemoryStore::with_rows(vec![record("A"), record("B")]);
        let ids = vec!["A".to_string(), "C".to_string()];

        let existing = store.existing_ids(&ids).await.unwrap();
        assert_eq!(existing, HashSet::from(["A".to_string()]));
    }

    #[tokio::test]
    async fn duplicate_append_is_all_or_nothing() {
        let store = MemoryStore::with_rows(vec![record("A")]);

        let err = store.append(&[record("B"), record("A")]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        assert_eq!(store.rows().len(), 1);

        assert_eq!(store.append(&[record("B")]).await.unwrap(), 1);
        assert_eq!(store.rows().len(), 2);
    }
}
