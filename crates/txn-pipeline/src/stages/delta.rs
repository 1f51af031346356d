use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use txn_common::TransactionRecord;

use super::{Stage, StageName};
use crate::error::Result;
use crate::handoff::{RunContext, CLEAN_TABLE, CONNECTION_PARAMS, DELTA_TABLE};
use crate::store::StoreConnector;

/// Keeps only the cleaned rows the target table does not already hold
pub struct DeltaCalculator {
    connector: Arc<dyn StoreConnector>,
}

impl DeltaCalculator {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl Stage for DeltaCalculator {
    fn name(&self) -> StageName {
        StageName::Delta
    }

    fn reads(&self) -> &'static [&'static str] {
        const READS: &[&str] = &[CLEAN_TABLE.name(), CONNECTION_PARAMS.name()];
        READS
    }

    fn writes(&self) -> Option<&'static str> {
        Some(DELTA_TABLE.name())
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let clean = ctx.open(&CLEAN_TABLE)?;
        let params = ctx.open(&CONNECTION_PARAMS)?;

        let existing = if clean.is_empty() {
            HashSet::new()
        } else {
            let ids: Vec<String> = clean.iter().map(|r| r.transaction_id.clone()).collect();
            let store = self.connector.connect(&params).await?;
            let result = store.existing_ids(&ids).await;
            store.close().await;
            result?
        };

        let delta = compute_delta(clean, &existing);
        info!(
            existing = existing.len(),
            new = delta.len(),
            "Delta computed"
        );

        ctx.publish(&DELTA_TABLE, &delta)?;
        ctx.stats_mut().rows_delta = delta.len();
        Ok(())
    }
}

/// Rows whose `transaction_id` is not in `existing`, in input order
pub fn compute_delta(
    clean: Vec<TransactionRecord>,
    existing: &HashSet<String>,
) -> Vec<TransactionRecord> {
    clean
        .into_iter()
        .filter(|record| !existing.contains(&record.transaction_id))
        .collect()
}
