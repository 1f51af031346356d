use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use txn_common::checksum::sha256_hex;

use super::{Stage, StageName};
use crate::error::Result;
use crate::handoff::{RunContext, RAW_TABLE};
use crate::source::{RawTable, SourceFetcher};

/// Downloads the source CSV and seals the parsed table
pub struct DataFetcher {
    source: Arc<dyn SourceFetcher>,
}

impl DataFetcher {
    pub fn new(source: Arc<dyn SourceFetcher>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Stage for DataFetcher {
    fn name(&self) -> StageName {
        StageName::Fetch
    }

    fn reads(&self) -> &'static [&'static str] {
        &[]
    }

    fn writes(&self) -> Option<&'static str> {
        Some(RAW_TABLE.name())
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let body = self.source.fetch().await?;
        let checksum = sha256_hex(&body);

        let table = RawTable::from_csv(&body)?;
        info!(
            location = %self.source.location(),
            bytes = body.len(),
            sha256 = %checksum,
            rows = table.len(),
            "Source table fetched"
        );

        ctx.publish(&RAW_TABLE, &table)?;

        let stats = ctx.stats_mut();
        stats.source_sha256 = Some(checksum);
        stats.rows_fetched = table.len();
        Ok(())
    }
}
