use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{Stage, StageName};
use crate::error::Result;
use crate::handoff::{RunContext, CONNECTION_PARAMS, DELTA_TABLE};
use crate::store::StoreConnector;

/// Appends the delta to the target table
pub struct Loader {
    connector: Arc<dyn StoreConnector>,
}

impl Loader {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl Stage for Loader {
    fn name(&self) -> StageName {
        StageName::Load
    }

    fn reads(&self) -> &'static [&'static str] {
        const READS: &[&str] = &[DELTA_TABLE.name(), CONNECTION_PARAMS.name()];
        READS
    }

    fn writes(&self) -> Option<&'static str> {
        None
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let delta = ctx.open(&DELTA_TABLE)?;
        if delta.is_empty() {
            info!("Delta is empty; nothing to load");
            return Ok(());
        }

        let params = ctx.open(&CONNECTION_PARAMS)?;
        let store = self.connector.connect(&params).await?;
        let result = store.append(&delta).await;
        store.close().await;

        let loaded = result?;
        info!(loaded, "Delta loaded");
        ctx.stats_mut().rows_loaded = loaded;
        Ok(())
    }
}
