use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{Stage, StageName};
use crate::error::Result;
use crate::handoff::{RunContext, CONNECTION_PARAMS};
use crate::store::StoreConnector;

/// Creates the target table when it is missing
pub struct SchemaInitializer {
    connector: Arc<dyn StoreConnector>,
}

impl SchemaInitializer {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl Stage for SchemaInitializer {
    fn name(&self) -> StageName {
        StageName::Schema
    }

    fn reads(&self) -> &'static [&'static str] {
        const READS: &[&str] = &[CONNECTION_PARAMS.name()];
        READS
    }

    fn writes(&self) -> Option<&'static str> {
        None
    }

    async fn run(&self, ctx: &mut RunContext) -> Result<()> {
        let params = ctx.open(&CONNECTION_PARAMS)?;
        let store = self.connector.connect(&params).await?;

        let result = store.ensure_schema().await;
        store.close().await;
        result?;

        debug!("Schema check complete");
        Ok(())
    }
}
