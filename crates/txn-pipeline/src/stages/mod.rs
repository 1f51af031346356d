//! The six pipeline stages
//!
//! Each stage opens the slots it reads from the [`RunContext`], does one job,
//! and publishes at most one slot. Stages hold their collaborators behind
//! trait objects so tests can swap in in-memory implementations.

mod credentials;
mod delta;
mod fetch;
mod load;
mod schema;
mod transform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use credentials::CredentialLoader;
pub use delta::{compute_delta, DeltaCalculator};
pub use fetch::DataFetcher;
pub use load::Loader;
pub use schema::SchemaInitializer;
pub use transform::{clean_transactions, DataTransformer};

use crate::error::Result;
use crate::handoff::RunContext;

/// Stage identifiers, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Credentials,
    Schema,
    Fetch,
    Transform,
    Delta,
    Load,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Credentials => "credentials",
            StageName::Schema => "schema",
            StageName::Fetch => "fetch",
            StageName::Transform => "transform",
            StageName::Delta => "delta",
            StageName::Load => "load",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of the linear pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// Slots this stage opens
    fn reads(&self) -> &'static [&'static str];

    /// Slot this stage publishes, if any
    fn writes(&self) -> Option<&'static str>;

    async fn run(&self, ctx: &mut RunContext) -> Result<()>;
}
