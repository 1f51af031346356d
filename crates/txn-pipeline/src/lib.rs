//! Transactions ETL Pipeline
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pulls a transactions CSV from a remote host, cleans and deduplicates it,
//! diffs it against the `transactions` table, and appends only new rows.
//!
//! # Stages
//!
//! 1. **credentials**: database credentials from the secret store
//! 2. **schema**: create the target table if missing
//! 3. **fetch**: download and parse the source CSV
//! 4. **transform**: coerce types, parse dates, deduplicate, drop incomplete rows
//! 5. **delta**: drop rows whose `transaction_id` is already stored
//! 6. **load**: append the delta in one database transaction
//!
//! Every value passed between stages is sealed with AES-256-GCM inside a
//! run-scoped [`handoff::RunContext`].
//!
//! # Example
//!
//! ```no_run
//! use txn_pipeline::{config::PipelineConfig, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load()?;
//!     let pipeline = Pipeline::from_config(&config).await?;
//!     let report = pipeline.run().await?;
//!     println!("loaded {} rows", report.stats.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dates;
pub mod error;
pub mod handoff;
pub mod pipeline;
pub mod scheduler;
pub mod secrets;
pub mod source;
pub mod stages;
pub mod store;

pub use error::{PipelineError, Result, RunError};
pub use pipeline::{Collaborators, Pipeline, RunReport, RunState, RunStats};
