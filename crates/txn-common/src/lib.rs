//! Transactions ETL Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the transactions ETL
//! workspace.
//!
//! # Overview
//!
//! - **Types**: Connection Parameters and Transaction Records
//! - **Error Handling**: Common error and result types
//! - **Checksums**: Fingerprints for downloaded source files
//! - **Logging**: Centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use txn_common::checksum::sha256_hex;
//! use txn_common::types::ConnectionParams;
//!
//! fn describe(params: &ConnectionParams, body: &[u8]) {
//!     // Debug output redacts the password
//!     tracing::info!(params = ?params, sha256 = %sha256_hex(body), "Source fetched");
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{ConnectionParams, TransactionRecord};
