//! Encrypted hand-off between pipeline stages
//!
//! Stages never pass plaintext to each other. Every value crosses a stage
//! boundary as AES-256-GCM ciphertext held in a run-scoped [`RunContext`].

pub mod cipher;
pub mod context;

pub use cipher::{HandoffCipher, HandoffKey, KeyError};
pub use context::{
    HandoffValue, RunContext, Slot, CLEAN_TABLE, CONNECTION_PARAMS, DELTA_TABLE, RAW_TABLE,
};
