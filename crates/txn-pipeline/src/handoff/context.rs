//! Run-scoped hand-off state
//!
//! A [`RunContext`] lives for exactly one pipeline run. Stages publish their
//! outputs into named [`Slot`]s and later stages open them. Values are stored
//! only in sealed form, bound to `(run_id, slot)` so a value can neither be
//! replayed into a different run nor read back through a different slot.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;
use txn_common::{ConnectionParams, TransactionRecord};
use uuid::Uuid;

use super::cipher::HandoffCipher;
use crate::error::{HandoffError, Result};
use crate::pipeline::{RunState, RunStats};
use crate::source::RawTable;

/// A typed, named location in the run context
pub struct Slot<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Slot<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

pub const CONNECTION_PARAMS: Slot<ConnectionParams> = Slot::new("connection_params");
pub const RAW_TABLE: Slot<RawTable> = Slot::new("raw_table");
pub const CLEAN_TABLE: Slot<Vec<TransactionRecord>> = Slot::new("clean_table");
pub const DELTA_TABLE: Slot<Vec<TransactionRecord>> = Slot::new("delta_table");

/// An opaque encrypted payload
#[derive(Clone, PartialEq, Eq)]
pub struct HandoffValue(String);

impl HandoffValue {
    pub fn new(ciphertext: impl Into<String>) -> Self {
        Self(ciphertext.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for HandoffValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HandoffValue({} bytes)", self.0.len())
    }
}

/// Per-run state owned by the driver
pub struct RunContext {
    run_id: Uuid,
    cipher: HandoffCipher,
    values: HashMap<&'static str, HandoffValue>,
    state: RunState,
    stats: RunStats,
}

impl RunContext {
    /// Start a new run with a fresh run id
    pub fn new(cipher: HandoffCipher) -> Self {
        Self::with_run_id(Uuid::new_v4(), cipher)
    }

    pub fn with_run_id(run_id: Uuid, cipher: HandoffCipher) -> Self {
        Self {
            run_id,
            cipher,
            values: HashMap::new(),
            state: RunState::Pending,
            stats: RunStats::default(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Store a sealed value. Each slot accepts one write per run.
    pub fn push(&mut self, slot: &'static str, value: HandoffValue) -> Result<()> {
        if self.values.contains_key(slot) {
            return Err(HandoffError::AlreadyWritten(slot).into());
        }
        debug!(run_id = %self.run_id, slot, value = ?value, "Hand-off value published");
        self.values.insert(slot, value);
        Ok(())
    }

    pub fn pull(&self, slot: &'static str) -> Result<&HandoffValue> {
        self.values
            .get(slot)
            .ok_or_else(|| HandoffError::Missing(slot).into())
    }

    /// Serialize, seal, and push `value` into `slot`
    pub fn publish<T: Serialize>(&mut self, slot: &Slot<T>, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let ciphertext = self
            .cipher
            .encrypt_bound(&json, &self.binding(slot.name()))?;
        self.push(slot.name(), HandoffValue(ciphertext))
    }

    /// Pull, authenticate, and deserialize the value in `slot`
    pub fn open<T: DeserializeOwned>(&self, slot: &Slot<T>) -> Result<T> {
        let value = self.pull(slot.name())?;
        let json = self
            .cipher
            .decrypt_bound(value.as_str(), &self.binding(slot.name()))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: RunState) {
        self.state = state;
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    pub(crate) fn into_stats(self) -> RunStats {
        self.stats
    }

    fn binding(&self, slot: &str) -> Vec<u8> {
        format!("txn-handoff/v1/{}/{}", self.run_id, slot).into_bytes()
    }
}
