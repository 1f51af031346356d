//! Sequential pipeline driver
//!
//! A [`Pipeline`] is an ordered list of stages whose slot reads and writes
//! were checked at construction. [`Pipeline::run`] executes one run: a fresh
//! [`RunContext`], every stage in order, halt on the first failure.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, RunError};
use crate::handoff::{HandoffCipher, RunContext};
use crate::secrets::{AwsSecretsManager, SecretStore};
use crate::source::{HttpSourceFetcher, SourceFetcher};
use crate::stages::{
    CredentialLoader, DataFetcher, DataTransformer, DeltaCalculator, Loader, SchemaInitializer,
    Stage, StageName,
};
use crate::store::{PgConnector, StoreConnector};

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(StageName),
    Completed,
    Failed(StageName),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

/// Counters gathered while a run progresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// SHA-256 of the downloaded source bytes
    pub source_sha256: Option<String>,
    pub rows_fetched: usize,
    pub rows_clean: usize,
    pub rows_delta: usize,
    pub rows_loaded: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: StageName,
    pub duration: Duration,
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub stages: Vec<StageOutcome>,
    pub stats: RunStats,
}

/// External systems the standard pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub secrets: Arc<dyn SecretStore>,
    pub secret_id: String,
    pub source: Arc<dyn SourceFetcher>,
    pub store: Arc<dyn StoreConnector>,
}

pub struct Pipeline {
    cipher: HandoffCipher,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Build a pipeline from stages in execution order.
    ///
    /// Rejects an empty list, a stage name used twice, a read of a slot no
    /// earlier stage writes, and a slot written by more than one stage.
    pub fn new(cipher: HandoffCipher, stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        validate_chain(&stages)?;
        Ok(Self { cipher, stages })
    }

    /// credentials → schema → fetch → transform → delta → load
    pub fn standard(cipher: HandoffCipher, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            secrets,
            secret_id,
            source,
            store,
        } = collaborators;

        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(CredentialLoader::new(secrets, secret_id)),
            Box::new(SchemaInitializer::new(store.clone())),
            Box::new(DataFetcher::new(source)),
            Box::new(DataTransformer::new()),
            Box::new(DeltaCalculator::new(store.clone())),
            Box::new(Loader::new(store)),
        ];

        Self::new(cipher, stages)
    }

    /// Standard pipeline against AWS Secrets Manager, HTTP, and PostgreSQL
    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        let secrets = AwsSecretsManager::new(&config.secrets).await;
        let source = HttpSourceFetcher::new(&config.source)?;

        Self::standard(
            HandoffCipher::new(&config.handoff_key),
            Collaborators {
                secrets: Arc::new(secrets),
                secret_id: config.secrets.secret_id.clone(),
                source: Arc::new(source),
                store: Arc::new(PgConnector::new(config.database.clone())),
            },
        )
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Execute one run
    pub async fn run(&self) -> std::result::Result<RunReport, RunError> {
        let mut ctx = RunContext::new(self.cipher.clone());
        let run_id = ctx.run_id();
        let run_started = Instant::now();

        info!(run_id = %run_id, stages = self.stages.len(), "Pipeline run started");

        let mut outcomes = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let name = stage.name();
            ctx.set_state(RunState::Running(name));

            let span = info_span!("stage", run_id = %run_id, stage = %name);
            let started = Instant::now();
            let result = stage.run(&mut ctx).instrument(span).await;
            let duration = started.elapsed();

            if let Err(source) = result {
                ctx.set_state(RunState::Failed(name));
                error!(
                    run_id = %run_id,
                    stage = %name,
                    elapsed_ms = duration.as_millis() as u64,
                    error = %source,
                    "Stage failed; run halted"
                );
                return Err(RunError {
                    run_id,
                    stage: name,
                    source,
                });
            }

            debug!(
                run_id = %run_id,
                stage = %name,
                elapsed_ms = duration.as_millis() as u64,
                "Stage complete"
            );
            outcomes.push(StageOutcome {
                stage: name,
                duration,
            });
        }

        ctx.set_state(RunState::Completed);
        let state = ctx.state();
        let stats = ctx.into_stats();

        info!(
            run_id = %run_id,
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            rows_fetched = stats.rows_fetched,
            rows_clean = stats.rows_clean,
            rows_delta = stats.rows_delta,
            rows_loaded = stats.rows_loaded,
            "Pipeline run completed"
        );

        Ok(RunReport {
            run_id,
            state,
            stages: outcomes,
            stats,
        })
    }
}

impl RunError {
    pub fn state(&self) -> RunState {
        RunState::Failed(self.stage)
    }
}

fn validate_chain(stages: &[Box<dyn Stage>]) -> Result<()> {
    if stages.is_empty() {
        return Err(PipelineError::InvalidChain("pipeline has no stages".to_string()));
    }

    let mut names = HashSet::new();
    let mut written: HashSet<&'static str> = HashSet::new();

    for stage in stages {
        let name = stage.name();
        if !names.insert(name) {
            return Err(PipelineError::InvalidChain(format!(
                "stage '{}' appears more than once",
                name
            )));
        }

        for slot in stage.reads() {
            if !written.contains(slot) {
                return Err(PipelineError::InvalidChain(format!(
                    "stage '{}' reads slot '{}' before any earlier stage writes it",
                    name, slot
                )));
            }
        }

        if let Some(slot) = stage.writes() {
            if !written.insert(slot) {
                return Err(PipelineError::InvalidChain(format!(
                    "slot '{}' is written by more than one stage",
                    slot
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::handoff::HandoffKey;
    use crate::secrets::StaticSecretStore;
    use crate::source::StaticSource;
    use crate::store::MemoryConnector;

    fn cipher() -> HandoffCipher {
        HandoffCipher::new(&HandoffKey::from_bytes([9u8; 32]))
    }

    fn collaborators() -> Collaborators {
        Collaborators {
            secrets: Arc::new(StaticSecretStore::new()),
            secret_id: "db".to_string(),
            source: Arc::new(StaticSource::new("memory", "")),
            store: Arc::new(MemoryConnector::default()),
        }
    }

    #[test]
    fn standard_order() {
        let pipeline = Pipeline::standard(cipher(), collaborators()).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec![
                StageName::Credentials,
                StageName::Schema,
                StageName::Fetch,
                StageName::Transform,
                StageName::Delta,
                StageName::Load,
            ]
        );
    }

    #[test]
    fn read_before_write_rejected() {
        let c = collaborators();
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(CredentialLoader::new(c.secrets, c.secret_id)),
            Box::new(DataTransformer::new()),
        ];

        let err = Pipeline::new(cipher(), stages).err().unwrap();
        assert!(matches!(err, PipelineError::InvalidChain(msg) if msg.contains("raw_table")));
    }

    #[test]
    fn duplicate_stage_rejected() {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(DataFetcher::new(Arc::new(StaticSource::new("a", "")))),
            Box::new(DataFetcher::new(Arc::new(StaticSource::new("b", "")))),
        ];
        assert!(matches!(
            Pipeline::new(cipher(), stages),
            Err(PipelineError::InvalidChain(_))
        ));
    }

    #[test]
    fn empty_pipeline_rejected() {
        assert!(Pipeline::new(cipher(), Vec::new()).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!RunState::Pending.is_terminal());
        assert!(!RunState::Running(StageName::Fetch).is_terminal());
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Failed(StageName::Load).is_terminal());
    }
}
