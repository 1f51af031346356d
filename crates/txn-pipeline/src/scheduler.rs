//! Daily scheduling with a fixed retry budget
//!
//! Runs are awaited one after another, so two runs never overlap inside one
//! scheduler process.

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::error::RunError;
use crate::pipeline::{Pipeline, RunReport};

pub struct DailyScheduler {
    pipeline: Pipeline,
    config: ScheduleConfig,
}

impl DailyScheduler {
    pub fn new(pipeline: Pipeline, config: ScheduleConfig) -> Self {
        Self { pipeline, config }
    }

    /// Run once, rerunning the whole pipeline up to `max_retries` times
    pub async fn run_with_retries(&self) -> Result<RunReport, RunError> {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            match self.pipeline.run().await {
                Ok(report) => return Ok(report),
                Err(err) if attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        run_id = %err.run_id,
                        stage = %err.stage,
                        retry_in_secs = self.config.retry_delay_secs,
                        "Run failed; will retry"
                    );
                    tokio::time::sleep(self.config.retry_delay()).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run every day at the configured time until Ctrl-C.
    ///
    /// The signal listener is installed before the first wait, so a Ctrl-C
    /// pressed during a run stops the scheduler once that run finishes.
    pub async fn run_forever(&self) {
        let (tx, rx) = watch::channel(false);

        let listener = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = tx.send(true);
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        "Could not listen for Ctrl-C; scheduler runs until killed"
                    );
                    // Keep the sender alive so the scheduler does not read a hang-up as shutdown
                    std::future::pending::<()>().await;
                    drop(tx);
                }
            }
        });

        self.run_until(rx).await;
        listener.abort();
    }

    /// Run every day at the configured time until `shutdown` turns `true` or
    /// its sender is dropped. A run in progress is always finished first.
    pub async fn run_until(&self, mut shutdown: watch::Receiver<bool>) {
        info!(run_at = %self.config.run_at, "Scheduler started (UTC)");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Utc::now();
            let next = next_run_after(now, self.config.run_at);
            let wait = (next - now).to_std().unwrap_or_default();

            info!(
                next_run = %next,
                wait_secs = wait.as_secs(),
                "Waiting for next scheduled run"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_with_retries().await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    rows_loaded = report.stats.rows_loaded,
                    "Scheduled run succeeded"
                ),
                Err(err) => error!(
                    run_id = %err.run_id,
                    stage = %err.stage,
                    error = %err,
                    "Scheduled run failed after all retries"
                ),
            }
        }

        info!("Shutdown requested; scheduler stopping");
    }
}

/// The first instant strictly after `now` whose UTC time of day is `at`
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    }
}
