//! txn-pipeline - encrypted transactions ETL

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use txn_common::logging::{init_logging, LogConfig, LogLevel};
use txn_pipeline::{
    config::PipelineConfig, handoff::HandoffKey, pipeline::Pipeline, scheduler::DailyScheduler,
};

#[derive(Parser, Debug)]
#[command(name = "txn-pipeline")]
#[command(author, version, about = "Transactions ETL pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once
    Run,

    /// Run the pipeline daily at TXN_SCHEDULE_TIME (UTC) until interrupted
    Schedule,

    /// Print a fresh hand-off key for TXN_HANDOFF_KEY
    Keygen,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Keygen = cli.command {
        println!("{}", HandoffKey::generate().to_base64());
        return Ok(());
    }

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // LOG_* variables take precedence over the flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("txn-pipeline")
        .filter_directives("sqlx=warn,aws_config=warn,aws_smithy_runtime=warn,hyper=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let config = PipelineConfig::load()?;
    let pipeline = Pipeline::from_config(&config).await?;

    match cli.command {
        Command::Run => {
            let report = pipeline.run().await?;
            info!(
                run_id = %report.run_id,
                rows_fetched = report.stats.rows_fetched,
                rows_loaded = report.stats.rows_loaded,
                source_sha256 = report.stats.source_sha256.as_deref().unwrap_or("-"),
                "Run complete"
            );
        }
        Command::Schedule => {
            DailyScheduler::new(pipeline, config.schedule.clone())
                .run_forever()
                .await;
        }
        Command::Keygen => {}
    }

    Ok(())
}
