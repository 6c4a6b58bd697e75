//! Insight Pipeline - Main entry point
//!
//! Runs the thematic insight pipeline over a directory of documents, or
//! lists the checkpoints stored for a run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use insight_common::config::{load_config, TomlConfig};
use insight_common::logging::init_logging;
use insight_pipeline::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use insight_pipeline::ingest::DocumentLoader;
use insight_pipeline::output::write_report;
use insight_pipeline::{Orchestrator, Stage};

/// Default checkpoint database when neither CLI nor config names one
const DEFAULT_CHECKPOINT_DB: &str = "insight-checkpoints.db";

/// Default report directory
const DEFAULT_OUTPUT_DIR: &str = "output";

/// Command-line arguments for insight-pipeline
#[derive(Parser, Debug)]
#[command(name = "insight-pipeline")]
#[command(about = "Thematic insight extraction over a document collection")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Checkpoint database (overrides config)
    #[arg(long, global = true, env = "INSIGHT_CHECKPOINT_DB")]
    checkpoint_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run (or resume) the pipeline
    Run {
        /// Directory of .md / .txt documents
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Report directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run id; generated when omitted
        #[arg(long)]
        run_id: Option<String>,

        /// Resume after this stage
        /// (deconstruction, patterns, categorization, synthesis, validation)
        #[arg(long, requires = "run_id")]
        resume_from: Option<Stage>,

        /// Worker pool size (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List the checkpoints stored for a run
    Checkpoints {
        /// Run id
        run_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;
    info!("Configuration source: {:?}", source);

    let db_path = args
        .checkpoint_db
        .clone()
        .or_else(|| config.checkpoint_db.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_DB));

    match args.command {
        Command::Run {
            input,
            output,
            run_id,
            resume_from,
            workers,
        } => run(config, &db_path, input, output, run_id, resume_from, workers).await,
        Command::Checkpoints { run_id } => list_checkpoints(&db_path, &run_id).await,
    }
}

async fn run(
    mut config: TomlConfig,
    db_path: &Path,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    run_id: Option<String>,
    resume_from: Option<Stage>,
    workers: Option<usize>,
) -> Result<()> {
    if let Some(workers) = workers {
        config.pipeline.workers = workers;
    }

    let documents = match (&input, resume_from) {
        (Some(dir), _) => DocumentLoader::new()?
            .load_dir(dir)
            .with_context(|| format!("Failed to load documents from {}", dir.display()))?,
        (None, Some(_)) => Vec::new(),
        (None, None) => bail!("--input is required unless resuming with --resume-from"),
    };

    let run_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let output_dir = output
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    info!("Run {}: checkpoints in {}", run_id, db_path.display());

    let store = Arc::new(
        SqliteCheckpointStore::open(db_path)
            .await
            .context("Failed to open checkpoint database")?,
    );
    let orchestrator = Orchestrator::from_settings(config.pipeline.clone(), store)
        .context("Failed to configure pipeline")?;

    let report = orchestrator
        .run(&run_id, documents, resume_from)
        .await
        .with_context(|| format!("Pipeline run {} failed", run_id))?;

    if !report.manifest.is_clean() {
        warn!(
            "Run {} completed with {} degraded item(s)",
            run_id,
            report.manifest.total()
        );
    }

    let (json_path, markdown_path) =
        write_report(&report, &output_dir).context("Failed to write report")?;

    println!("Run:       {}", run_id);
    println!("Themes:    {}", report.themes.len());
    println!("Chapters:  {}", report.chapters.len());
    println!("Escalated: {}", report.run_metadata.escalated_count);
    println!("JSON:      {}", json_path.display());
    println!("Markdown:  {}", markdown_path.display());
    Ok(())
}

async fn list_checkpoints(db_path: &Path, run_id: &str) -> Result<()> {
    if !db_path.exists() {
        bail!("Checkpoint database {} does not exist", db_path.display());
    }

    let store = SqliteCheckpointStore::open(db_path)
        .await
        .context("Failed to open checkpoint database")?;
    let checkpoints = store.list(run_id).await.context("Failed to list checkpoints")?;

    if checkpoints.is_empty() {
        println!("No checkpoints for run {}", run_id);
        return Ok(());
    }

    println!("{:<16} {:>7} {:>10}  {:<25} DIGEST", "STAGE", "SCHEMA", "BYTES", "CREATED");
    for checkpoint in checkpoints {
        println!(
            "{:<16} {:>7} {:>10}  {:<25} {}",
            checkpoint.stage.as_str(),
            checkpoint.schema_version,
            checkpoint.payload_bytes,
            checkpoint.created_at.to_rfc3339(),
            &checkpoint.payload_digest[..12.min(checkpoint.payload_digest.len())]
        );
    }
    Ok(())
}
