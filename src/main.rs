use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use nemsis_ingest::{run, IngestOptions, IngestOutcome};

#[derive(Parser)]
#[command(name = "nemsis-ingest")]
#[command(
    author,
    version,
    about = "Dynamic NEMSIS XML to PostgreSQL ingestion tool"
)]
struct Cli {
    /// Path to the NEMSIS XML file to process
    xml_file: PathBuf,

    /// Archive directory for successfully ingested files
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// Quarantine directory for failed files
    #[arg(long)]
    error_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = run(IngestOptions {
        xml_path: cli.xml_file,
        archive_dir: cli.archive_dir,
        error_dir: cli.error_dir,
    })
    .await?;

    match outcome {
        IngestOutcome::Committed { reports, rows } => {
            tracing::info!(reports, rows, "ingestion completed");
        }
        IngestOutcome::Quarantined { reason, moved_to } => {
            tracing::error!(reason = %reason, moved_to = %moved_to.display(), "ingestion failed");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
