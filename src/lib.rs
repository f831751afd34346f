//! nemsis-ingest: dynamic NEMSIS XML to PostgreSQL ingestion
//!
//! This library maps semi-structured, deeply nested patient-care-report
//! XML onto a relational schema that is created and evolved on the fly,
//! with no predeclared mapping. Table and column names are derived
//! deterministically from XML tag paths, parent/child foreign keys are
//! materialized as element shapes are encountered, and writes are
//! idempotent per report UUID: re-ingesting a report supersedes its prior
//! rows instead of duplicating them.

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod model;
pub mod naming;
pub mod parser;
pub mod quarantine;
pub mod schema;

use std::path::PathBuf;

use anyhow::Result;

pub use error::IngestError;
pub use ingest::{ingest_file, IngestOutcome};

/// Options for one ingestion invocation
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Path to the NEMSIS XML file to process
    pub xml_path: PathBuf,
    /// Override the configured archive directory
    pub archive_dir: Option<PathBuf>,
    /// Override the configured quarantine directory
    pub error_dir: Option<PathBuf>,
}

/// Connect using environment configuration and ingest a single file.
pub async fn run(options: IngestOptions) -> Result<IngestOutcome> {
    let mut config = config::Config::from_env()?;
    if let Some(dir) = options.archive_dir {
        config.archive_dir = dir;
    }
    if let Some(dir) = options.error_dir {
        config.error_dir = dir;
    }

    let mut client = db::connect(&config).await?;
    let outcome = ingest::ingest_file(&mut client, &config, &options.xml_path).await?;
    Ok(outcome)
}
