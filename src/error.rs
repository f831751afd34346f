//! Error types for nemsis-ingest

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while ingesting one XML file
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read XML file: {path}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse XML file: {path}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid document structure in {path}: {message}")]
    InvalidDocument { path: PathBuf, message: String },

    #[error("Report UUID missing or invalid in {path}: {message}")]
    MissingReportUuid { path: PathBuf, message: String },

    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    #[error("Schema DDL failed: {statement}")]
    SchemaError {
        statement: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Foreign key creation failed: {constraint}")]
    ConstraintError {
        constraint: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Row write failed on table {table}")]
    WriteError {
        table: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Database error")]
    Database(#[from] tokio_postgres::Error),

    #[error("Failed to relocate {path}")]
    RelocateError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Short status label recorded in the ingestion log table.
    pub fn status_label(&self) -> &'static str {
        match self {
            IngestError::FileReadError { .. } => "file_read_error",
            IngestError::ParseError { .. } | IngestError::InvalidDocument { .. } => "parse_error",
            IngestError::MissingReportUuid { .. } => "missing_report_uuid",
            IngestError::ConfigError { .. } => "config_error",
            IngestError::SchemaError { .. } => "schema_error",
            IngestError::ConstraintError { .. } => "constraint_error",
            IngestError::WriteError { .. } => "write_error",
            IngestError::Database(_) => "database_error",
            IngestError::RelocateError { .. } => "relocate_error",
        }
    }
}

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, IngestError>;
