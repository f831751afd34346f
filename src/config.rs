//! Environment-driven configuration
//!
//! Connection details, target schema, and file-routing directories come
//! from the environment (optionally a `.env` file). The schema name is
//! validated up front since it is interpolated into DDL.

use std::env;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{IngestError, Result};

static SCHEMA_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const DEFAULT_ARCHIVE_DIR: &str = "processed_xml_archive";
const DEFAULT_ERROR_DIR: &str = "error_files";

/// Runtime configuration for one ingestion process
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Target schema for all dynamic tables; defaults to `public`.
    pub schema: String,
    /// Destination for successfully ingested source files.
    pub archive_dir: PathBuf,
    /// Destination for quarantined source files.
    pub error_dir: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// `PG_DATABASE`, `PG_USER`, and `PG_PASSWORD` are required; the rest
    /// have defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("PG_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("PG_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse()
            .map_err(|e| IngestError::ConfigError {
                message: format!("invalid PG_PORT: {e}"),
            })?;
        let database = required("PG_DATABASE")?;
        let user = required("PG_USER")?;
        let password = required("PG_PASSWORD")?;
        let schema = env::var("PG_SCHEMA").unwrap_or_else(|_| "public".to_string());
        validate_schema_name(&schema)?;

        let archive_dir = env::var("ARCHIVE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARCHIVE_DIR));
        let error_dir = env::var("ERROR_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ERROR_DIR));

        Ok(Config {
            host,
            port,
            database,
            user,
            password,
            schema,
            archive_dir,
            error_dir,
        })
    }

    /// Build a libpq-style connection string from the configuration.
    pub fn connection_string(&self) -> String {
        let mut params = vec![
            format!("host={}", self.host),
            format!("port={}", self.port),
            format!("user={}", self.user),
            format!("dbname={}", self.database),
        ];
        if !self.password.is_empty() {
            params.push(format!("password={}", self.password));
        }
        params.join(" ")
    }
}

/// Reject schema names that could not be safely interpolated into DDL.
pub fn validate_schema_name(schema: &str) -> Result<()> {
    if SCHEMA_NAME.is_match(schema) {
        Ok(())
    } else {
        Err(IngestError::ConfigError {
            message: format!("invalid schema name: {schema:?}"),
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| IngestError::ConfigError {
        message: format!("{name} is not set"),
    })
}
