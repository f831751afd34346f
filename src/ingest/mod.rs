//! Upsert Controller: one file, one transaction
//!
//! Orchestrates a full ingestion run: parse the document, evolve the
//! schema, materialize foreign keys, delete any prior rows for the
//! document's report UUIDs, and insert one row per element, all inside a
//! single transaction. Any failure rolls the transaction back (DDL
//! included) and hands the source file to the quarantine handler; a
//! success archives it. Repeated ingestion of the same report therefore
//! never duplicates rows.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::model::{Element, Forest};
use crate::naming;
use crate::parser;
use crate::quarantine;
use crate::schema::{self, quote_ident, relationships, INGESTION_LOG_TABLE};

/// Terminal state of one ingestion run
#[derive(Debug)]
pub enum IngestOutcome {
    Committed { reports: usize, rows: usize },
    Quarantined { reason: String, moved_to: PathBuf },
}

/// Ingest one XML file, start to finish.
///
/// Returns `Ok` with the terminal outcome for both committed and
/// quarantined runs; `Err` only when the run could not reach a terminal
/// state (the source file is unreadable, or relocating it failed, in
/// which case its state on disk needs operator attention).
pub async fn ingest_file(
    client: &mut Client,
    config: &Config,
    path: &Path,
) -> Result<IngestOutcome> {
    info!(path = %path.display(), schema = %config.schema, "starting ingestion run");

    let bytes = fs::read(path).map_err(|source| IngestError::FileReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let digest = hex::encode(Sha256::digest(&bytes));

    if let Err(err) = prepare_bookkeeping(client, &config.schema).await {
        return quarantine_run(client, config, path, &digest, err).await;
    }

    let forest = match parser::decode_document(&bytes, path)
        .and_then(|text| parser::parse_document(&text, path))
    {
        Ok(forest) => forest,
        Err(err) => return quarantine_run(client, config, path, &digest, err).await,
    };
    info!(
        reports = forest.report_uuids.len(),
        elements = forest.elements.len(),
        "parsed document"
    );

    match write_forest(client, config, &forest).await {
        Ok(rows) => {
            let archived = quarantine::archive(path, &config.archive_dir).map_err(|source| {
                IngestError::RelocateError {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            record_ingestion(client, config, path, &digest, "committed").await;
            info!(rows, archived = %archived.display(), "ingestion committed");
            Ok(IngestOutcome::Committed {
                reports: forest.report_uuids.len(),
                rows,
            })
        }
        Err(err) => quarantine_run(client, config, path, &digest, err).await,
    }
}

/// Execute the transactional portion of a run. The transaction rolls back
/// when this returns an error.
async fn write_forest(client: &mut Client, config: &Config, forest: &Forest) -> Result<usize> {
    let mut tx = client.transaction().await?;
    let schema = config.schema.as_str();

    schema::ensure_schema(&mut tx, schema).await?;
    for plan in forest.table_plans().values() {
        schema::ensure_table(&mut tx, schema, plan).await?;
    }
    for rel in forest.relationships() {
        relationships::ensure_foreign_key(&mut tx, schema, &rel).await?;
    }

    let deleted = delete_existing_reports(&tx, schema, &forest.report_uuids).await?;
    if deleted > 0 {
        info!(deleted, "superseded rows from a prior ingestion of these reports");
    }

    let mut rows = 0usize;
    for element in &forest.elements {
        insert_element(&tx, schema, element).await?;
        rows += 1;
    }

    tx.commit().await?;
    Ok(rows)
}

/// Overwrite semantics: purge each report UUID from every known dynamic
/// table, not just tables touched by the current document, so sections
/// absent from a newer version of a report leave no residual rows.
async fn delete_existing_reports(
    tx: &Transaction<'_>,
    schema: &str,
    reports: &BTreeSet<Uuid>,
) -> Result<u64> {
    let tables = schema::tables_with_report_column(tx, schema).await?;
    let mut deleted = 0u64;
    for table in &tables {
        let sql = schema::delete_report_sql(schema, table);
        for report in reports {
            let report_text = report.to_string();
            deleted += tx
                .execute(sql.as_str(), &[&report_text])
                .await
                .map_err(|source| IngestError::WriteError {
                    table: table.clone(),
                    source,
                })?;
        }
    }
    Ok(deleted)
}

/// Insert one element's row: fixed columns, value column, then whatever
/// attribute columns the element carries.
async fn insert_element(tx: &Transaction<'_>, schema: &str, element: &Element) -> Result<()> {
    let value_column = naming::value_column(&element.table_name);
    let attribute_columns = element.attribute_columns();

    let element_id = element.element_id.to_string();
    let parent_id = element.parent_element_id.map(|id| id.to_string());
    let report_uuid = element.report_uuid.to_string();

    // Parameters are bound in the builder's column order: fixed columns,
    // value column, then attribute columns.
    let mut params: Vec<&(dyn ToSql + Sync)> = vec![
        &element_id,
        &parent_id,
        &report_uuid,
        &element.original_tag_name,
        &element.text_value,
    ];
    let mut attr_names: Vec<&str> = Vec::with_capacity(attribute_columns.len());
    for (column, value) in &attribute_columns {
        attr_names.push(column.as_str());
        params.push(value);
    }

    let sql = schema::insert_element_sql(
        schema,
        &element.table_name,
        value_column.as_str(),
        &attr_names,
    );

    tx.execute(sql.as_str(), &params)
        .await
        .map_err(|source| IngestError::WriteError {
            table: element.table_name.clone(),
            source,
        })?;
    Ok(())
}

/// Roll the run into quarantine after a failure. The data transaction has
/// already been dropped (rolled back) by the time this runs.
async fn quarantine_run(
    client: &Client,
    config: &Config,
    path: &Path,
    digest: &str,
    err: IngestError,
) -> Result<IngestOutcome> {
    warn!(error = %err, path = %path.display(), "ingestion failed, quarantining source file");
    let moved_to = quarantine::quarantine(path, &config.error_dir).map_err(|source| {
        IngestError::RelocateError {
            path: path.to_path_buf(),
            source,
        }
    })?;
    record_ingestion(client, config, path, digest, err.status_label()).await;
    Ok(IngestOutcome::Quarantined {
        reason: err.to_string(),
        moved_to,
    })
}

/// Create the target schema and the ingestion log table outside the data
/// transaction, so audit rows survive a rolled-back run.
async fn prepare_bookkeeping(client: &Client, schema: &str) -> Result<()> {
    if schema != "public" {
        let sql = schema::create_schema_sql(schema);
        client
            .batch_execute(&sql)
            .await
            .map_err(|source| IngestError::SchemaError {
                statement: sql,
                source,
            })?;
    }
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {}.{} (\
         \"processed_file_id\" TEXT PRIMARY KEY, \
         \"original_file_name\" TEXT NOT NULL, \
         \"sha256\" TEXT, \
         \"processed_at\" TIMESTAMPTZ NOT NULL DEFAULT now(), \
         \"status\" TEXT NOT NULL)",
        quote_ident(schema),
        quote_ident(INGESTION_LOG_TABLE)
    );
    client
        .batch_execute(&sql)
        .await
        .map_err(|source| IngestError::SchemaError {
            statement: sql,
            source,
        })
}

/// Append one audit row for this run. Best effort: a failure here is
/// logged but never changes the run's outcome.
async fn record_ingestion(
    client: &Client,
    config: &Config,
    path: &Path,
    digest: &str,
    status: &str,
) {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    let id = Uuid::new_v4().to_string();
    let sql = format!(
        "INSERT INTO {}.{} (\"processed_file_id\", \"original_file_name\", \"sha256\", \"status\") \
         VALUES ($1, $2, $3, $4)",
        quote_ident(&config.schema),
        quote_ident(INGESTION_LOG_TABLE)
    );
    match client
        .execute(sql.as_str(), &[&id, &file_name, &digest, &status])
        .await
    {
        Ok(_) => debug!(file = file_name, status, "recorded ingestion log row"),
        Err(e) => warn!(error = %e, file = file_name, "failed to record ingestion log row"),
    }
}
