//! Schema Evolution Manager: idempotent, additive DDL
//!
//! Tables and columns are created on first encounter and only ever added
//! to, never dropped, renamed, or retyped. Every statement is written so
//! that two concurrent runs discovering the same shape for the first time
//! cannot crash each other: `IF NOT EXISTS` throughout, and every DDL
//! statement runs under a savepoint that swallows a losing creator's
//! duplicate error (foreign keys get the same treatment in
//! [`relationships`]). All dynamic identifiers are produced by
//! [`crate::naming`] and are safe to interpolate quoted.
//!
//! The SQL text builders are pure functions, separated from the executors
//! so the exact statements are unit-testable without a database.

use tokio_postgres::error::SqlState;
use tokio_postgres::Transaction;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::model::TablePlan;

pub mod relationships;

/// Fixed bookkeeping table; excluded from dynamic-table discovery.
pub const INGESTION_LOG_TABLE: &str = "xml_files_processed";

/// Quote an identifier for interpolation into DDL/DML.
///
/// Only sanitized or validated identifiers may be passed here; they never
/// contain a double quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// `CREATE SCHEMA` statement for a non-public target schema.
pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// `CREATE TABLE` statement with the fixed columns, the value column, and
/// any attribute columns already known for the table.
pub fn create_table_sql(schema: &str, plan: &TablePlan) -> String {
    let mut columns = vec![
        "\"element_id\" TEXT PRIMARY KEY".to_string(),
        "\"parent_element_id\" TEXT".to_string(),
        "\"report_uuid\" TEXT".to_string(),
        "\"original_tag_name\" TEXT".to_string(),
        format!("{} TEXT", quote_ident(&plan.value_column)),
    ];
    for column in &plan.attribute_columns {
        columns.push(format!("{} TEXT", quote_ident(column)));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {}.{} ({})",
        quote_ident(schema),
        quote_ident(&plan.table_name),
        columns.join(", ")
    )
}

/// `ADD COLUMN` statement for one attribute-derived column.
pub fn add_column_sql(schema: &str, table: &str, column: &str) -> String {
    format!(
        "ALTER TABLE {}.{} ADD COLUMN IF NOT EXISTS {} TEXT",
        quote_ident(schema),
        quote_ident(table),
        quote_ident(column)
    )
}

/// `DELETE` statement purging one report's rows from one table.
pub fn delete_report_sql(schema: &str, table: &str) -> String {
    format!(
        "DELETE FROM {}.{} WHERE \"report_uuid\" = $1",
        quote_ident(schema),
        quote_ident(table)
    )
}

/// `INSERT` statement for one element row: the fixed columns, the value
/// column, then the given attribute columns, with one placeholder per
/// column in the same order. Parameter values must be bound in exactly
/// this order.
pub fn insert_element_sql(
    schema: &str,
    table: &str,
    value_column: &str,
    attribute_columns: &[&str],
) -> String {
    let mut columns: Vec<&str> = vec![
        "element_id",
        "parent_element_id",
        "report_uuid",
        "original_tag_name",
        value_column,
    ];
    columns.extend_from_slice(attribute_columns);

    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {}.{} ({column_list}) VALUES ({placeholders})",
        quote_ident(schema),
        quote_ident(table)
    )
}

/// `COMMENT ON TABLE` statement attaching the source tag path.
///
/// `COMMENT ON` takes no bind parameters, so the text is embedded as an
/// escaped literal.
pub fn comment_sql(schema: &str, table: &str, comment: &str) -> String {
    format!(
        "COMMENT ON TABLE {}.{} IS '{}'",
        quote_ident(schema),
        quote_ident(table),
        comment.replace('\'', "''")
    )
}

/// Ensure the target schema exists. No-op for `public`, which always
/// exists and is typically not owned by the ingestion role.
pub async fn ensure_schema(tx: &mut Transaction<'_>, schema: &str) -> Result<()> {
    if schema == "public" {
        return Ok(());
    }
    execute_ddl(tx, &create_schema_sql(schema)).await
}

/// Ensure the table exists with all currently known columns, and attach
/// the source tag path as its comment when none is set yet.
pub async fn ensure_table(tx: &mut Transaction<'_>, schema: &str, plan: &TablePlan) -> Result<()> {
    execute_ddl(tx, &create_table_sql(schema, plan)).await?;
    if current_comment(tx, schema, &plan.table_name).await?.is_none() {
        execute_ddl(tx, &comment_sql(schema, &plan.table_name, &plan.source_tag_path)).await?;
    }
    ensure_columns(tx, schema, plan).await
}

/// Add any attribute-derived column not already present. Existing columns
/// are never touched.
pub async fn ensure_columns(tx: &mut Transaction<'_>, schema: &str, plan: &TablePlan) -> Result<()> {
    for column in &plan.attribute_columns {
        execute_ddl(tx, &add_column_sql(schema, &plan.table_name, column)).await?;
    }
    Ok(())
}

/// Every base table in the schema carrying a `report_uuid` column, i.e.
/// every dynamic table ever created, regardless of whether the current
/// document touches it.
pub async fn tables_with_report_column(
    tx: &Transaction<'_>,
    schema: &str,
) -> Result<Vec<String>> {
    const SQL: &str = "SELECT t.table_name \
         FROM information_schema.tables t \
         JOIN information_schema.columns c \
           ON c.table_schema = t.table_schema AND c.table_name = t.table_name \
         WHERE t.table_schema = $1 \
           AND t.table_type = 'BASE TABLE' \
           AND c.column_name = 'report_uuid' \
           AND t.table_name <> $2";
    let rows = tx.query(SQL, &[&schema, &INGESTION_LOG_TABLE]).await?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

async fn current_comment(
    tx: &Transaction<'_>,
    schema: &str,
    table: &str,
) -> Result<Option<String>> {
    const SQL: &str = "SELECT obj_description(c.oid, 'pg_class') \
         FROM pg_class c \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         WHERE n.nspname = $1 AND c.relname = $2";
    let row = tx.query_opt(SQL, &[&schema, &table]).await?;
    Ok(row.and_then(|r| r.get::<_, Option<String>>(0)))
}

/// Whether an error code signals that a losing concurrent creator found
/// the definition already in place. `IF NOT EXISTS` does not fully close
/// that window: two sessions can pass the existence check together, and
/// the loser surfaces a duplicate error anyway.
pub fn is_duplicate_definition(code: &SqlState) -> bool {
    *code == SqlState::DUPLICATE_SCHEMA
        || *code == SqlState::DUPLICATE_TABLE
        || *code == SqlState::DUPLICATE_COLUMN
        || *code == SqlState::DUPLICATE_OBJECT
        || *code == SqlState::UNIQUE_VIOLATION
}

async fn execute_ddl(tx: &mut Transaction<'_>, sql: &str) -> Result<()> {
    debug!(sql, "executing DDL");

    // Run each statement under a savepoint so a duplicate error from a
    // losing concurrent creator can be swallowed without poisoning the
    // enclosing transaction.
    let savepoint = tx.savepoint("ensure_ddl").await?;
    match savepoint.batch_execute(sql).await {
        Ok(()) => savepoint.commit().await?,
        Err(e) if e.code().is_some_and(is_duplicate_definition) => {
            debug!(sql, "lost creation race, definition exists");
            savepoint.rollback().await?;
        }
        Err(source) => {
            return Err(IngestError::SchemaError {
                statement: sql.to_string(),
                source,
            });
        }
    }
    Ok(())
}
