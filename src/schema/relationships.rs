//! Relationship Builder: parent→child foreign keys
//!
//! Each observed parent/child table pair becomes one `FOREIGN KEY
//! (parent_element_id) REFERENCES parent (element_id) ON DELETE CASCADE`
//! constraint, so deleting a report's root rows transitively removes all
//! descendant rows without enumerating tables. Creation is idempotent:
//! the constraint catalog is checked first, and a losing concurrent
//! creator's duplicate error is swallowed via a savepoint so the enclosing
//! transaction survives.

use tokio_postgres::error::SqlState;
use tokio_postgres::Transaction;
use tracing::debug;

use super::quote_ident;
use crate::error::{IngestError, Result};
use crate::model::Relationship;

/// `ADD CONSTRAINT` statement for one parent/child pair.
pub fn foreign_key_sql(schema: &str, rel: &Relationship) -> String {
    format!(
        "ALTER TABLE {schema_q}.{child} ADD CONSTRAINT {name} \
         FOREIGN KEY (\"parent_element_id\") \
         REFERENCES {schema_q}.{parent} (\"element_id\") ON DELETE CASCADE",
        schema_q = quote_ident(schema),
        child = quote_ident(&rel.child_table),
        name = quote_ident(&rel.constraint_name),
        parent = quote_ident(&rel.parent_table),
    )
}

/// Create the foreign key unless it already exists.
pub async fn ensure_foreign_key(
    tx: &mut Transaction<'_>,
    schema: &str,
    rel: &Relationship,
) -> Result<()> {
    const EXISTS_SQL: &str = "SELECT 1 FROM information_schema.table_constraints \
         WHERE constraint_schema = $1 AND table_name = $2 AND constraint_name = $3";

    let found = tx
        .query_opt(EXISTS_SQL, &[&schema, &rel.child_table, &rel.constraint_name])
        .await?;
    if found.is_some() {
        debug!(constraint = %rel.constraint_name, "foreign key already exists");
        return Ok(());
    }

    let sql = foreign_key_sql(schema, rel);
    debug!(sql, "creating foreign key");

    // A concurrent run may create the same constraint between our catalog
    // check and the ALTER; the savepoint keeps that benign race from
    // aborting the whole transaction.
    let savepoint = tx.savepoint("ensure_fk").await?;
    match savepoint.batch_execute(&sql).await {
        Ok(()) => savepoint.commit().await?,
        Err(e) if e.code() == Some(&SqlState::DUPLICATE_OBJECT) => {
            debug!(constraint = %rel.constraint_name, "lost creation race, constraint exists");
            savepoint.rollback().await?;
        }
        Err(source) => {
            return Err(IngestError::ConstraintError {
                constraint: rel.constraint_name.clone(),
                source,
            });
        }
    }
    Ok(())
}
