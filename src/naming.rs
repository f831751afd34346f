//! Deterministic mapping from XML tag paths to SQL identifiers.
//!
//! Table, column, and constraint names are pure functions of their source
//! text: the same input always resolves to the same identifier, across
//! processes and versions. This is part of the persisted schema's
//! compatibility surface, so the truncation contract below is fixed.
//!
//! Truncation contract: PostgreSQL limits identifiers to 63 bytes
//! (NAMEDATALEN - 1). A sanitized name over the limit keeps its first 54
//! bytes, then an underscore, then the first 8 hex characters of the
//! SHA-256 digest of the full sanitized name (54 + 1 + 8 = 63).

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// PostgreSQL identifier length limit in bytes (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

const HASH_SUFFIX_LEN: usize = 8;
const TRUNCATED_STEM_LEN: usize = MAX_IDENTIFIER_LEN - HASH_SUFFIX_LEN - 1;

static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Sanitize raw XML-derived text into a valid identifier fragment.
///
/// Lower-cases the input, replaces every run of non-alphanumeric
/// characters with a single underscore, and prefixes an underscore when
/// the result would start with a digit. `eVitals.01` becomes `evitals_01`.
pub fn sanitize(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut name = NON_IDENTIFIER.replace_all(&lowered, "_").into_owned();
    if name.as_bytes().first().is_some_and(|b| b.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Bound a sanitized identifier to the PostgreSQL length limit.
///
/// Names at or under the limit pass through unchanged. Longer names are
/// truncated and suffixed with a stable digest of the untruncated name so
/// distinct inputs stay distinct. Input must already be sanitized (ASCII).
pub fn bounded(name: &str) -> String {
    if name.len() <= MAX_IDENTIFIER_LEN {
        return name.to_string();
    }
    let digest = Sha256::digest(name.as_bytes());
    let suffix = hex::encode(&digest[..HASH_SUFFIX_LEN / 2]);
    format!("{}_{}", &name[..TRUNCATED_STEM_LEN], suffix)
}

/// Resolve the table name for an XML tag.
pub fn table_name(tag: &str) -> String {
    bounded(&sanitize(tag))
}

/// Resolve the column name for an XML attribute, scoped to its table.
pub fn column_name(attribute: &str) -> String {
    bounded(&sanitize(attribute))
}

/// Name of the per-table scalar column holding element text content.
pub fn value_column(table_name: &str) -> String {
    bounded(&format!("{table_name}_value"))
}

/// Deterministic name for the parent/child foreign-key constraint.
pub fn constraint_name(child_table: &str, parent_table: &str) -> String {
    bounded(&format!("fk_{child_table}_{parent_table}"))
}
