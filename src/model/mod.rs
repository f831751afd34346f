//! In-memory model of one parsed NEMSIS document
//!
//! The Tree Loader produces a [`Forest`] of [`Element`] records; the
//! schema plan ([`TablePlan`], [`Relationship`]) is derived from the
//! forest as a pure function, with no database access. The database's own
//! catalog stays the single source of truth for what already exists;
//! nothing here is cached across ingestion runs.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::naming;

/// Columns present on every dynamic table, in insertion order.
///
/// Attribute-derived columns may never shadow these; a clashing attribute
/// name is dropped at planning time.
pub const FIXED_COLUMNS: [&str; 4] = [
    "element_id",
    "parent_element_id",
    "report_uuid",
    "original_tag_name",
];

/// One XML node instance, mapped to one relational row.
///
/// Created once per parse pass and never mutated; re-ingesting the same
/// report supersedes prior rows rather than editing them.
#[derive(Debug, Clone)]
pub struct Element {
    /// Generated primary key of the element's row.
    pub element_id: Uuid,
    /// `None` only for report-root elements.
    pub parent_element_id: Option<Uuid>,
    /// UUID of the owning patient-care report, propagated to every node.
    pub report_uuid: Uuid,
    /// Source XML tag, unsanitized.
    pub original_tag_name: String,
    /// Slash-joined tag path from the document root, kept for provenance.
    pub tag_path: String,
    /// Resolved table this element's row lands in.
    pub table_name: String,
    /// Resolved table of the parent element, when one exists.
    pub parent_table_name: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub text_value: Option<String>,
}

impl Element {
    /// Attribute columns eligible for insertion: sanitized, deduplicated,
    /// and filtered against the fixed and value columns.
    pub fn attribute_columns(&self) -> BTreeMap<String, &str> {
        let value_column = naming::value_column(&self.table_name);
        let mut columns = BTreeMap::new();
        for (name, value) in &self.attributes {
            let column = naming::column_name(name);
            if column.is_empty()
                || FIXED_COLUMNS.contains(&column.as_str())
                || column == value_column
            {
                continue;
            }
            // First attribute wins when two sanitize to the same column.
            columns.entry(column).or_insert(value.as_str());
        }
        columns
    }
}

/// Everything a dynamic table needs to exist before rows are written.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table_name: String,
    /// Per-table scalar column holding element text content.
    pub value_column: String,
    /// First-seen source tag path, stored as the table comment.
    pub source_tag_path: String,
    /// Sanitized attribute-derived columns, all nullable TEXT.
    pub attribute_columns: BTreeSet<String>,
}

/// One observed parent/child table pair, materialized as a foreign key
/// with `ON DELETE CASCADE`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Relationship {
    pub constraint_name: String,
    pub child_table: String,
    pub parent_table: String,
}

/// Ordered element forest for one document.
///
/// Elements appear in document order, parents before children, so rows can
/// be inserted in iteration order without violating foreign keys.
#[derive(Debug, Default)]
pub struct Forest {
    pub elements: Vec<Element>,
    /// Distinct report UUIDs carried by this document.
    pub report_uuids: BTreeSet<Uuid>,
}

impl Forest {
    /// Derive the table plans for every distinct tag in the forest.
    ///
    /// Attribute columns are unioned across all elements sharing a table;
    /// the comment path comes from the first element encountered.
    pub fn table_plans(&self) -> BTreeMap<String, TablePlan> {
        let mut plans: BTreeMap<String, TablePlan> = BTreeMap::new();
        for element in &self.elements {
            let plan = plans
                .entry(element.table_name.clone())
                .or_insert_with(|| TablePlan {
                    table_name: element.table_name.clone(),
                    value_column: naming::value_column(&element.table_name),
                    source_tag_path: element.tag_path.clone(),
                    attribute_columns: BTreeSet::new(),
                });
            plan.attribute_columns
                .extend(element.attribute_columns().into_keys());
        }
        plans
    }

    /// Derive the distinct parent/child table pairs observed in the forest.
    pub fn relationships(&self) -> BTreeSet<Relationship> {
        self.elements
            .iter()
            .filter_map(|element| {
                let parent = element.parent_table_name.as_ref()?;
                Some(Relationship {
                    constraint_name: naming::constraint_name(&element.table_name, parent),
                    child_table: element.table_name.clone(),
                    parent_table: parent.clone(),
                })
            })
            .collect()
    }
}
