//! Tree Loader: NEMSIS XML documents into element forests
//!
//! Pure transformation from document text to a [`Forest`]: no side
//! effects, and no partial output on failure. Every `PatientCareReport`
//! element in the document is a report root; its report UUID lives at the
//! fixed, well-known `eRecord.01` descendant and is propagated to every
//! node of the subtree. Elements outside report subtrees are structural
//! wrappers and are not loaded.

use std::path::Path;

use encoding_rs::Encoding;
use roxmltree::{Document, Node};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::model::{Element, Forest};
use crate::naming;

/// Tag of the report-root element.
pub const REPORT_ROOT_TAG: &str = "PatientCareReport";

/// Tag of the element carrying the report UUID.
pub const REPORT_UUID_TAG: &str = "eRecord.01";

/// Decode raw file bytes into document text.
///
/// Honors a byte-order mark when present, otherwise assumes UTF-8; vendor
/// exports occasionally arrive as UTF-16.
pub fn decode_document(bytes: &[u8], path: &Path) -> Result<String> {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(IngestError::InvalidDocument {
            path: path.to_path_buf(),
            message: format!("file is not valid {} text", encoding.name()),
        });
    }
    Ok(text.into_owned())
}

/// Parse one document into an ordered element forest.
///
/// Fails with no partial output when the XML is malformed, no report-root
/// element exists, or a report is missing its UUID.
pub fn parse_document(text: &str, path: &Path) -> Result<Forest> {
    let doc = Document::parse(text).map_err(|source| IngestError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;

    let mut forest = Forest::default();
    let mut report_count = 0usize;

    for node in doc.descendants().filter(|n| is_report_root(n)) {
        report_count += 1;
        let report_uuid = report_uuid_of(&node, path)?;
        forest.report_uuids.insert(report_uuid);
        let parent_path = node
            .parent_element()
            .map(|parent| ancestor_path(&parent))
            .unwrap_or_default();
        walk(node, None, &parent_path, report_uuid, &mut forest.elements);
    }

    if report_count == 0 {
        return Err(IngestError::InvalidDocument {
            path: path.to_path_buf(),
            message: format!("no <{REPORT_ROOT_TAG}> element found"),
        });
    }

    Ok(forest)
}

/// A report root is a `PatientCareReport` not nested inside another one.
fn is_report_root(node: &Node) -> bool {
    node.is_element()
        && node.tag_name().name() == REPORT_ROOT_TAG
        && node
            .ancestors()
            .skip(1)
            .all(|a| a.tag_name().name() != REPORT_ROOT_TAG)
}

/// Extract and validate the report UUID from a report subtree.
fn report_uuid_of(report: &Node, path: &Path) -> Result<Uuid> {
    let text = report
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == REPORT_UUID_TAG)
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| IngestError::MissingReportUuid {
            path: path.to_path_buf(),
            message: format!("<{REPORT_UUID_TAG}> element missing or empty"),
        })?;

    Uuid::parse_str(text).map_err(|e| IngestError::MissingReportUuid {
        path: path.to_path_buf(),
        message: format!("<{REPORT_UUID_TAG}> value {text:?} is not a UUID: {e}"),
    })
}

/// Slash-joined element path from the document root down to `node`.
fn ancestor_path(node: &Node) -> String {
    let mut parts: Vec<&str> = node
        .ancestors()
        .filter(|a| a.is_element())
        .map(|a| a.tag_name().name())
        .collect();
    parts.reverse();
    parts.join("/")
}

/// Depth-first walk emitting elements in document order, parents first.
fn walk(
    node: Node,
    parent: Option<(Uuid, &str)>,
    parent_path: &str,
    report_uuid: Uuid,
    out: &mut Vec<Element>,
) {
    let tag = node.tag_name().name();
    let tag_path = if parent_path.is_empty() {
        tag.to_string()
    } else {
        format!("{parent_path}/{tag}")
    };
    let table_name = naming::table_name(tag);
    let element_id = Uuid::new_v4();

    let attributes = node
        .attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();
    let text_value = node
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    out.push(Element {
        element_id,
        parent_element_id: parent.map(|(id, _)| id),
        report_uuid,
        original_tag_name: tag.to_string(),
        tag_path: tag_path.clone(),
        table_name: table_name.clone(),
        parent_table_name: parent.map(|(_, table)| table.to_string()),
        attributes,
        text_value,
    });

    for child in node.children().filter(|c| c.is_element()) {
        walk(
            child,
            Some((element_id, &table_name)),
            &tag_path,
            report_uuid,
            out,
        );
    }
}
