//! Unit tests for schema plan derivation from an element forest

use std::path::Path;

use nemsis_ingest::model::{Forest, FIXED_COLUMNS};
use nemsis_ingest::parser;
use pretty_assertions::assert_eq;

const REPORT_UUID: &str = "11111111-2222-3333-4444-555555555555";

fn forest_for(doc: &str) -> Forest {
    parser::parse_document(doc, Path::new("test.xml")).unwrap()
}

fn vitals_document() -> String {
    format!(
        r#"<EMSDataSet>
  <PatientCareReport>
    <eRecord><eRecord.01>{REPORT_UUID}</eRecord.01></eRecord>
    <eVitals>
      <eVitals.VitalGroup>
        <eVitals.01 ETCO2="38">98.6</eVitals.01>
      </eVitals.VitalGroup>
      <eVitals.VitalGroup>
        <eVitals.01 PulseOx="97">99.1</eVitals.01>
      </eVitals.VitalGroup>
    </eVitals>
  </PatientCareReport>
</EMSDataSet>"#
    )
}

// ============================================================================
// Table plans
// ============================================================================

#[test]
fn test_table_plans_one_per_distinct_tag() {
    let forest = forest_for(&vitals_document());
    let plans = forest.table_plans();

    let expected: Vec<&str> = vec![
        "erecord",
        "erecord_01",
        "evitals",
        "evitals_01",
        "evitals_vitalgroup",
        "patientcarereport",
    ];
    let actual: Vec<&str> = plans.keys().map(String::as_str).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_table_plan_value_column_and_comment_path() {
    let forest = forest_for(&vitals_document());
    let plans = forest.table_plans();
    let plan = &plans["evitals_01"];

    assert_eq!(plan.value_column, "evitals_01_value");
    assert_eq!(
        plan.source_tag_path,
        "EMSDataSet/PatientCareReport/eVitals/eVitals.VitalGroup/eVitals.01"
    );
}

#[test]
fn test_table_plan_unions_attribute_columns_across_elements() {
    let forest = forest_for(&vitals_document());
    let plans = forest.table_plans();
    let columns: Vec<&str> = plans["evitals_01"]
        .attribute_columns
        .iter()
        .map(String::as_str)
        .collect();

    // Both vital groups contribute their attribute, sanitized.
    assert_eq!(columns, vec!["etco2", "pulseox"]);
}

#[test]
fn test_attribute_shadowing_fixed_column_is_dropped() {
    let doc = format!(
        r#"<EMSDataSet><PatientCareReport>
            <eRecord><eRecord.01>{REPORT_UUID}</eRecord.01></eRecord>
            <eOther.01 element_id="vendor-junk" Vendor="acme">x</eOther.01>
        </PatientCareReport></EMSDataSet>"#
    );
    let forest = forest_for(&doc);
    let element = forest
        .elements
        .iter()
        .find(|e| e.original_tag_name == "eOther.01")
        .unwrap();
    let columns = element.attribute_columns();

    assert!(!columns.contains_key("element_id"));
    assert_eq!(columns.get("vendor").copied(), Some("acme"));
    for fixed in FIXED_COLUMNS {
        assert!(!columns.contains_key(fixed));
    }
}

// ============================================================================
// Relationships
// ============================================================================

#[test]
fn test_relationships_one_per_ordered_pair() {
    let forest = forest_for(&vitals_document());
    let relationships = forest.relationships();

    // Repeated VitalGroup/eVitals.01 nesting still yields a single pair.
    let vitals_pairs: Vec<_> = relationships
        .iter()
        .filter(|r| r.child_table == "evitals_01")
        .collect();
    assert_eq!(vitals_pairs.len(), 1);
    assert_eq!(vitals_pairs[0].parent_table, "evitals_vitalgroup");
    assert_eq!(
        vitals_pairs[0].constraint_name,
        "fk_evitals_01_evitals_vitalgroup"
    );
}

#[test]
fn test_report_root_produces_no_relationship() {
    let forest = forest_for(&vitals_document());
    assert!(forest
        .relationships()
        .iter()
        .all(|r| r.child_table != "patientcarereport"));
}

#[test]
fn test_relationship_count_for_sample() {
    let forest = forest_for(&vitals_document());
    // erecord->pcr, erecord_01->erecord, evitals->pcr,
    // vitalgroup->evitals, evitals_01->vitalgroup
    assert_eq!(forest.relationships().len(), 5);
}
