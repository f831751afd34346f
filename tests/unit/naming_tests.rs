//! Unit tests for the identifier naming resolver
//!
//! Derived names are part of the persisted schema, so these tests pin the
//! sanitization and truncation contract exactly.

use nemsis_ingest::naming;
use pretty_assertions::assert_eq;

// ============================================================================
// Sanitization
// ============================================================================

#[test]
fn test_sanitize_lowercases_and_replaces_dots() {
    assert_eq!(naming::sanitize("eVitals.01"), "evitals_01");
}

#[test]
fn test_sanitize_replaces_any_non_alphanumeric() {
    assert_eq!(naming::sanitize("a b/c-d:e"), "a_b_c_d_e");
}

#[test]
fn test_sanitize_collapses_repeated_separators() {
    assert_eq!(naming::sanitize("a--b..__c"), "a_b_c");
}

#[test]
fn test_sanitize_prefixes_leading_digit() {
    assert_eq!(naming::sanitize("01Record"), "_01record");
}

#[test]
fn test_sanitize_is_deterministic() {
    let first = naming::sanitize("eDisposition.IncidentDispositionGroup");
    let second = naming::sanitize("eDisposition.IncidentDispositionGroup");
    assert_eq!(first, second);
}

// ============================================================================
// Length bounding (truncate + hash)
// ============================================================================

#[test]
fn test_bounded_passes_short_names_through() {
    assert_eq!(naming::bounded("evitals_01"), "evitals_01");
}

#[test]
fn test_bounded_exact_limit_is_unchanged() {
    let name = "a".repeat(63);
    assert_eq!(naming::bounded(&name), name);
}

#[test]
fn test_bounded_truncates_to_limit() {
    let name = "a".repeat(80);
    let bounded = naming::bounded(&name);
    assert_eq!(bounded.len(), naming::MAX_IDENTIFIER_LEN);
    assert!(
        bounded.starts_with(&"a".repeat(54)),
        "truncated stem must keep the first 54 bytes: {bounded}"
    );
    assert_eq!(bounded.as_bytes()[54], b'_');
}

#[test]
fn test_bounded_distinguishes_long_names_sharing_a_prefix() {
    let base = "x".repeat(60);
    let first = naming::bounded(&format!("{base}_alpha"));
    let second = naming::bounded(&format!("{base}_omega"));
    assert_ne!(first, second, "hash suffix must separate distinct inputs");
    assert_eq!(first.len(), 63);
    assert_eq!(second.len(), 63);
}

#[test]
fn test_bounded_is_stable_across_calls() {
    let name = "q".repeat(200);
    assert_eq!(naming::bounded(&name), naming::bounded(&name));
}

// ============================================================================
// Resolved names
// ============================================================================

#[test]
fn test_table_name_for_nemsis_tag() {
    assert_eq!(naming::table_name("eVitals.01"), "evitals_01");
    assert_eq!(naming::table_name("PatientCareReport"), "patientcarereport");
}

#[test]
fn test_value_column_appends_suffix() {
    assert_eq!(naming::value_column("evitals_01"), "evitals_01_value");
}

#[test]
fn test_value_column_stays_within_limit_for_long_tables() {
    let table = naming::table_name(&"t".repeat(63));
    let value = naming::value_column(&table);
    assert!(value.len() <= naming::MAX_IDENTIFIER_LEN);
}

#[test]
fn test_column_name_sanitizes_attributes() {
    assert_eq!(naming::column_name("ETCO2"), "etco2");
    assert_eq!(naming::column_name("xsi:nil"), "xsi_nil");
}

#[test]
fn test_constraint_name_short_pair() {
    assert_eq!(
        naming::constraint_name("evitals_01", "evitals_vitalgroup"),
        "fk_evitals_01_evitals_vitalgroup"
    );
}

#[test]
fn test_constraint_name_long_pair_is_bounded_and_unique() {
    let child = "c".repeat(50);
    let parent_a = "p".repeat(50);
    let parent_b = format!("{}{}", "p".repeat(49), "q");

    let name_a = naming::constraint_name(&child, &parent_a);
    let name_b = naming::constraint_name(&child, &parent_b);

    assert_eq!(name_a.len(), naming::MAX_IDENTIFIER_LEN);
    assert!(name_a.starts_with("fk_"));
    assert_ne!(name_a, name_b);
}
