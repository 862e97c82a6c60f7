//! Shared fixtures for the integration suites: a small mirrored subgraph of
//! people with statements, qualifiers, and references.

#![allow(dead_code)]

use claimsync::query::QueryRow;
use claimsync::test_support::{FixedDatatypes, ScriptedQuery};
use claimsync::{BaseFilter, CacheSettings, PropertyId};

pub fn human_settings() -> CacheSettings {
    CacheSettings::new(BaseFilter::new().require_any(PropertyId::new("P31")))
        .with_page_size(100)
}

pub fn row(entity: &str, statement: &str, value: &str) -> QueryRow {
    QueryRow {
        statement_id: statement.to_string(),
        entity_id: entity.to_string(),
        value: value.to_string(),
        ..QueryRow::default()
    }
}

pub fn row_with_ref(
    entity: &str,
    statement: &str,
    value: &str,
    ref_id: &str,
    ref_property: &str,
    ref_value: &str,
) -> QueryRow {
    QueryRow {
        statement_id: statement.to_string(),
        entity_id: entity.to_string(),
        value: value.to_string(),
        reference_id: Some(ref_id.to_string()),
        reference_property: Some(ref_property.to_string()),
        reference_value: Some(ref_value.to_string()),
        ..QueryRow::default()
    }
}

/// Two humans: Q1 (born 1952, statement referenced to Q3047275) and Q2
/// (born 1960, unreferenced)
pub fn seeded_query() -> ScriptedQuery {
    let mut query = ScriptedQuery::new();
    query.add_row(
        "P31",
        row_with_ref("Q1", "Q1-stmt-instance", "Q5", "hash1", "P248", "Q3047275"),
    );
    query.add_row("P31", row("Q2", "Q2-stmt-instance", "Q5"));
    query.add_row("P569", row("Q1", "Q1-stmt-born", "+1952-03-11T00:00:00Z"));
    query.add_row("P569", row("Q2", "Q2-stmt-born", "+1960-01-01T00:00:00Z"));
    query
}

pub fn datatypes() -> FixedDatatypes {
    FixedDatatypes::new()
        .with("P31", "wikibase-item")
        .with("P569", "time")
        .with("P248", "wikibase-item")
        .with("P1082", "quantity")
}
