//! Builders and scripted collaborators shared by unit tests, integration
//! tests, and benches.

use crate::config::BaseFilter;
use crate::model::{EntityId, PropertyId, Reference, Snak, Statement, Value};
use crate::query::{
    DatatypeResolver, PageRequest, QueryRow, SubgraphQuery, TermKind, TermQuery, TermRow,
};
use anyhow::{anyhow, Result};
use hashbrown::HashMap;

/// An item-valued snak
pub fn item_snak(property: &str, target: &str) -> Snak {
    Snak::new(
        PropertyId::new(property),
        "wikibase-item",
        Value::Entity(EntityId::new(target)),
    )
}

/// A plain item-valued statement
pub fn item_statement(property: &str, target: &str) -> Statement {
    Statement::new(item_snak(property, target))
}

/// A string-valued statement
pub fn text_statement(property: &str, text: &str) -> Statement {
    Statement::new(Snak::new(
        PropertyId::new(property),
        "string",
        Value::Text(text.to_string()),
    ))
}

/// A reference block of item-valued snaks
pub fn item_reference(entries: &[(&str, &str)]) -> Reference {
    Reference::new(
        entries
            .iter()
            .map(|(property, target)| item_snak(property, target))
            .collect(),
    )
}

/// In-memory paged query collaborator: rows are scripted per property and
/// served back page by page, counting pages for assertions.
#[derive(Debug, Default)]
pub struct ScriptedQuery {
    rows: HashMap<String, Vec<QueryRow>>,
    pages_served: usize,
}

impl ScriptedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, property: &str, row: QueryRow) {
        self.rows.entry(property.to_string()).or_default().push(row);
    }

    pub fn pages_served(&self) -> usize {
        self.pages_served
    }
}

impl SubgraphQuery for ScriptedQuery {
    fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<Vec<QueryRow>> {
        self.pages_served += 1;
        let rows = self
            .rows
            .get(request.property.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default();
        let start = request.offset.min(rows.len());
        let end = (request.offset + request.limit).min(rows.len());
        Ok(rows[start..end].to_vec())
    }
}

/// Datatype resolver over a fixed property → tag table, counting lookups
/// so tests can assert memoization
#[derive(Debug, Default)]
pub struct FixedDatatypes {
    tags: HashMap<String, String>,
    lookups: usize,
}

impl FixedDatatypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, property: &str, tag: &str) -> Self {
        self.tags.insert(property.to_string(), tag.to_string());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

impl DatatypeResolver for FixedDatatypes {
    fn datatype(&mut self, property: &PropertyId) -> Result<String> {
        self.lookups += 1;
        self.tags
            .get(property.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("unknown datatype for {property}"))
    }
}

/// Term query collaborator over scripted (language, kind) rows
#[derive(Debug, Default)]
pub struct ScriptedTerms {
    rows: HashMap<(String, TermKind), Vec<TermRow>>,
    queries_served: usize,
}

impl ScriptedTerms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, language: &str, kind: TermKind, entity: &str, value: &str) {
        self.rows
            .entry((language.to_string(), kind))
            .or_default()
            .push(TermRow {
                entity_id: entity.to_string(),
                value: value.to_string(),
            });
    }

    pub fn queries_served(&self) -> usize {
        self.queries_served
    }
}

impl TermQuery for ScriptedTerms {
    fn fetch_terms(
        &mut self,
        _filter: &BaseFilter,
        language: &str,
        kind: TermKind,
    ) -> Result<Vec<TermRow>> {
        self.queries_served += 1;
        Ok(self
            .rows
            .get(&(language.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }
}
