//! # Query Collaborators
//!
//! Trait seams for the external services this crate consumes: the paged
//! subgraph query, the property-datatype lookup, and the term
//! (label/description/alias) query. Transport, retry, and authentication
//! live behind these traits; any failure they return is propagated
//! unmodified.

use crate::config::BaseFilter;
use crate::model::PropertyId;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One page request against the remote subgraph
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    /// The base filter constraining the subgraph
    pub filter: &'a BaseFilter,
    /// The property whose statements are being mirrored
    pub property: &'a PropertyId,
    /// Row offset of this page
    pub offset: usize,
    /// Maximum rows in this page
    pub limit: usize,
    /// Whether reference columns should be populated
    pub include_references: bool,
}

/// One row of a paged subgraph query.
///
/// A statement with qualifiers and references is returned as multiple rows
/// sharing a `statement_id`; qualifier and reference columns are optional
/// and independently present. Ids may arrive as full URIs; the cache
/// normalizes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRow {
    pub statement_id: String,
    pub entity_id: String,
    pub value: String,
    pub unit: Option<String>,
    pub qualifier_property: Option<String>,
    pub qualifier_value: Option<String>,
    pub qualifier_unit: Option<String>,
    pub reference_id: Option<String>,
    pub reference_property: Option<String>,
    pub reference_value: Option<String>,
}

/// Paged subgraph query endpoint
pub trait SubgraphQuery {
    /// Fetch one page of rows; a page shorter than `request.limit` is the
    /// last one
    fn fetch_page(&mut self, request: &PageRequest<'_>) -> Result<Vec<QueryRow>>;
}

/// Property-datatype lookup service.
///
/// Datatypes are immutable once defined; results are memoized indefinitely
/// by the cache.
pub trait DatatypeResolver {
    fn datatype(&mut self, property: &PropertyId) -> Result<String>;
}

/// Which kind of term a term query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    Label,
    Description,
    Alias,
}

impl TermKind {
    /// Aliases are multi-valued; labels and descriptions are singular
    pub fn is_multi_valued(self) -> bool {
        matches!(self, TermKind::Alias)
    }
}

/// One row of a term query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermRow {
    pub entity_id: String,
    pub value: String,
}

/// Label/description/alias query endpoint; one query covers every entity
/// matching the base filter for a `(language, kind)` pair
pub trait TermQuery {
    fn fetch_terms(
        &mut self,
        filter: &BaseFilter,
        language: &str,
        kind: TermKind,
    ) -> Result<Vec<TermRow>>;
}
