//! # Reverse Value Index
//!
//! Maps value index-keys back to the entities carrying them. The index is
//! advisory: it is only used to guess which entity a caller is editing when
//! no explicit id was supplied, and it grows monotonically as properties
//! are loaded. Ambiguity after intersecting candidates across proposed
//! properties is an error, never silently resolved.

use crate::model::{EntityId, PropertyId};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fmt;

/// value index-key → set of entity ids
#[derive(Debug, Clone, Default)]
pub struct ReverseIndex {
    buckets: FxHashMap<String, BTreeSet<EntityId>>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `entity` carries a statement with this value key
    pub fn insert(&mut self, key: String, entity: EntityId) {
        self.buckets.entry(key).or_default().insert(entity);
    }

    /// Entities carrying the value key, if any were observed
    pub fn candidates(&self, key: &str) -> Option<&BTreeSet<EntityId>> {
        self.buckets.get(key)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

/// More than one entity survived the reverse-index intersection.
///
/// Carries the per-property candidate sets that produced the ambiguous
/// intersection so callers can report exactly which values collide.
#[derive(Debug, Clone)]
pub struct AmbiguousEntity {
    /// Property → candidate entities observed for the proposed value
    pub conflicts: Vec<(PropertyId, Vec<EntityId>)>,
    /// The surviving intersection (two or more entities)
    pub candidates: Vec<EntityId>,
}

impl fmt::Display for AmbiguousEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ambiguous entity identification: {} candidates remain [",
            self.candidates.len()
        )?;
        for (i, id) in self.candidates.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, "] from properties ")?;
        for (i, (prop, ids)) in self.conflicts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{prop} ({} candidates)", ids.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for AmbiguousEntity {}
