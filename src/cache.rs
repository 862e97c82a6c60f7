//! # Remote State Cache
//!
//! The write-avoidance cache: mirrors a filtered subset of the remote graph
//! through paged queries, keeps a compact flattened form of every observed
//! statement, and answers the central question: does a proposed set of
//! statements actually differ from what the remote store already holds?
//!
//! A cache instance is created once per base filter and reused across many
//! checks (see [`crate::pool::CachePool`]). It grows monotonically and is
//! never partially invalidated; [`MirrorCache::clear`] followed by a rebuild
//! is the only path to freshness. Single-writer, sequential use is assumed
//! throughout.

use crate::config::CacheSettings;
use crate::datatype::{CachedValue, DatatypeRegistry};
use crate::index::{AmbiguousEntity, ReverseIndex};
use crate::model::{
    normalize_unit, strip_concept_uri, CmpOptions, EntityId, MergeMode, PropertyId, Reference,
    Snak, Statement,
};
use crate::query::{DatatypeResolver, PageRequest, QueryRow, SubgraphQuery, TermKind, TermQuery};
use anyhow::{anyhow, bail, Result};
use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, trace};

/// Compact, lossy per-statement form: just enough to rebuild a comparable
/// statement with the help of the property-datatype resolver.
#[derive(Debug, Clone, Default)]
struct CompactStatement {
    value: String,
    unit: Option<String>,
    /// (property, value, unit) tuples
    qualifiers: BTreeSet<(PropertyId, String, Option<String>)>,
    /// reference hash → set of (property, value)
    references: BTreeMap<String, BTreeSet<(PropertyId, String)>>,
}

/// entity → property → statement id → compact statement
type PropData = HashMap<EntityId, BTreeMap<PropertyId, BTreeMap<String, CompactStatement>>>;

/// The remote state cache ("fastrun" cache)
pub struct MirrorCache {
    settings: CacheSettings,
    registry: DatatypeRegistry,
    prop_data: PropData,
    index: ReverseIndex,
    loaded: HashSet<PropertyId>,
    /// property → datatype tag, memoized for the life of the cache
    /// (datatypes are immutable once defined)
    datatypes: HashMap<PropertyId, String>,
    /// (language, kind) → entity → values
    terms: HashMap<(String, TermKind), HashMap<EntityId, Vec<String>>>,
}

impl std::fmt::Debug for MirrorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorCache")
            .field("settings", &self.settings)
            .field("entities", &self.prop_data.len())
            .field("loaded_properties", &self.loaded.len())
            .finish()
    }
}

impl MirrorCache {
    /// Create a cache with the built-in datatype registry
    pub fn new(settings: CacheSettings) -> Self {
        Self::with_registry(settings, DatatypeRegistry::default())
    }

    /// Create a cache with a custom datatype registry
    pub fn with_registry(settings: CacheSettings, registry: DatatypeRegistry) -> Self {
        Self {
            settings,
            registry,
            prop_data: HashMap::new(),
            index: ReverseIndex::new(),
            loaded: HashSet::new(),
            datatypes: HashMap::new(),
            terms: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Number of entities observed so far
    pub fn entity_count(&self) -> usize {
        self.prop_data.len()
    }

    /// Whether a property's statements have been mirrored
    pub fn is_loaded(&self, property: &PropertyId) -> bool {
        self.loaded.contains(property)
    }

    /// Drop all mirrored state. The datatype memo survives: datatypes are
    /// immutable once defined, so re-resolving them would only cost queries.
    pub fn clear(&mut self) {
        self.prop_data.clear();
        self.index.clear();
        self.loaded.clear();
        self.terms.clear();
    }

    /// Mirror every statement of `property` on entities matching the base
    /// filter, one page at a time. A no-op when the property was already
    /// loaded.
    pub fn load_property(
        &mut self,
        property: &PropertyId,
        query: &mut dyn SubgraphQuery,
    ) -> Result<()> {
        if self.loaded.contains(property) {
            trace!(property = %property, "property already mirrored");
            return Ok(());
        }
        let mut offset = 0;
        loop {
            let request = PageRequest {
                filter: &self.settings.filter,
                property,
                offset,
                limit: self.settings.page_size,
                include_references: self.settings.use_refs,
            };
            let rows = query.fetch_page(&request)?;
            let count = rows.len();
            debug!(property = %property, offset, rows = count, "mirrored page");
            for row in rows {
                self.fold_row(property, row)?;
            }
            if count < self.settings.page_size {
                break;
            }
            offset += self.settings.page_size;
        }
        self.loaded.insert(property.clone());
        Ok(())
    }

    /// Fold one query row into the compact store and the reverse index
    fn fold_row(&mut self, property: &PropertyId, row: QueryRow) -> Result<()> {
        let entity = EntityId::new(row.entity_id);
        let statement_id = strip_concept_uri(&row.statement_id);
        let value = strip_concept_uri(&row.value);

        let entry = self
            .prop_data
            .entry(entity.clone())
            .or_default()
            .entry(property.clone())
            .or_default()
            .entry(statement_id)
            .or_default();
        entry.value = value.clone();
        entry.unit = normalize_unit(row.unit.as_deref());

        if let Some(qualifier_property) = row.qualifier_property {
            let qualifier_value = row
                .qualifier_value
                .ok_or_else(|| anyhow!("query row has qualifier property without a value"))?;
            entry.qualifiers.insert((
                PropertyId::new(qualifier_property),
                strip_concept_uri(&qualifier_value),
                normalize_unit(row.qualifier_unit.as_deref()),
            ));
        }

        if let Some(reference_id) = row.reference_id {
            let (Some(reference_property), Some(reference_value)) =
                (row.reference_property, row.reference_value)
            else {
                bail!("query row has reference id without property and value");
            };
            entry
                .references
                .entry(strip_concept_uri(&reference_id))
                .or_default()
                .insert((
                    PropertyId::new(reference_property),
                    strip_concept_uri(&reference_value),
                ));
        }

        let key = if self.settings.case_insensitive {
            value.to_lowercase()
        } else {
            value
        };
        self.index.insert(key, entity);
        Ok(())
    }

    /// Expand every compact entry under `entity` into full statements.
    ///
    /// Entities absent from the cache reconstruct to an empty list: absence
    /// means "not yet observed matching the filter", which is equivalent to
    /// having no statements of the mirrored properties.
    pub fn reconstruct(
        &mut self,
        entity: &EntityId,
        datatypes: &mut dyn DatatypeResolver,
    ) -> Result<Vec<Statement>> {
        let Some(props) = self.prop_data.get(entity) else {
            return Ok(Vec::new());
        };

        // Resolve every implicated property's datatype up front; the memo
        // makes repeat reconstructions query-free.
        let mut needed: BTreeSet<PropertyId> = BTreeSet::new();
        for (property, statements) in props {
            needed.insert(property.clone());
            for compact in statements.values() {
                for (qualifier_property, _, _) in &compact.qualifiers {
                    needed.insert(qualifier_property.clone());
                }
                for snaks in compact.references.values() {
                    for (reference_property, _) in snaks {
                        needed.insert(reference_property.clone());
                    }
                }
            }
        }
        for property in &needed {
            if !self.datatypes.contains_key(property) {
                let tag = datatypes.datatype(property)?;
                trace!(property = %property, datatype = %tag, "resolved datatype");
                self.datatypes.insert(property.clone(), tag);
            }
        }

        let props = self
            .prop_data
            .get(entity)
            .ok_or_else(|| anyhow!("cache entry vanished during reconstruction"))?;
        let mut statements = Vec::new();
        for (property, compacts) in props {
            for (statement_id, compact) in compacts {
                let statement = self
                    .expand(property, compact)?
                    .with_remote_id(statement_id.clone());
                statements.push(statement);
            }
        }
        Ok(statements)
    }

    /// Expand one compact entry into a typed statement
    fn expand(&self, property: &PropertyId, compact: &CompactStatement) -> Result<Statement> {
        let tag = self.tag_of(property)?;
        let value = self.registry.construct(
            tag,
            &CachedValue::with_unit(&compact.value, compact.unit.as_deref()),
        )?;
        let mut statement = Statement::new(Snak::new(property.clone(), tag, value));

        for (qualifier_property, qualifier_value, qualifier_unit) in &compact.qualifiers {
            let tag = self.tag_of(qualifier_property)?;
            let value = self.registry.construct(
                tag,
                &CachedValue::with_unit(qualifier_value, qualifier_unit.as_deref()),
            )?;
            statement
                .qualifiers
                .push(Snak::new(qualifier_property.clone(), tag, value));
        }

        for (hash, snaks) in &compact.references {
            let mut reference_snaks = Vec::with_capacity(snaks.len());
            for (reference_property, reference_value) in snaks {
                let tag = self.tag_of(reference_property)?;
                let value = self
                    .registry
                    .construct(tag, &CachedValue::new(reference_value))?;
                reference_snaks.push(Snak::new(reference_property.clone(), tag, value));
            }
            statement
                .references
                .push(Reference::with_hash(reference_snaks, hash.clone()));
        }
        Ok(statement)
    }

    fn tag_of(&self, property: &PropertyId) -> Result<&str> {
        self.datatypes
            .get(property)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("datatype for {property} missing after resolution"))
    }

    /// Resolve the target entity of a proposal set.
    ///
    /// An explicit id is returned unchanged. Otherwise the reverse-index
    /// candidate sets for every proposed value are intersected: an empty
    /// intersection means "no match, a write is required to create state"
    /// (`Ok(None)`, not an error); exactly one candidate is the answer; more
    /// than one is an [`AmbiguousEntity`] error, never a guess.
    pub fn identify_entity(
        &mut self,
        proposed: &[Statement],
        explicit: Option<EntityId>,
        query: &mut dyn SubgraphQuery,
    ) -> Result<Option<EntityId>> {
        if let Some(id) = explicit {
            return Ok(Some(id));
        }

        let mut intersection: Option<BTreeSet<EntityId>> = None;
        let mut conflicts: Vec<(PropertyId, Vec<EntityId>)> = Vec::new();
        for statement in proposed {
            let Some(value) = &statement.mainsnak.value else {
                continue;
            };
            if statement.is_deletion_marker() {
                continue;
            }
            self.load_property(statement.property(), query)?;
            let key = value.index_key(self.settings.case_insensitive);
            let candidates = self.index.candidates(&key).cloned().unwrap_or_default();
            trace!(
                property = %statement.property(),
                key = %key,
                candidates = candidates.len(),
                "reverse lookup"
            );
            conflicts.push((
                statement.property().clone(),
                candidates.iter().cloned().collect(),
            ));
            intersection = Some(match intersection {
                None => candidates,
                Some(previous) => previous.intersection(&candidates).cloned().collect(),
            });
        }

        match intersection {
            None => Ok(None),
            Some(set) if set.is_empty() => Ok(None),
            Some(set) if set.len() == 1 => Ok(set.into_iter().next()),
            Some(set) => Err(AmbiguousEntity {
                conflicts,
                candidates: set.into_iter().collect(),
            }
            .into()),
        }
    }

    /// The central decision: does this proposal set require a remote write?
    ///
    /// Merge modes are taken from each statement's declared mode.
    pub fn write_required(
        &mut self,
        proposed: &[Statement],
        explicit: Option<EntityId>,
        query: &mut dyn SubgraphQuery,
        datatypes: &mut dyn DatatypeResolver,
    ) -> Result<bool> {
        self.write_required_with(proposed, None, explicit, query, datatypes)
    }

    /// [`write_required`](Self::write_required) with an optional merge mode
    /// forced onto every proposed statement
    pub fn write_required_with(
        &mut self,
        proposed: &[Statement],
        override_mode: Option<MergeMode>,
        explicit: Option<EntityId>,
        query: &mut dyn SubgraphQuery,
        datatypes: &mut dyn DatatypeResolver,
    ) -> Result<bool> {
        let Some(entity) = self.identify_entity(proposed, explicit, query)? else {
            debug!("no matching entity; write required to create state");
            return Ok(true);
        };
        for statement in proposed {
            self.load_property(statement.property(), query)?;
        }
        let current = self.reconstruct(&entity, datatypes)?;
        let cmp = CmpOptions::uniform(self.settings.case_insensitive);
        let mode_of = |s: &Statement| override_mode.unwrap_or(s.mode);

        let mut append_group = Vec::new();
        let mut deletion_group = Vec::new();
        let mut replace_group = Vec::new();
        for statement in proposed {
            if statement.is_deletion_marker() {
                deletion_group.push(statement);
            } else {
                match mode_of(statement) {
                    MergeMode::Append | MergeMode::ForceAppend => append_group.push(statement),
                    _ => replace_group.push(statement),
                }
            }
        }

        for &statement in &append_group {
            // FORCE_APPEND never matches: it exists to create duplicates
            if mode_of(statement) == MergeMode::ForceAppend {
                debug!(entity = %entity, property = %statement.property(), "force-append always writes");
                return Ok(true);
            }
            let matched = current
                .iter()
                .filter(|c| c.property() == statement.property())
                .any(|c| self.statements_equal(c, statement, &cmp));
            if !matched {
                debug!(entity = %entity, property = %statement.property(), "append proposal unmatched");
                return Ok(true);
            }
        }

        for &statement in &deletion_group {
            if current.iter().any(|c| c.property() == statement.property()) {
                debug!(entity = %entity, property = %statement.property(), "deletion targets existing statements");
                return Ok(true);
            }
        }

        let append_props: BTreeSet<&PropertyId> =
            append_group.iter().map(|s| s.property()).collect();
        let replace_props: BTreeSet<&PropertyId> =
            replace_group.iter().map(|s| s.property()).collect();
        let mut remaining: Vec<&Statement> = current
            .iter()
            .filter(|c| {
                !append_props.contains(c.property()) && replace_props.contains(c.property())
            })
            .collect();
        for &statement in &replace_group {
            match remaining
                .iter()
                .position(|&c| self.statements_equal(c, statement, &cmp))
            {
                Some(i) => {
                    remaining.remove(i);
                }
                None => {
                    debug!(entity = %entity, property = %statement.property(), "replace proposal unmatched");
                    return Ok(true);
                }
            }
        }
        if !remaining.is_empty() {
            debug!(entity = %entity, unpaired = remaining.len(), "current statements unmatched by proposals");
            return Ok(true);
        }

        debug!(entity = %entity, "proposals match remote state; no write required");
        Ok(false)
    }

    fn statements_equal(&self, a: &Statement, b: &Statement, cmp: &CmpOptions) -> bool {
        if self.settings.use_refs {
            a.equal_full(b, cmp)
        } else {
            a.equal_value(b, cmp)
        }
    }

    /// Cached terms of one kind for an entity, loading the whole
    /// `(language, kind)` mapping on first use: one query per pair, not per
    /// entity. Missing entries default to `[""]` for labels and
    /// descriptions and `[]` for aliases.
    pub fn get_language_data(
        &mut self,
        entity: &EntityId,
        language: &str,
        kind: TermKind,
        terms: &mut dyn TermQuery,
    ) -> Result<Vec<String>> {
        let key = (language.to_string(), kind);
        if !self.terms.contains_key(&key) {
            let rows = terms.fetch_terms(&self.settings.filter, language, kind)?;
            debug!(language, ?kind, rows = rows.len(), "mirrored term data");
            let mut map: HashMap<EntityId, Vec<String>> = HashMap::new();
            for row in rows {
                map.entry(EntityId::new(row.entity_id)).or_default().push(row.value);
            }
            self.terms.insert(key.clone(), map);
        }
        let map = &self.terms[&key];
        Ok(match map.get(entity) {
            Some(values) => values.clone(),
            None if kind.is_multi_valued() => Vec::new(),
            None => vec![String::new()],
        })
    }

    /// Does the proposed term set differ from the cached one? Under
    /// `Replace`, compares by multiset equality; under append-like modes,
    /// any proposed value absent from the cached set forces a write. Values
    /// are trimmed and case-folded on both sides.
    pub fn check_language_data(
        &mut self,
        entity: &EntityId,
        proposed: &[String],
        language: &str,
        kind: TermKind,
        mode: MergeMode,
        terms: &mut dyn TermQuery,
    ) -> Result<bool> {
        let current = self.get_language_data(entity, language, kind, terms)?;
        let fold = |s: &String| s.trim().to_lowercase();
        let current: Vec<String> = current.iter().map(fold).collect();
        let proposed: Vec<String> = proposed.iter().map(fold).collect();

        match mode {
            MergeMode::Replace => {
                if current.len() != proposed.len() {
                    return Ok(true);
                }
                let mut counts: HashMap<&str, i64> = HashMap::new();
                for value in &proposed {
                    *counts.entry(value.as_str()).or_default() += 1;
                }
                for value in &current {
                    *counts.entry(value.as_str()).or_default() -= 1;
                }
                Ok(counts.values().any(|&c| c != 0))
            }
            _ => Ok(proposed.iter().any(|v| !current.contains(v))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaseFilter;
    use crate::model::Value;
    use crate::test_support::{item_statement, FixedDatatypes, ScriptedQuery, ScriptedTerms};

    fn settings() -> CacheSettings {
        CacheSettings::new(BaseFilter::new().require_any(PropertyId::new("P31")))
            .with_page_size(100)
    }

    fn row(entity: &str, statement: &str, value: &str) -> QueryRow {
        QueryRow {
            statement_id: statement.to_string(),
            entity_id: entity.to_string(),
            value: value.to_string(),
            ..QueryRow::default()
        }
    }

    #[test]
    fn test_load_property_is_idempotent() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        query.add_row("P31", row("Q1", "Q1-s1", "Q5"));

        cache.load_property(&PropertyId::new("P31"), &mut query).unwrap();
        cache.load_property(&PropertyId::new("P31"), &mut query).unwrap();
        assert_eq!(query.pages_served(), 1);
        assert!(cache.is_loaded(&PropertyId::new("P31")));
        assert_eq!(cache.entity_count(), 1);
    }

    #[test]
    fn test_pagination_stops_on_short_page() {
        let mut cache = MirrorCache::new(settings().with_page_size(2));
        let mut query = ScriptedQuery::new();
        for i in 0..5 {
            query.add_row("P31", row(&format!("Q{i}"), &format!("Q{i}-s"), "Q5"));
        }

        cache.load_property(&PropertyId::new("P31"), &mut query).unwrap();
        // 2 + 2 + 1 rows
        assert_eq!(query.pages_served(), 3);
        assert_eq!(cache.entity_count(), 5);
    }

    #[test]
    fn test_reconstruct_unknown_entity_is_empty() {
        let mut cache = MirrorCache::new(settings());
        let mut datatypes = FixedDatatypes::new();
        let statements = cache
            .reconstruct(&EntityId::new("Q404"), &mut datatypes)
            .unwrap();
        assert!(statements.is_empty());
    }

    #[test]
    fn test_reconstruct_expands_qualifiers_and_references() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        let mut full = row("Q1", "Q1-s1", "http://www.wikidata.org/entity/Q5");
        full.qualifier_property = Some("P580".to_string());
        full.qualifier_value = Some("+2000-01-01T00:00:00Z".to_string());
        full.reference_id = Some("refhash1".to_string());
        full.reference_property = Some("P248".to_string());
        full.reference_value = Some("http://www.wikidata.org/entity/Q3047275".to_string());
        query.add_row("P31", full);

        let mut datatypes = FixedDatatypes::new()
            .with("P31", "wikibase-item")
            .with("P580", "time")
            .with("P248", "wikibase-item");

        cache.load_property(&PropertyId::new("P31"), &mut query).unwrap();
        let statements = cache.reconstruct(&EntityId::new("Q1"), &mut datatypes).unwrap();
        assert_eq!(statements.len(), 1);

        let statement = &statements[0];
        assert_eq!(statement.remote_id.as_deref(), Some("Q1-s1"));
        assert_eq!(
            statement.mainsnak.value,
            Some(Value::Entity(EntityId::new("Q5")))
        );
        assert_eq!(statement.qualifiers.len(), 1);
        assert_eq!(
            statement.qualifiers[0].value,
            Some(Value::Time("+2000-01-01T00:00:00Z".to_string()))
        );
        assert_eq!(statement.references.len(), 1);
        assert_eq!(statement.references[0].hash.as_deref(), Some("refhash1"));
        assert_eq!(
            statement.references[0].snaks[0].value,
            Some(Value::Entity(EntityId::new("Q3047275")))
        );

        // datatype lookups are memoized
        assert_eq!(datatypes.lookups(), 3);
        cache.reconstruct(&EntityId::new("Q1"), &mut datatypes).unwrap();
        assert_eq!(datatypes.lookups(), 3);
    }

    #[test]
    fn test_identify_entity_explicit_id_wins() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        let found = cache
            .identify_entity(&[], Some(EntityId::new("Q7")), &mut query)
            .unwrap();
        assert_eq!(found, Some(EntityId::new("Q7")));
        assert_eq!(query.pages_served(), 0);
    }

    #[test]
    fn test_identify_entity_by_intersection() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        query.add_row("P31", row("Q1", "Q1-s1", "Q5"));
        query.add_row("P31", row("Q2", "Q2-s1", "Q5"));
        query.add_row("P569", row("Q1", "Q1-s2", "+1952-03-11T00:00:00Z"));

        let proposed = vec![
            item_statement("P31", "Q5"),
            Statement::new(Snak::new(
                PropertyId::new("P569"),
                "time",
                Value::Time("+1952-03-11T00:00:00Z".to_string()),
            )),
        ];
        let found = cache.identify_entity(&proposed, None, &mut query).unwrap();
        assert_eq!(found, Some(EntityId::new("Q1")));
    }

    #[test]
    fn test_identify_entity_no_match_is_none() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        query.add_row("P31", row("Q1", "Q1-s1", "Q5"));

        let proposed = vec![item_statement("P31", "Q11424")];
        let found = cache.identify_entity(&proposed, None, &mut query).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_identify_entity_ambiguity_is_error() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        query.add_row("P31", row("Q1", "Q1-s1", "Q5"));
        query.add_row("P31", row("Q2", "Q2-s1", "Q5"));

        let proposed = vec![item_statement("P31", "Q5")];
        let err = cache.identify_entity(&proposed, None, &mut query).unwrap_err();
        let ambiguous = err.downcast_ref::<AmbiguousEntity>().expect("ambiguity error");
        assert_eq!(ambiguous.candidates.len(), 2);
        assert_eq!(ambiguous.conflicts[0].0, PropertyId::new("P31"));
    }

    #[test]
    fn test_language_data_defaults() {
        let mut cache = MirrorCache::new(settings());
        let mut terms = ScriptedTerms::new();
        terms.add("en", TermKind::Label, "Q1", "Douglas Adams");

        let label = cache
            .get_language_data(&EntityId::new("Q1"), "en", TermKind::Label, &mut terms)
            .unwrap();
        assert_eq!(label, vec!["Douglas Adams".to_string()]);

        let missing = cache
            .get_language_data(&EntityId::new("Q2"), "en", TermKind::Label, &mut terms)
            .unwrap();
        assert_eq!(missing, vec![String::new()]);

        let aliases = cache
            .get_language_data(&EntityId::new("Q2"), "en", TermKind::Alias, &mut terms)
            .unwrap();
        assert!(aliases.is_empty());

        // one query per (language, kind) pair
        assert_eq!(terms.queries_served(), 2);
    }

    #[test]
    fn test_check_language_data_replace_and_append() {
        let mut cache = MirrorCache::new(settings());
        let mut terms = ScriptedTerms::new();
        terms.add("en", TermKind::Alias, "Q1", "DNA");
        terms.add("en", TermKind::Alias, "Q1", "Douglas Noel Adams");

        let entity = EntityId::new("Q1");
        // replace: same multiset (case-folded, trimmed) needs no write
        let same = vec!["dna ".to_string(), "douglas noel adams".to_string()];
        assert!(!cache
            .check_language_data(&entity, &same, "en", TermKind::Alias, MergeMode::Replace, &mut terms)
            .unwrap());
        // replace: different cardinality writes
        let fewer = vec!["DNA".to_string()];
        assert!(cache
            .check_language_data(&entity, &fewer, "en", TermKind::Alias, MergeMode::Replace, &mut terms)
            .unwrap());
        // append: subset needs no write, novel value does
        assert!(!cache
            .check_language_data(&entity, &fewer, "en", TermKind::Alias, MergeMode::Append, &mut terms)
            .unwrap());
        let novel = vec!["The other Douglas".to_string()];
        assert!(cache
            .check_language_data(&entity, &novel, "en", TermKind::Alias, MergeMode::Append, &mut terms)
            .unwrap());
    }

    #[test]
    fn test_override_mode_forces_append_semantics() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        query.add_row("P31", row("Q1", "Q1-s1", "Q5"));
        query.add_row("P31", row("Q1", "Q1-s2", "Q4"));
        let mut datatypes = FixedDatatypes::new().with("P31", "wikibase-item");

        let proposed = vec![item_statement("P31", "Q5")];
        let explicit = Some(EntityId::new("Q1"));
        // default replace mode: the unmatched Q4 statement forces a write
        assert!(cache
            .write_required(&proposed, explicit.clone(), &mut query, &mut datatypes)
            .unwrap());
        // forcing append leaves unmatched current statements alone
        assert!(!cache
            .write_required_with(
                &proposed,
                Some(MergeMode::Append),
                explicit,
                &mut query,
                &mut datatypes,
            )
            .unwrap());
    }

    #[test]
    fn test_clear_forces_reload() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        query.add_row("P31", row("Q1", "Q1-s1", "Q5"));

        cache.load_property(&PropertyId::new("P31"), &mut query).unwrap();
        assert_eq!(cache.entity_count(), 1);
        cache.clear();
        assert_eq!(cache.entity_count(), 0);
        assert!(!cache.is_loaded(&PropertyId::new("P31")));

        cache.load_property(&PropertyId::new("P31"), &mut query).unwrap();
        assert_eq!(query.pages_served(), 2);
        assert_eq!(cache.entity_count(), 1);
    }

    #[test]
    fn test_malformed_row_fails_fast() {
        let mut cache = MirrorCache::new(settings());
        let mut query = ScriptedQuery::new();
        let mut bad = row("Q1", "Q1-s1", "Q5");
        bad.reference_id = Some("refhash1".to_string());
        // reference id without property/value
        query.add_row("P31", bad);

        assert!(cache.load_property(&PropertyId::new("P31"), &mut query).is_err());
    }
}
