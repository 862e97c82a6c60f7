//! # Data Model
//!
//! Core data structures for statement reconciliation: snaks, references,
//! statements, and the two-level equality semantics that drive the
//! write-avoidance decision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a property in the remote graph (e.g. `P31`).
///
/// Constructed values are normalized: a full concept URI is reduced to its
/// bare id so that `http://example.org/entity/P31` and `P31` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(String);

impl PropertyId {
    /// Create a property id, stripping any concept-URI prefix
    pub fn new(raw: impl Into<String>) -> Self {
        Self(strip_concept_uri(&raw.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for an entity in the remote graph (e.g. `Q42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity id, stripping any concept-URI prefix
    pub fn new(raw: impl Into<String>) -> Self {
        Self(strip_concept_uri(&raw.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reduce a server URI to a bare id.
///
/// Statement URIs (`…/entity/statement/Q1-abc`) and concept URIs
/// (`…/entity/Q1`) lose their prefix; anything else is returned verbatim,
/// so literal URL values pass through untouched.
pub fn strip_concept_uri(raw: &str) -> String {
    if let Some(idx) = raw.find("/entity/statement/") {
        return raw[idx + "/entity/statement/".len()..].to_string();
    }
    if let Some(idx) = raw.find("/entity/") {
        return raw[idx + "/entity/".len()..].to_string();
    }
    raw.to_string()
}

/// How a snak asserts its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnakKind {
    /// A concrete value is asserted
    KnownValue,
    /// The property is asserted to have no value
    NoValue,
    /// The property has some value, but it is unknown
    UnknownValue,
}

/// Case-folding configuration for a comparison context.
///
/// Folding is configurable separately for main values and for
/// qualifier/reference sub-values; a single global flag is deliberately not
/// assumed to cover nested comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmpOptions {
    /// Fold case when comparing mainsnak text values
    pub fold_values: bool,
    /// Fold case when comparing qualifier and reference text values
    pub fold_subvalues: bool,
}

impl CmpOptions {
    /// Apply the same folding flag to values and sub-values
    pub fn uniform(fold: bool) -> Self {
        Self {
            fold_values: fold,
            fold_subvalues: fold,
        }
    }
}

/// A typed value carried by a snak
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Another entity, by normalized bare id
    Entity(EntityId),
    /// A numeric quantity with an optional unit entity
    Quantity { amount: f64, unit: Option<String> },
    /// A plain or external-id string
    Text(String),
    /// A point in time, in the remote store's timestamp format
    Time(String),
    /// A literal URL
    Uri(String),
    /// Text in a specific language
    MonolingualText { text: String, language: String },
}

impl Value {
    /// Type-aware equality: quantities compare numerically, entities by
    /// normalized id, text optionally case-folded. Monolingual text compares
    /// against plain text by its text component (the compact cache flattens
    /// the language away).
    pub fn equals(&self, other: &Value, fold: bool) -> bool {
        match (self, other) {
            (Value::Entity(a), Value::Entity(b)) => a == b,
            (Value::Quantity { amount: a, unit: ua }, Value::Quantity { amount: b, unit: ub }) => {
                a == b && normalize_unit(ua.as_deref()) == normalize_unit(ub.as_deref())
            }
            (Value::Text(a), Value::Text(b)) => fold_eq(a, b, fold),
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Uri(a), Value::Uri(b)) => a == b,
            (
                Value::MonolingualText { text: a, language: la },
                Value::MonolingualText { text: b, language: lb },
            ) => fold_eq(a, b, fold) && la == lb,
            (Value::MonolingualText { text: a, .. }, Value::Text(b))
            | (Value::Text(a), Value::MonolingualText { text: b, .. }) => fold_eq(a, b, fold),
            _ => false,
        }
    }

    /// The string form used as reverse-index key and compact cache value.
    ///
    /// Quantity keys carry the amount only, so amounts that differ only in
    /// unit share an index bucket. The index is advisory; [`Value::equals`]
    /// still compares units.
    pub fn index_key(&self, fold: bool) -> String {
        let key = match self {
            Value::Entity(id) => id.as_str().to_string(),
            Value::Quantity { amount, .. } => format_amount(*amount),
            Value::Text(s) => s.clone(),
            Value::Time(s) => s.clone(),
            Value::Uri(s) => s.clone(),
            Value::MonolingualText { text, .. } => text.clone(),
        };
        if fold {
            key.to_lowercase()
        } else {
            key
        }
    }

    /// True for the empty-string payload some callers use as a deletion
    /// marker instead of omitting the value entirely
    pub fn is_empty_text(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, false)
    }
}

/// Canonical textual form of a quantity amount: integral amounts render
/// without a fractional part so `1` and `1.0` share one index key.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

/// The unit id `1` means "unitless" on the wire; both spellings normalize
/// to `None`. Unit URIs lose their concept prefix.
pub fn normalize_unit(unit: Option<&str>) -> Option<String> {
    match unit {
        None => None,
        Some(u) => {
            let bare = strip_concept_uri(u);
            if bare == "1" || bare.is_empty() {
                None
            } else {
                Some(bare)
            }
        }
    }
}

fn fold_eq(a: &str, b: &str, fold: bool) -> bool {
    if fold {
        a.to_lowercase() == b.to_lowercase()
    } else {
        a == b
    }
}

/// The atomic property + value + kind unit underlying mainsnaks,
/// qualifiers, and reference entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snak {
    /// The property this snak asserts about
    pub property: PropertyId,
    /// Datatype tag of the property (e.g. `wikibase-item`, `quantity`)
    pub datatype: String,
    /// The asserted value; `None` for `NoValue`/`UnknownValue` kinds and for
    /// deletion markers
    pub value: Option<Value>,
    /// How the value is asserted
    pub kind: SnakKind,
}

impl Snak {
    /// Create a known-value snak
    pub fn new(property: PropertyId, datatype: impl Into<String>, value: Value) -> Self {
        Self {
            property,
            datatype: datatype.into(),
            value: Some(value),
            kind: SnakKind::KnownValue,
        }
    }

    /// Create a no-value or unknown-value snak
    pub fn valueless(property: PropertyId, datatype: impl Into<String>, kind: SnakKind) -> Self {
        Self {
            property,
            datatype: datatype.into(),
            value: None,
            kind,
        }
    }

    /// Field-wise equality with type-aware value comparison
    pub fn equals(&self, other: &Snak, fold: bool) -> bool {
        if self.property != other.property || self.kind != other.kind {
            return false;
        }
        match (&self.value, &other.value) {
            (None, None) => true,
            (Some(a), Some(b)) => a.equals(b, fold),
            _ => false,
        }
    }
}

/// An unordered set of snaks forming one citation block.
///
/// The hash is server-assigned and absent on locally-constructed blocks; it
/// never participates in equality.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Reference {
    pub snaks: Vec<Snak>,
    pub hash: Option<String>,
}

impl Reference {
    pub fn new(snaks: Vec<Snak>) -> Self {
        Self { snaks, hash: None }
    }

    pub fn with_hash(snaks: Vec<Snak>, hash: impl Into<String>) -> Self {
        Self {
            snaks,
            hash: Some(hash.into()),
        }
    }

    /// Multiset equality over snaks, order and hash irrelevant
    pub fn equals(&self, other: &Reference, fold: bool) -> bool {
        snak_multiset_eq(&self.snaks, &other.snaks, fold)
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, false)
    }
}

/// Pair snaks 1:1 across two lists, ignoring order
fn snak_multiset_eq(a: &[Snak], b: &[Snak], fold: bool) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for snak in a {
        let found = b
            .iter()
            .enumerate()
            .position(|(i, other)| !used[i] && snak.equals(other, fold));
        match found {
            Some(i) => used[i] = true,
            None => return false,
        }
    }
    true
}

/// Pair reference blocks 1:1 across two lists, ignoring order
fn reference_multiset_eq(a: &[Reference], b: &[Reference], fold: bool) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut used = vec![false; b.len()];
    for block in a {
        let found = b
            .iter()
            .enumerate()
            .position(|(i, other)| !used[i] && block.equals(other, fold));
        match found {
            Some(i) => used[i] = true,
            None => return false,
        }
    }
    true
}

/// Statement rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
}

/// How a proposed statement interacts with current statements of the same
/// property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MergeMode {
    /// Replace all current statements of the property, pairing equal-valued
    /// ones instead of rewriting them (the default)
    #[default]
    Replace,
    /// Add alongside current statements unless an equal-valued one exists;
    /// on a match, update that statement instead of inserting
    Append,
    /// Always add, even when an exact duplicate exists. This deliberately
    /// allows creating statements identical to current ones, references
    /// included; the duplicate is intentional, do not "fix" it by falling
    /// back to `Append`.
    ForceAppend,
    /// Leave current statements of the property alone; only add when the
    /// property is absent entirely
    Keep,
}

/// Reference-merge policy applied when a current statement is retained
/// against a matching proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RefMode {
    /// Adopt the proposal's references outright
    StrictOverwrite,
    /// Keep current references, ignore the proposal's
    StrictKeep,
    /// Keep current references and append the proposal's blocks, duplicates
    /// allowed
    StrictKeepAppend,
    /// Delegate to the caller-supplied merge function
    Custom,
    /// Keep current blocks matching a good-reference template, then append
    /// proposal blocks not already present
    #[default]
    KeepGood,
}

/// A property-value assertion attached to an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub mainsnak: Snak,
    pub rank: Rank,
    /// Qualifier snaks; display order is preserved but not semantically
    /// significant
    pub qualifiers: Vec<Snak>,
    pub references: Vec<Reference>,
    /// Server-assigned statement id, present only once the remote store has
    /// accepted the statement
    pub remote_id: Option<String>,
    /// Marked for removal on the next write
    pub removed: bool,
    /// Merge mode declared on proposals; ignored on current statements
    pub mode: MergeMode,
    /// Per-statement reference-merge policy override
    pub ref_mode: Option<RefMode>,
}

impl Statement {
    pub fn new(mainsnak: Snak) -> Self {
        Self {
            mainsnak,
            rank: Rank::Normal,
            qualifiers: Vec::new(),
            references: Vec::new(),
            remote_id: None,
            removed: false,
            mode: MergeMode::Replace,
            ref_mode: None,
        }
    }

    pub fn with_rank(mut self, rank: Rank) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Snak) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_ref_mode(mut self, mode: RefMode) -> Self {
        self.ref_mode = Some(mode);
        self
    }

    /// The property this statement asserts
    pub fn property(&self) -> &PropertyId {
        &self.mainsnak.property
    }

    /// Value equality: same property, equal mainsnak value, equal qualifier
    /// multiset
    pub fn equal_value(&self, other: &Statement, cmp: &CmpOptions) -> bool {
        self.mainsnak.equals(&other.mainsnak, cmp.fold_values)
            && snak_multiset_eq(&self.qualifiers, &other.qualifiers, cmp.fold_subvalues)
    }

    /// Full equality: value equality plus reference-set equality, reference
    /// order irrelevant
    pub fn equal_full(&self, other: &Statement, cmp: &CmpOptions) -> bool {
        self.equal_value(other, cmp)
            && reference_multiset_eq(&self.references, &other.references, cmp.fold_subvalues)
    }

    /// A known-value mainsnak carrying no value payload (or an empty-text
    /// payload) requests removal of every current statement of its property
    pub fn is_deletion_marker(&self) -> bool {
        self.mainsnak.kind == SnakKind::KnownValue
            && match &self.mainsnak.value {
                None => true,
                Some(v) => v.is_empty_text(),
            }
    }

    /// A removal-flagged statement the remote store has never seen needs no
    /// removal instruction and can simply be dropped from the payload
    pub fn is_droppable_removal(&self) -> bool {
        self.removed && self.remote_id.is_none()
    }
}
