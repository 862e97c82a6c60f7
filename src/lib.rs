//! # Claimsync
//!
//! A write-avoidance cache and statement reconciliation engine for
//! collaboratively-edited graph stores.
//!
//! Editing agents propose new or changed statements against a remote graph
//! whose writes are rate-limited, permanent, and conflict-prone. This crate
//! mirrors a filtered subset of the remote state locally through paged
//! queries, decides whether a proposed edit actually differs from what the
//! store already holds ([`MirrorCache::write_required`]), and, when a
//! write is unavoidable, merges proposed statements into the authoritative
//! current state ([`reconcile::reconcile`]), deciding what is inserted,
//! what is marked for removal, and how references merge.
//!
//! Transport, retry, and authentication are caller-supplied collaborators
//! behind the traits in [`query`].

pub mod cache;
pub mod config;
pub mod datatype;
pub mod index;
pub mod model;
pub mod pool;
pub mod query;
pub mod reconcile;
pub mod test_support;

// Re-export main types for convenience
pub use cache::MirrorCache;
pub use config::{BaseFilter, CacheSettings, EngineConfig, FilterValue};
pub use datatype::{CachedValue, DatatypeRegistry};
pub use index::{AmbiguousEntity, ReverseIndex};
pub use model::{
    CmpOptions, EntityId, MergeMode, PropertyId, Rank, RefMode, Reference, Snak, SnakKind,
    Statement, Value,
};
pub use pool::CachePool;
pub use query::{DatatypeResolver, QueryRow, SubgraphQuery, TermKind, TermQuery};
pub use reconcile::{is_good_reference, reconcile, ReconcileOptions, RefTemplate};
