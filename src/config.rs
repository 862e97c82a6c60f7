//! # Configuration
//!
//! Base filters, per-cache settings, and engine defaults.
//!
//! Engine defaults are loaded with precedence: overrides > env vars >
//! config file > built-in defaults.
//!
//! # Example config file (claimsync.toml)
//! ```toml
//! page_size = 10000
//! language = "en"
//! endpoint = "https://query.example.org/sparql"
//! ```

use crate::model::{PropertyId, Value};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default page size for the paged subgraph query
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

/// Default language for label/description/alias lookups
pub const DEFAULT_LANGUAGE: &str = "en";

/// One constraint of a base filter: the property must be present, optionally
/// with a specific value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    /// The property must carry this exact value
    Exact(Value),
    /// Any value satisfies the constraint (presence only)
    Any,
}

/// The subgraph predicate defining which entities a cache instance mirrors.
///
/// Constraints are an ordered set; order matters for the canonical signature
/// used to share cache instances.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseFilter {
    pub constraints: Vec<(PropertyId, FilterValue)>,
}

impl BaseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the property to be present with the given value
    pub fn require(mut self, property: PropertyId, value: Value) -> Self {
        self.constraints.push((property, FilterValue::Exact(value)));
        self
    }

    /// Require the property to be present with any value
    pub fn require_any(mut self, property: PropertyId) -> Self {
        self.constraints.push((property, FilterValue::Any));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Constructor configuration for one remote-state cache instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// The subgraph predicate this cache mirrors
    pub filter: BaseFilter,
    /// Compare statements by full equality (references included)
    pub use_refs: bool,
    /// Case-insensitive value comparison
    pub case_insensitive: bool,
    /// Rows per paged query
    pub page_size: usize,
    /// Label identifying the remote endpoint; part of the sharing key so
    /// caches for different endpoints are never conflated
    pub endpoint: String,
}

impl CacheSettings {
    pub fn new(filter: BaseFilter) -> Self {
        Self {
            filter,
            use_refs: false,
            case_insensitive: false,
            page_size: DEFAULT_PAGE_SIZE,
            endpoint: String::new(),
        }
    }

    pub fn with_use_refs(mut self, use_refs: bool) -> Self {
        self.use_refs = use_refs;
        self
    }

    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Canonical signature identifying the cache instance: filter,
    /// comparison flags, and endpoint. Page size is excluded; it affects
    /// query batching, not cache semantics.
    pub fn signature(&self) -> String {
        #[derive(Serialize)]
        struct Signature<'a> {
            filter: &'a BaseFilter,
            use_refs: bool,
            case_insensitive: bool,
            endpoint: &'a str,
        }
        serde_json::to_string(&Signature {
            filter: &self.filter,
            use_refs: self.use_refs,
            case_insensitive: self.case_insensitive,
            endpoint: &self.endpoint,
        })
        .unwrap_or_else(|_| format!("{:?}", self))
    }
}

/// Engine-wide defaults, loadable from file and environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows per paged query
    pub page_size: usize,
    /// Language for term lookups
    pub language: String,
    /// Remote endpoint label
    pub endpoint: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            language: DEFAULT_LANGUAGE.to_string(),
            endpoint: String::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration with precedence: env > file > defaults
    ///
    /// Environment variables use the `CLAIMSYNC_` prefix, e.g.
    /// `CLAIMSYNC_PAGE_SIZE=5000`.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("CLAIMSYNC_"));
        figment.extract().map_err(ConfigError::from)
    }

    /// Settings for a cache over the given filter, using these defaults
    pub fn cache_settings(&self, filter: BaseFilter) -> CacheSettings {
        CacheSettings::new(filter)
            .with_page_size(self.page_size)
            .with_endpoint(self.endpoint.clone())
    }
}

/// Configuration loading error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;
    use std::io::Write;

    #[test]
    fn test_signature_distinguishes_filters_and_flags() {
        let human = BaseFilter::new().require(
            PropertyId::new("P31"),
            Value::Entity(EntityId::new("Q5")),
        );
        let any = BaseFilter::new().require_any(PropertyId::new("P31"));

        let a = CacheSettings::new(human.clone()).signature();
        let b = CacheSettings::new(any).signature();
        let c = CacheSettings::new(human.clone()).with_use_refs(true).signature();
        let d = CacheSettings::new(human).with_endpoint("other").signature();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_signature_ignores_page_size() {
        let filter = BaseFilter::new().require_any(PropertyId::new("P31"));
        let a = CacheSettings::new(filter.clone()).with_page_size(100).signature();
        let b = CacheSettings::new(filter).with_page_size(5000).signature();
        assert_eq!(a, b);
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::load(None).unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_engine_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claimsync.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "page_size = 250\nlanguage = \"de\"").unwrap();

        let config = EngineConfig::load(path.to_str()).unwrap();
        assert_eq!(config.page_size, 250);
        assert_eq!(config.language, "de");

        let settings = config.cache_settings(BaseFilter::new());
        assert_eq!(settings.page_size, 250);
    }
}
