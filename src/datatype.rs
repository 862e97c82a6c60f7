//! # Datatype Registry
//!
//! Maps property datatype tags to value constructors used when expanding
//! compact cache entries back into typed values. The registry is populated
//! at startup with the built-in tags; callers may register additional tags
//! for site-specific datatypes. Unknown tags are an error, never a guess.

use crate::model::{normalize_unit, EntityId, Value};
use anyhow::{anyhow, Result};
use hashbrown::HashMap;

/// A flattened value as stored in the compact cache: the index-key string
/// plus an optional unit for quantities.
#[derive(Debug, Clone, Copy)]
pub struct CachedValue<'a> {
    pub value: &'a str,
    pub unit: Option<&'a str>,
}

impl<'a> CachedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self { value, unit: None }
    }

    pub fn with_unit(value: &'a str, unit: Option<&'a str>) -> Self {
        Self { value, unit }
    }
}

/// Constructor from a cached flat value to a typed value
pub type ValueCtor = fn(&CachedValue<'_>) -> Result<Value>;

/// Registry of datatype tag → value constructor
#[derive(Clone)]
pub struct DatatypeRegistry {
    ctors: HashMap<String, ValueCtor>,
}

impl std::fmt::Debug for DatatypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<&str> = self.ctors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("DatatypeRegistry").field("tags", &tags).finish()
    }
}

impl Default for DatatypeRegistry {
    fn default() -> Self {
        let mut registry = Self {
            ctors: HashMap::new(),
        };
        registry.register("wikibase-item", ctor_entity);
        registry.register("wikibase-property", ctor_entity);
        registry.register("quantity", ctor_quantity);
        registry.register("string", ctor_text);
        registry.register("external-id", ctor_text);
        registry.register("url", ctor_uri);
        registry.register("time", ctor_time);
        registry.register("monolingualtext", ctor_monolingual);
        registry.register("commonsMedia", ctor_text);
        registry
    }
}

impl DatatypeRegistry {
    /// Register (or override) the constructor for a datatype tag
    pub fn register(&mut self, tag: impl Into<String>, ctor: ValueCtor) {
        self.ctors.insert(tag.into(), ctor);
    }

    /// Construct a typed value from its cached flat form
    pub fn construct(&self, tag: &str, cached: &CachedValue<'_>) -> Result<Value> {
        let ctor = self
            .ctors
            .get(tag)
            .ok_or_else(|| anyhow!("no value constructor registered for datatype '{tag}'"))?;
        ctor(cached)
    }

    /// Whether a constructor is registered for the tag
    pub fn supports(&self, tag: &str) -> bool {
        self.ctors.contains_key(tag)
    }
}

fn ctor_entity(cached: &CachedValue<'_>) -> Result<Value> {
    Ok(Value::Entity(EntityId::new(cached.value)))
}

fn ctor_quantity(cached: &CachedValue<'_>) -> Result<Value> {
    let amount: f64 = cached
        .value
        .parse()
        .map_err(|_| anyhow!("malformed quantity amount '{}'", cached.value))?;
    Ok(Value::Quantity {
        amount,
        unit: normalize_unit(cached.unit),
    })
}

fn ctor_text(cached: &CachedValue<'_>) -> Result<Value> {
    Ok(Value::Text(cached.value.to_string()))
}

fn ctor_uri(cached: &CachedValue<'_>) -> Result<Value> {
    Ok(Value::Uri(cached.value.to_string()))
}

fn ctor_time(cached: &CachedValue<'_>) -> Result<Value> {
    Ok(Value::Time(cached.value.to_string()))
}

// The paged query flattens monolingual text to its text component; the
// language is not recoverable from the cache, so reconstruction yields
// plain text and value equality compares by text (see `Value::equals`).
fn ctor_monolingual(cached: &CachedValue<'_>) -> Result<Value> {
    Ok(Value::Text(cached.value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tags() {
        let registry = DatatypeRegistry::default();
        for tag in [
            "wikibase-item",
            "quantity",
            "string",
            "external-id",
            "url",
            "time",
            "monolingualtext",
        ] {
            assert!(registry.supports(tag), "missing builtin tag {tag}");
        }
        assert!(!registry.supports("globe-coordinate"));
    }

    #[test]
    fn test_item_construction_normalizes_uri() {
        let registry = DatatypeRegistry::default();
        let value = registry
            .construct(
                "wikibase-item",
                &CachedValue::new("http://www.wikidata.org/entity/Q42"),
            )
            .unwrap();
        assert_eq!(value, Value::Entity(EntityId::new("Q42")));
    }

    #[test]
    fn test_quantity_construction() {
        let registry = DatatypeRegistry::default();
        let value = registry
            .construct(
                "quantity",
                &CachedValue::with_unit("1.5", Some("http://www.wikidata.org/entity/Q11573")),
            )
            .unwrap();
        assert_eq!(
            value,
            Value::Quantity {
                amount: 1.5,
                unit: Some("Q11573".to_string())
            }
        );

        assert!(registry
            .construct("quantity", &CachedValue::new("not-a-number"))
            .is_err());
    }

    #[test]
    fn test_unknown_tag_is_error() {
        let registry = DatatypeRegistry::default();
        let err = registry
            .construct("musical-notation", &CachedValue::new("x"))
            .unwrap_err();
        assert!(err.to_string().contains("musical-notation"));
    }

    #[test]
    fn test_custom_registration() {
        fn ctor(cached: &CachedValue<'_>) -> Result<Value> {
            Ok(Value::Text(cached.value.to_uppercase()))
        }
        let mut registry = DatatypeRegistry::default();
        registry.register("shouting-string", ctor);
        let value = registry
            .construct("shouting-string", &CachedValue::new("abc"))
            .unwrap();
        assert_eq!(value, Value::Text("ABC".to_string()));
    }
}
