// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::consts::{DEFAULT_CACHE_TTL_SECS, DEFAULT_COMPONENT_VERSION};
use crate::config::ConfigMap;
use crate::errors::{RegistryError, Result};
use crate::observability::messages::registry::{
    RegistryCacheEvicted, RegistryEntryOverwritten, RegistryEntryRegistered, RegistryLazyLoaded,
    RegistryLookupFailed,
};

/// Builds a component from its config map.
pub type Constructor<T> = Arc<dyn Fn(&ConfigMap) -> Result<T> + Send + Sync>;

/// Resolves a name inside a fallback namespace, used for lazy registration.
pub type NamespaceResolver<T> = fn(&str) -> Option<Constructor<T>>;

/// What a registry holds. Only `Operator` registries resolve names lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Operator,
    Pipeline,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKind::Operator => write!(f, "operator"),
            RegistryKind::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// Optional details supplied at registration time.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub source_module: Option<String>,
    pub version: Option<String>,
}

/// Metadata kept alongside every registered constructor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryMetadata {
    pub registered_at: DateTime<Utc>,
    pub source_module: String,
    pub version: String,
    pub lazy_loaded: bool,
}

/// Lookup counters of one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub registrations: u64,
    pub lookups: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
    pub cache_size: usize,
    pub entries: usize,
}

struct CacheEntry<T> {
    constructor: Constructor<T>,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// TTL cache in front of the entry map. Purely an optimization: every
/// cached value is also in the map, so a miss only costs a second lookup.
struct RegistryCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    ttl: Duration,
}

impl<T> RegistryCache<T> {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    fn get(&mut self, name: &str) -> Option<Constructor<T>> {
        let now = Instant::now();
        match self.entries.get(name) {
            Some(entry) if entry.is_live(now) => Some(entry.constructor.clone()),
            Some(_) => {
                self.entries.remove(name);
                None
            }
            None => None,
        }
    }

    fn set(&mut self, name: &str, constructor: Constructor<T>) {
        let now = Instant::now();
        self.entries.insert(
            name.to_string(),
            CacheEntry {
                constructor,
                expires_at: now.checked_add(self.ttl),
            },
        );
    }

    fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    fn cleanup_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }
}

struct RegistryState<T> {
    entries: HashMap<String, (Constructor<T>, EntryMetadata)>,
    cache: RegistryCache<T>,
    namespaces: Vec<(String, NamespaceResolver<T>)>,
    stats: RegistryStats,
}

/// Name to constructor mapping for one kind of component.
///
/// Lookups go cache, then entry map, then (operator registries only) the
/// fallback namespaces in the order they were added. A name found in a
/// namespace is registered and cached as a side effect. All state sits behind
/// one mutex; lookups are rare next to the I/O they set up.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use the_corpusmill::config::{Registry, RegistryKind};
///
/// let registry: Registry<String> = Registry::new("greetings", RegistryKind::Pipeline);
/// registry
///     .register("hello", Arc::new(|_| Ok("hello".to_string())), None)
///     .unwrap();
///
/// let built = registry.create("hello", &Default::default()).unwrap();
/// assert_eq!(built, "hello");
/// ```
pub struct Registry<T> {
    name: String,
    kind: RegistryKind,
    state: Mutex<RegistryState<T>>,
}

impl<T> Registry<T> {
    pub fn new(name: &str, kind: RegistryKind) -> Self {
        Self::with_ttl(name, kind, Duration::from_secs(DEFAULT_CACHE_TTL_SECS))
    }

    pub fn with_ttl(name: &str, kind: RegistryKind, ttl: Duration) -> Self {
        Self {
            name: name.to_string(),
            kind,
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                cache: RegistryCache::new(ttl),
                namespaces: Vec::new(),
                stats: RegistryStats::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RegistryKind {
        self.kind
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `constructor` under `name`. An existing entry is replaced with a warning.
    pub fn register(
        &self,
        name: &str,
        constructor: Constructor<T>,
        registration: Option<Registration>,
    ) -> std::result::Result<(), RegistryError> {
        if name.trim().is_empty() {
            let mut state = self.lock();
            state.stats.errors += 1;
            return Err(RegistryError::InvalidRegistration {
                registry: self.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }

        let registration = registration.unwrap_or_default();
        let metadata = EntryMetadata {
            registered_at: Utc::now(),
            source_module: registration
                .source_module
                .unwrap_or_else(|| module_path!().to_string()),
            version: registration
                .version
                .unwrap_or_else(|| DEFAULT_COMPONENT_VERSION.to_string()),
            lazy_loaded: false,
        };
        self.insert(name, constructor, metadata);
        Ok(())
    }

    fn insert(&self, name: &str, constructor: Constructor<T>, metadata: EntryMetadata) {
        let mut state = self.lock();
        if state.entries.contains_key(name) {
            tracing::warn!(
                "{}",
                RegistryEntryOverwritten {
                    registry: &self.name,
                    name,
                }
            );
        }
        tracing::debug!(
            "{}",
            RegistryEntryRegistered {
                registry: &self.name,
                name,
                source_module: &metadata.source_module,
            }
        );
        state.cache.set(name, constructor.clone());
        state.entries.insert(name.to_string(), (constructor, metadata));
        state.stats.registrations += 1;
    }

    /// Add a namespace searched when an operator name is not registered.
    pub fn add_fallback_namespace(&self, namespace: &str, resolver: NamespaceResolver<T>) {
        self.lock().namespaces.push((namespace.to_string(), resolver));
    }

    /// Constructor registered under `name`.
    pub fn get(&self, name: &str) -> std::result::Result<Constructor<T>, RegistryError> {
        let mut state = self.lock();
        state.stats.lookups += 1;

        if let Some(constructor) = state.cache.get(name) {
            state.stats.cache_hits += 1;
            return Ok(constructor);
        }
        state.stats.cache_misses += 1;

        if let Some((constructor, _)) = state.entries.get(name) {
            let constructor = constructor.clone();
            state.cache.set(name, constructor.clone());
            return Ok(constructor);
        }

        if self.kind == RegistryKind::Operator {
            let found = state
                .namespaces
                .iter()
                .find_map(|(namespace, resolve)| resolve(name).map(|c| (namespace.clone(), c)));
            if let Some((namespace, constructor)) = found {
                tracing::info!(
                    "{}",
                    RegistryLazyLoaded {
                        registry: &self.name,
                        name,
                        namespace: &namespace,
                    }
                );
                let metadata = EntryMetadata {
                    registered_at: Utc::now(),
                    source_module: namespace,
                    version: DEFAULT_COMPONENT_VERSION.to_string(),
                    lazy_loaded: true,
                };
                state.cache.set(name, constructor.clone());
                state
                    .entries
                    .insert(name.to_string(), (constructor.clone(), metadata));
                state.stats.registrations += 1;
                return Ok(constructor);
            }
        }

        state.stats.errors += 1;
        let error = RegistryError::NotFound {
            name: name.to_string(),
            registry: self.name.clone(),
        };
        tracing::error!("{}", RegistryLookupFailed { error: &error });
        Err(error)
    }

    /// Look up `name` and build it from `config`.
    pub fn create(&self, name: &str, config: &ConfigMap) -> Result<T> {
        let constructor = self.get(name)?;
        constructor(config)
    }

    /// Remove `name`. Returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut state = self.lock();
        state.cache.remove(name);
        state.entries.remove(name).is_some()
    }

    /// Whether `name` is registered. Does not trigger lazy resolution.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_metadata(&self, name: &str) -> Option<EntryMetadata> {
        self.lock().entries.get(name).map(|(_, m)| m.clone())
    }

    /// Drop expired cache entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let removed = self.lock().cache.cleanup_expired();
        if removed > 0 {
            tracing::debug!(
                "{}",
                RegistryCacheEvicted {
                    registry: &self.name,
                    count: removed,
                }
            );
        }
        removed
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.lock();
        RegistryStats {
            cache_size: state.cache.entries.len(),
            entries: state.entries.len(),
            ..state.stats.clone()
        }
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("entries", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CorpusError;

    fn constant(value: &'static str) -> Constructor<String> {
        Arc::new(move |_| Ok(value.to_string()))
    }

    fn resolve_demo(name: &str) -> Option<Constructor<String>> {
        match name {
            "lazy_op" => Some(constant("lazy")),
            _ => None,
        }
    }

    #[test]
    fn test_second_registration_wins() {
        let registry = Registry::new("ops", RegistryKind::Operator);
        registry.register("x", constant("first"), None).unwrap();
        registry.register("x", constant("second"), None).unwrap();

        assert_eq!(registry.create("x", &ConfigMap::new()).unwrap(), "second");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().registrations, 2);
    }

    #[test]
    fn test_rejects_empty_name() {
        let registry = Registry::new("ops", RegistryKind::Operator);
        let err = registry.register("  ", constant("x"), None).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRegistration { .. }));
        assert_eq!(registry.stats().errors, 1);
    }

    #[test]
    fn test_lookup_failure_is_not_found() {
        let registry: Registry<String> = Registry::new("ops", RegistryKind::Operator);
        let Err(err) = registry.get("missing") else {
            panic!("lookup of an unregistered name should fail");
        };
        assert_eq!(
            err.to_string(),
            "No object named 'missing' found in 'ops' registry"
        );

        let err = registry.create("missing", &ConfigMap::new()).unwrap_err();
        assert!(matches!(err, CorpusError::Registry(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_lazy_resolution_only_for_operator_kind() {
        struct TestCase {
            name: &'static str,
            kind: RegistryKind,
            resolves: bool,
        }

        let test_cases = vec![
            TestCase {
                name: "operator registry searches namespaces",
                kind: RegistryKind::Operator,
                resolves: true,
            },
            TestCase {
                name: "pipeline registry does not",
                kind: RegistryKind::Pipeline,
                resolves: false,
            },
        ];

        for tc in test_cases {
            let registry = Registry::new("r", tc.kind);
            registry.add_fallback_namespace("demo", resolve_demo);

            assert!(!registry.contains("lazy_op"), "{}", tc.name);
            assert_eq!(registry.get("lazy_op").is_ok(), tc.resolves, "{}", tc.name);
            assert_eq!(registry.contains("lazy_op"), tc.resolves, "{}", tc.name);

            if tc.resolves {
                let meta = registry.get_metadata("lazy_op").unwrap();
                assert!(meta.lazy_loaded);
                assert_eq!(meta.source_module, "demo");
            }
        }
    }

    #[test]
    fn test_cache_hit_and_miss_counters() {
        let registry = Registry::new("ops", RegistryKind::Operator);
        registry.register("x", constant("x"), None).unwrap();

        registry.get("x").unwrap();
        registry.get("x").unwrap();

        let stats = registry.stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_misses, 0);
    }

    #[test]
    fn test_expired_cache_falls_back_to_map() {
        let registry = Registry::with_ttl("ops", RegistryKind::Operator, Duration::ZERO);
        registry.register("x", constant("x"), None).unwrap();

        assert_eq!(registry.cleanup_expired(), 1);
        assert_eq!(registry.create("x", &ConfigMap::new()).unwrap(), "x");

        let stats = registry.stats();
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let registry = Registry::with_ttl(
            "ops",
            RegistryKind::Operator,
            Duration::from_secs(u64::MAX),
        );
        registry.register("x", constant("x"), None).unwrap();

        assert_eq!(registry.cleanup_expired(), 0);
        assert_eq!(registry.create("x", &ConfigMap::new()).unwrap(), "x");
        assert_eq!(registry.stats().cache_hits, 1);
    }

    #[test]
    fn test_unregister_and_metadata() {
        let registry = Registry::new("ops", RegistryKind::Operator);
        registry
            .register(
                "x",
                constant("x"),
                Some(Registration {
                    source_module: Some("builtin".into()),
                    version: Some("2.0.0".into()),
                }),
            )
            .unwrap();

        let meta = registry.get_metadata("x").unwrap();
        assert_eq!(meta.version, "2.0.0");
        assert_eq!(meta.source_module, "builtin");
        assert!(!meta.lazy_loaded);

        assert!(registry.unregister("x"));
        assert!(!registry.unregister("x"));
        assert!(registry.get("x").is_err());
    }
}
