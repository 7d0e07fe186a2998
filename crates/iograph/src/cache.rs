// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Memoization of parametric IO type descriptors.
//!
//! Parametric descriptors (`NullableIO<NumberIO>`, `MapIO<StringIO,NumberIO>`)
//! are built once per distinct key and shared afterwards, so repeated
//! requests observe the identical [`IoType`] handle. Entries are never
//! evicted: descriptor identity is what callers compare.
//!
//! Every cache registers itself in a process-wide list so that
//! [`clear_all_caches`] can reset them all (test isolation).

use crate::io_type::{IoType, IoTypeId};
use parking_lot::{Mutex, RwLock};
use std::any::TypeId;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, OnceLock, Weak};

/// Cache key for descriptors parameterized by other descriptors.
///
/// Parameter order matters: `(A, B)` and `(B, A)` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParametricKey {
    rust_type: Option<TypeId>,
    parameters: Vec<IoTypeId>,
}

impl ParametricKey {
    /// Key for a descriptor whose instances are the Rust type `T`.
    pub fn typed<T: 'static>(parameters: &[&IoType]) -> Self {
        Self {
            rust_type: Some(TypeId::of::<T>()),
            parameters: parameters.iter().map(|t| t.id()).collect(),
        }
    }

    /// Key for a descriptor that only depends on its parameters.
    pub fn untyped(parameters: &[&IoType]) -> Self {
        Self {
            rust_type: None,
            parameters: parameters.iter().map(|t| t.id()).collect(),
        }
    }
}

/// Cache hit/miss statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
}

trait Clearable: Send + Sync {
    fn clear(&self);
}

fn live_caches() -> &'static Mutex<Vec<Weak<dyn Clearable>>> {
    static CACHES: OnceLock<Mutex<Vec<Weak<dyn Clearable>>>> = OnceLock::new();
    CACHES.get_or_init(|| Mutex::new(Vec::new()))
}

/// Empty every live cache. Later requests rebuild fresh descriptors.
pub fn clear_all_caches() {
    let mut caches = live_caches().lock();
    caches.retain(|weak| weak.strong_count() > 0);
    for cache in caches.iter().filter_map(Weak::upgrade) {
        cache.clear();
    }
    log::debug!("[cache] cleared {} descriptor caches", caches.len());
}

/// Key → descriptor memo table.
pub struct TypeCache<K> {
    inner: RwLock<HashMap<K, IoType>>,
    stats: RwLock<LookupStats>,
}

impl<K> TypeCache<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Create a cache and register it for [`clear_all_caches`].
    pub fn new() -> Arc<Self> {
        let cache = Arc::new(Self {
            inner: RwLock::new(HashMap::new()),
            stats: RwLock::new(LookupStats::default()),
        });
        let as_clearable: Arc<dyn Clearable> = cache.clone();
        live_caches().lock().push(Arc::downgrade(&as_clearable));
        cache
    }

    /// Return the cached descriptor for `key`, building it on first use.
    ///
    /// `build` runs under the cache's write lock and must not request a
    /// descriptor from this same cache.
    pub fn get_or_create<F>(&self, key: K, build: F) -> IoType
    where
        F: FnOnce() -> IoType,
    {
        if let Some(hit) = self.inner.read().get(&key) {
            self.stats.write().hits += 1;
            return hit.clone();
        }

        let mut cache = self.inner.write();
        if let Some(hit) = cache.get(&key) {
            self.stats.write().hits += 1;
            return hit.clone();
        }
        let built = build();
        cache.insert(key, built.clone());
        self.stats.write().misses += 1;
        built
    }

    /// Fallible variant of [`get_or_create`](Self::get_or_create); nothing is
    /// cached when `build` fails.
    pub fn get_or_try_create<F, E>(&self, key: K, build: F) -> Result<IoType, E>
    where
        F: FnOnce() -> Result<IoType, E>,
    {
        if let Some(hit) = self.inner.read().get(&key) {
            self.stats.write().hits += 1;
            return Ok(hit.clone());
        }

        let mut cache = self.inner.write();
        if let Some(hit) = cache.get(&key) {
            self.stats.write().hits += 1;
            return Ok(hit.clone());
        }
        let built = build()?;
        cache.insert(key, built.clone());
        self.stats.write().misses += 1;
        Ok(built)
    }

    pub fn get(&self, key: &K) -> Option<IoType> {
        self.inner.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn stats(&self) -> LookupStats {
        *self.stats.read()
    }
}

impl<K> Clearable for TypeCache<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn clear(&self) {
        self.inner.write().clear();
    }
}

#[cfg(test)]
mod tests;
