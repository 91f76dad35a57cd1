//! Map specialization for plain value payloads.
//!
//! Values are handed out by copy (`Clone`) rather than by reference, and
//! deletes report only whether something was removed.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Deref;

use crate::error::MapError;
use crate::fingerprint::FingerprintBuilder;
use crate::map::{UnorderedMap, DEFAULT_BUCKET_CAPACITY};
use crate::pool::RecordHandle;
use crate::MapConfig;

/// Unordered map of value-type payloads.
///
/// Read-only access to the underlying [`UnorderedMap`] is available through
/// `Deref`.
#[derive(Clone)]
pub struct UnorderedValueMap<K, V, const N: usize = DEFAULT_BUCKET_CAPACITY, S = FingerprintBuilder>
{
    inner: UnorderedMap<K, V, N, S>,
}

impl<K, V, const N: usize> UnorderedValueMap<K, V, N, FingerprintBuilder> {
    /// Create an empty map with the default fingerprint function.
    pub fn new() -> Self {
        Self {
            inner: UnorderedMap::new(),
        }
    }

    /// Create an empty map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: UnorderedMap::with_capacity(capacity),
        }
    }

    /// Create an empty map from `config`.
    pub fn with_config(config: MapConfig) -> Self {
        Self {
            inner: UnorderedMap::with_config(config),
        }
    }
}

impl<K, V, const N: usize, S> UnorderedValueMap<K, V, N, S> {
    /// Create an empty map fingerprinting keys with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            inner: UnorderedMap::with_hasher(hasher),
        }
    }

    /// Unwrap the underlying engine.
    pub fn into_inner(self) -> UnorderedMap<K, V, N, S> {
        self.inner
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn free(&mut self) {
        self.inner.free();
    }

    /// Overwrite the value at position `index`.
    pub fn set_at(&mut self, index: usize, value: V) -> bool {
        match self.inner.value_at_mut(index) {
            Some(current) => {
                *current = value;
                true
            }
            None => false,
        }
    }

    /// First key, in position order, whose value equals `value`.
    pub fn key_of(&self, value: &V) -> Option<&K>
    where
        V: PartialEq,
    {
        self.inner.iter().find(|(_, v)| *v == value).map(|(k, _)| k)
    }
}

impl<K, V, const N: usize, S> UnorderedValueMap<K, V, N, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn add(&mut self, key: K, value: V) -> Result<RecordHandle, MapError> {
        self.inner.add(key, value)
    }

    /// Copy of the value stored for `key`.
    pub fn get_value<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner.get(key).cloned()
    }

    /// Copy of the value stored for `key`, or `default`.
    pub fn get_or<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.get_value(key).unwrap_or(default)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get_mut(key)
    }

    /// Overwrite the value of an existing key.
    pub fn change<Q>(&mut self, key: &Q, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.change(key, value).is_ok()
    }

    pub fn change_or_add(&mut self, key: K, value: V) -> Result<(), MapError> {
        self.inner.change_or_add(key, value).map(|_| ())
    }

    /// Remove `key`.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.delete(key).is_some()
    }

    pub fn delete_at(&mut self, index: usize) -> bool {
        self.inner.delete_at(index).is_some()
    }

    pub fn delete_by_value(&mut self, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.inner.delete_by_value(value).is_some()
    }

    pub fn delete_range(&mut self, start: usize, count: usize) -> usize {
        self.inner.delete_range(start, count)
    }

    /// Remove `key` and return its value.
    pub fn take<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.delete(key)
    }
}

impl<K, V, const N: usize, S> Deref for UnorderedValueMap<K, V, N, S> {
    type Target = UnorderedMap<K, V, N, S>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<K, V, const N: usize, S: Default> Default for UnorderedValueMap<K, V, N, S> {
    fn default() -> Self {
        Self {
            inner: UnorderedMap::default(),
        }
    }
}

impl<K, V, const N: usize, S> From<UnorderedMap<K, V, N, S>> for UnorderedValueMap<K, V, N, S> {
    fn from(inner: UnorderedMap<K, V, N, S>) -> Self {
        Self { inner }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize, S> fmt::Debug for UnorderedValueMap<K, V, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}
