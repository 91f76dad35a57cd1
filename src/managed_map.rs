//! Map specialization that owns boxed payloads.
//!
//! Every object stored here is destroyed when its entry is overwritten,
//! deleted, cleared or freed, unless it is explicitly taken back with
//! [`UnorderedManagedMap::unlink`].

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Deref;

use crate::error::MapError;
use crate::fingerprint::FingerprintBuilder;
use crate::map::{UnorderedMap, DEFAULT_BUCKET_CAPACITY};
use crate::pool::RecordHandle;
use crate::MapConfig;

/// Unordered map owning one heap object per key.
#[derive(Clone)]
pub struct UnorderedManagedMap<K, T, const N: usize = DEFAULT_BUCKET_CAPACITY, S = FingerprintBuilder>
{
    inner: UnorderedMap<K, Box<T>, N, S>,
}

impl<K, T, const N: usize> UnorderedManagedMap<K, T, N, FingerprintBuilder> {
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

impl<K, T, const N: usize, S> UnorderedManagedMap<K, T, N, S> {
    /// Create an empty map fingerprinting keys with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            inner: UnorderedMap::with_hasher(hasher),
        }
    }

    /// Destroy every object.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Destroy every object and return all backing storage.
    pub fn free(&mut self) {
        self.inner.free();
    }

    /// Keys and objects in position order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> + '_ {
        self.inner.iter().map(|(k, v)| (k, &**v))
    }

    /// Objects in position order.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.inner.values().map(|v| &**v)
    }

    /// Object at position `index`.
    pub fn value_at(&self, index: usize) -> Option<&T> {
        self.inner.value_at(index).map(|v| &**v)
    }

    /// Mutable object at position `index`.
    pub fn value_at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.inner.value_at_mut(index).map(|v| &mut **v)
    }
}

impl<K, T, const N: usize, S> UnorderedManagedMap<K, T, N, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Take ownership of `value` under `key`. On failure `value` is destroyed.
    pub fn add(&mut self, key: K, value: Box<T>) -> Result<RecordHandle, MapError> {
        self.inner.add(key, value)
    }

    /// Box `value` and add it.
    pub fn add_value(&mut self, key: K, value: T) -> Result<RecordHandle, MapError> {
        self.add(key, Box::new(value))
    }

    /// Object stored for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key).map(|v| &**v)
    }

    /// Mutable object stored for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get_mut(key).map(|v| &mut **v)
    }

    /// Replace the object stored for `key`, destroying the old one.
    pub fn change<Q>(&mut self, key: &Q, value: Box<T>) -> Result<(), MapError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        drop(self.inner.change(key, value)?);
        Ok(())
    }

    /// Replace the object for `key`, destroying the old one, or add it.
    pub fn change_or_add(&mut self, key: K, value: Box<T>) -> Result<(), MapError> {
        drop(self.inner.change_or_add(key, value)?);
        Ok(())
    }

    /// Remove `key` and destroy its object.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.delete(key).is_some()
    }

    /// Remove the entry at position `index` and destroy its object.
    pub fn delete_at(&mut self, index: usize) -> bool {
        self.inner.delete_at(index).is_some()
    }

    /// Remove the first entry, in position order, whose object equals
    /// `value`, and destroy it.
    pub fn delete_by_value(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.inner.values().position(|v| **v == *value) {
            Some(index) => self.inner.delete_at(index).is_some(),
            None => false,
        }
    }

    /// Remove up to `count` entries from position `start`, destroying their
    /// objects. Returns how many were removed.
    pub fn delete_range(&mut self, start: usize, count: usize) -> usize {
        self.inner.delete_range(start, count)
    }

    /// Remove `key` and hand its object back instead of destroying it.
    pub fn unlink<Q>(&mut self, key: &Q) -> Option<Box<T>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.delete(key)
    }

    /// Remove the entry at position `index` and hand it back.
    pub fn unlink_at(&mut self, index: usize) -> Option<(K, Box<T>)> {
        self.inner.delete_at(index)
    }
}

impl<K, T, const N: usize, S> Deref for UnorderedManagedMap<K, T, N, S> {
    type Target = UnorderedMap<K, Box<T>, N, S>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<K, T, const N: usize, S: Default> Default for UnorderedManagedMap<K, T, N, S> {
    fn default() -> Self {
        Self {
            inner: UnorderedMap::default(),
        }
    }
}

impl<K: fmt::Debug, T: fmt::Debug, const N: usize, S> fmt::Debug
    for UnorderedManagedMap<K, T, N, S>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}
