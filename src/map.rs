//! Dense, pool-backed unordered map.
//!
//! Records live in a [`RecordPool`]; a dense array of handles gives them
//! positions `0..len` with no gaps, and a [`HashIdMap`] maps each key's
//! fingerprint to its position. Deleting from the middle moves the last
//! record into the hole, so positions (slot-ids) are not stable across
//! deletes, but record handles are.
//!
//! Invariant kept by every operation: each live record has exactly one
//! `(fingerprint(key), position)` pair in the index, and the index holds
//! nothing else.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;
use std::mem;
use std::slice;

use crate::error::MapError;
use crate::fingerprint::{fingerprint, FingerprintBuilder};
use crate::index::{HashIdMap, SlotId};
use crate::pool::{Record, RecordHandle, RecordPool};
use crate::MapConfig;

/// Collision bucket capacity used when none is given.
pub const DEFAULT_BUCKET_CAPACITY: usize = 8;

/// Unordered map over densely packed, pooled records.
///
/// `N` is the number of keys that may share one fingerprint; `S` builds the
/// fingerprint function.
#[derive(Clone)]
pub struct UnorderedMap<K, V, const N: usize = DEFAULT_BUCKET_CAPACITY, S = FingerprintBuilder> {
    index: HashIdMap<N>,
    pool: RecordPool<K, V>,
    /// Live records in position order.
    dense: Vec<RecordHandle>,
    hasher: S,
    config: MapConfig,
}

impl<K, V, const N: usize> UnorderedMap<K, V, N, FingerprintBuilder> {
    /// Create an empty map with the default fingerprint function.
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }

    /// Create an empty map with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(MapConfig {
            initial_capacity: capacity,
            ..MapConfig::default()
        })
    }

    /// Create an empty map from `config`.
    pub fn with_config(config: MapConfig) -> Self {
        Self::with_config_and_hasher(config, FingerprintBuilder::default())
    }
}

impl<K, V, const N: usize, S> UnorderedMap<K, V, N, S> {
    /// Create an empty map fingerprinting keys with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config_and_hasher(MapConfig::default(), hasher)
    }

    /// Create an empty map from `config`, fingerprinting keys with `hasher`.
    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Self {
        Self {
            index: HashIdMap::with_capacity(config.initial_capacity),
            pool: RecordPool::with_capacity(config.initial_capacity),
            dense: Vec::with_capacity(config.initial_capacity),
            hasher,
            config,
        }
    }

    /// Number of live records.
    #[inline]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Whether the map holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Records the dense array can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.dense.capacity()
    }

    /// The fingerprint index, for statistics.
    pub fn index(&self) -> &HashIdMap<N> {
        &self.index
    }

    /// The record pool, for statistics.
    pub fn pool(&self) -> &RecordPool<K, V> {
        &self.pool
    }

    /// The fingerprint function.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Settings the map was created with.
    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Key and value at position `index`.
    pub fn get_at(&self, index: usize) -> Option<(&K, &V)> {
        let handle = *self.dense.get(index)?;
        self.pool.get(handle).map(|r| (&r.key, &r.value))
    }

    /// Key at position `index`.
    pub fn key_at(&self, index: usize) -> Option<&K> {
        self.get_at(index).map(|(k, _)| k)
    }

    /// Value at position `index`.
    pub fn value_at(&self, index: usize) -> Option<&V> {
        self.get_at(index).map(|(_, v)| v)
    }

    /// Mutable value at position `index`.
    pub fn value_at_mut(&mut self, index: usize) -> Option<&mut V> {
        let handle = *self.dense.get(index)?;
        self.pool.get_mut(handle).map(|r| &mut r.value)
    }

    /// Look a record up by the handle `add` returned.
    ///
    /// Handles carry no generation, so a recycled handle resolves to
    /// whatever record now occupies its slot.
    #[cfg(test)]
    pub(crate) fn record(&self, handle: RecordHandle) -> Option<(&K, &V)> {
        self.pool.get(handle).map(|r| (&r.key, &r.value))
    }

    /// Visit records in position order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            handles: self.dense.iter(),
            pool: &self.pool,
        }
    }

    /// Keys in position order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Values in position order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Visit records in position order with mutable access to values.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &mut V),
    {
        for &handle in &self.dense {
            if let Some(record) = self.pool.get_mut(handle) {
                f(&record.key, &mut record.value);
            }
        }
    }

    /// Release every record. Storage is kept unless the map was configured
    /// with `shrink_on_clear`.
    pub fn clear(&mut self) {
        if self.config.shrink_on_clear {
            self.free();
            return;
        }
        self.pool.clear();
        self.dense.clear();
        self.index.clear();
    }

    /// Release every record and all backing storage.
    pub fn free(&mut self) {
        self.pool.free();
        self.dense = Vec::new();
        self.index.clear();
        self.index.shrink_to_fit();
    }

    /// Release spare capacity in the dense array, pool and index.
    pub fn shrink_to_fit(&mut self) {
        self.dense.shrink_to_fit();
        self.pool.shrink_to_fit();
        self.index.shrink_to_fit();
    }

    /// Approximate heap bytes held by the map.
    pub fn memory_usage(&self) -> usize {
        self.dense.capacity() * mem::size_of::<RecordHandle>()
            + self.pool.memory_usage()
            + self.index.memory_usage()
    }

    #[inline]
    fn record_at(&self, slot: SlotId) -> &Record<K, V> {
        self.pool
            .get(self.dense[slot])
            .expect("dense array references a released record")
    }
}

impl<K, V, const N: usize, S> UnorderedMap<K, V, N, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn fingerprint_of<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        fingerprint(&self.hasher, key)
    }

    fn find_slot<Q>(&self, fingerprint: u64, key: &Q) -> Option<SlotId>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let dense = &self.dense;
        let pool = &self.pool;
        self.index.find(fingerprint, |slot| {
            dense
                .get(slot)
                .and_then(|&handle| pool.get(handle))
                .is_some_and(|record| {
                    let stored: &Q = record.key.borrow();
                    stored == key
                })
        })
    }

    /// Insert a new key.
    ///
    /// Fails with [`MapError::DuplicateKey`] if the key is present, or
    /// [`MapError::IndexFull`] if `N` keys already share its fingerprint.
    /// Either way the map is unchanged and `key`/`value` are dropped.
    pub fn add(&mut self, key: K, value: V) -> Result<RecordHandle, MapError> {
        let fp = self.fingerprint_of(&key);
        if self.find_slot(fp, &key).is_some() {
            return Err(MapError::DuplicateKey);
        }

        let handle = self.pool.acquire(key, value);
        let slot = self.dense.len();
        self.dense.push(handle);

        if !self.index.add(fp, slot) {
            // Roll back: the record was never reachable.
            self.dense.pop();
            drop(self.pool.release(handle));
            tracing::warn!(
                fingerprint = fp,
                capacity = N,
                "collision bucket full, add rolled back"
            );
            return Err(MapError::IndexFull {
                fingerprint: fp,
                capacity: N,
            });
        }
        Ok(handle)
    }

    /// Position of `key` in the dense array.
    pub fn find_index<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_slot(self.fingerprint_of(key), key)
    }

    /// Value stored for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.value_at(self.find_index(key)?)
    }

    /// Mutable value stored for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find_index(key)?;
        self.value_at_mut(slot)
    }

    /// Stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_at(self.find_index(key)?)
    }

    /// Whether `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(key).is_some()
    }

    /// Overwrite the value of an existing key, returning the old value.
    pub fn change<Q>(&mut self, key: &Q, value: V) -> Result<V, MapError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let current = self.get_mut(key).ok_or(MapError::NotFound)?;
        Ok(mem::replace(current, value))
    }

    /// Overwrite the value if `key` is present, otherwise add it.
    ///
    /// Returns the previous value on overwrite.
    pub fn change_or_add(&mut self, key: K, value: V) -> Result<Option<V>, MapError> {
        match self.find_index(&key) {
            Some(slot) => {
                let current = self
                    .value_at_mut(slot)
                    .expect("index resolved to a position past the dense array");
                Ok(Some(mem::replace(current, value)))
            }
            None => self.add(key, value).map(|_| None),
        }
    }

    /// Remove the record at position `index`.
    ///
    /// If it is not the last record, the last record moves into `index`.
    pub fn delete_at(&mut self, index: usize) -> Option<(K, V)> {
        let last = self.dense.len().checked_sub(1)?;
        if index > last {
            return None;
        }

        let removed = self.dense[index];
        let removed_fp = self.fingerprint_of(&self.record_at(index).key);

        if index == last {
            let unindexed = self.index.remove(removed_fp, index);
            debug_assert!(unindexed, "slot {index} missing from index");
            self.dense.truncate(last);
        } else {
            let moved = self.dense[last];
            let moved_fp = self.fingerprint_of(&self.record_at(last).key);

            let unindexed = self.index.remove(removed_fp, index);
            debug_assert!(unindexed, "slot {index} missing from index");
            self.dense[index] = moved;
            let repointed = self.index.update(moved_fp, last, index);
            debug_assert!(repointed, "slot {last} missing from index");
            self.dense.truncate(last);
        }

        Some(self.pool.release(removed).into_parts())
    }

    /// Remove `key`, returning its value.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.delete_entry(key).map(|(_, v)| v)
    }

    /// Remove `key`, returning the stored key and value.
    pub fn delete_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find_index(key)?;
        self.delete_at(slot)
    }

    /// Remove the first record, in position order, whose value equals `value`.
    pub fn delete_by_value(&mut self, value: &V) -> Option<(K, V)>
    where
        V: PartialEq,
    {
        let pool = &self.pool;
        let slot = self
            .dense
            .iter()
            .position(|&handle| pool.get(handle).is_some_and(|r| r.value == *value))?;
        self.delete_at(slot)
    }

    /// Remove up to `count` records starting at position `start`, keeping the
    /// survivors in their relative order. Returns how many were removed.
    ///
    /// The index is rebuilt from scratch afterwards.
    pub fn delete_range(&mut self, start: usize, count: usize) -> usize {
        let len = self.dense.len();
        if start >= len || count == 0 {
            return 0;
        }
        let end = start.saturating_add(count).min(len);

        for handle in self.dense.drain(start..end) {
            drop(self.pool.release(handle));
        }
        self.rebuild_index();
        end - start
    }

    /// Re-derive every `(fingerprint, position)` pair from the dense array.
    ///
    /// The cumulative overflow count is preserved.
    pub fn rebuild_index(&mut self) {
        self.index.clear_entries();
        for slot in 0..self.dense.len() {
            let fp = self.fingerprint_of(&self.record_at(slot).key);
            let added = self.index.add(fp, slot);
            debug_assert!(added, "rebuild overflowed bucket for {fp:#018x}");
        }
        tracing::debug!(len = self.dense.len(), "rebuilt index");
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        self.index.assert_invariants();
        assert_eq!(
            self.index.len(),
            self.dense.len(),
            "index and dense array disagree on size"
        );
        assert_eq!(
            self.pool.outstanding(),
            self.dense.len(),
            "pool outstanding count must equal live count"
        );
        for slot in 0..self.dense.len() {
            let record = self.record_at(slot);
            let fp = self.fingerprint_of(&record.key);
            assert!(
                self.index.contains(fp, slot),
                "slot {slot} not indexed under its fingerprint"
            );
            assert_eq!(self.find_index(&record.key), Some(slot));
        }
    }
}

impl<K, V, const N: usize, S: Default> Default for UnorderedMap<K, V, N, S> {
    fn default() -> Self {
        Self::with_config_and_hasher(MapConfig::default(), S::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, const N: usize, S> fmt::Debug for UnorderedMap<K, V, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, const N: usize, S> IntoIterator for &'a UnorderedMap<K, V, N, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// Records in position order.
pub struct Iter<'a, K, V> {
    handles: slice::Iter<'a, RecordHandle>,
    pool: &'a RecordPool<K, V>,
}

impl<'a, K, V> Iter<'a, K, V> {
    #[inline]
    fn resolve(&self, handle: RecordHandle) -> (&'a K, &'a V) {
        let record = self
            .pool
            .get(handle)
            .expect("dense array references a released record");
        (&record.key, &record.value)
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = *self.handles.next()?;
        Some(self.resolve(handle))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.handles.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let handle = *self.handles.next_back()?;
        Some(self.resolve(handle))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
