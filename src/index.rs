//! Fingerprint → slot-id index with bounded collision buckets.
//!
//! Each fingerprint maps to either a single slot-id (a *quick entry*) or an
//! inline bucket of 2..=N slot-ids (a *collision bucket*). The second id for a
//! fingerprint promotes its quick entry into a bucket; removing down to one id
//! demotes the bucket back. An (N+1)-th id is refused and counted as an
//! overflow.
//!
//! The index never compares keys. Lookups take a verification closure that
//! tells it whether a candidate slot really holds the key being searched for.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fmt;
use std::mem;

use nohash_hasher::BuildNoHashHasher;
use smallvec::SmallVec;

/// Position of a record in the dense array.
pub type SlotId = usize;

#[derive(Debug, Clone)]
enum Entry<const N: usize> {
    Quick(SlotId),
    /// Ids in insertion order. Never spills: capped at `N`.
    Bucket(SmallVec<[SlotId; N]>),
}

/// Snapshot of index statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    /// Fingerprints holding exactly one id.
    pub quick_entries: usize,
    /// Fingerprints holding a collision bucket.
    pub collision_buckets: usize,
    /// Ids stored across all collision buckets.
    pub bucketed_ids: usize,
    /// Adds refused because a bucket was full (cumulative).
    pub overflow_count: u64,
    /// `bucketed_ids / collision_buckets`, or 0 without buckets.
    pub average_chain_length: f64,
}

/// Many-ids-per-fingerprint index with per-fingerprint capacity `N`.
#[derive(Clone)]
pub struct HashIdMap<const N: usize> {
    entries: HashMap<u64, Entry<N>, BuildNoHashHasher<u64>>,
    quick_count: usize,
    bucket_count: usize,
    bucketed_ids: usize,
    overflow_count: u64,
}

impl<const N: usize> HashIdMap<N> {
    const VALID_CAPACITY: () = assert!(N >= 2, "collision buckets must hold at least 2 ids");

    /// Create an empty index.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an index with room for `capacity` fingerprints.
    pub fn with_capacity(capacity: usize) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;
        Self {
            entries: HashMap::with_capacity_and_hasher(capacity, BuildNoHashHasher::default()),
            quick_count: 0,
            bucket_count: 0,
            bucketed_ids: 0,
            overflow_count: 0,
        }
    }

    /// Associate `slot` with `fingerprint`.
    ///
    /// Returns `false` (and counts an overflow) if the fingerprint already
    /// holds `N` ids; the index is otherwise unchanged. Slot values are not
    /// deduplicated: callers must check key presence first.
    pub fn add(&mut self, fingerprint: u64, slot: SlotId) -> bool {
        let mut occupied = match self.entries.entry(fingerprint) {
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::Quick(slot));
                self.quick_count += 1;
                return true;
            }
            MapEntry::Occupied(occupied) => occupied,
        };

        let entry = occupied.get_mut();
        match *entry {
            Entry::Quick(first) => {
                let mut ids = SmallVec::new();
                ids.push(first);
                ids.push(slot);
                *entry = Entry::Bucket(ids);
                self.quick_count -= 1;
                self.bucket_count += 1;
                self.bucketed_ids += 2;
                tracing::debug!(fingerprint, "promoted quick entry to collision bucket");
                true
            }
            Entry::Bucket(ref mut ids) if ids.len() < N => {
                ids.push(slot);
                self.bucketed_ids += 1;
                true
            }
            Entry::Bucket(_) => {
                self.overflow_count += 1;
                tracing::debug!(fingerprint, capacity = N, "collision bucket overflow");
                false
            }
        }
    }

    /// Return the first id under `fingerprint`, in insertion order, for which
    /// `verify` holds.
    pub fn find<F>(&self, fingerprint: u64, mut verify: F) -> Option<SlotId>
    where
        F: FnMut(SlotId) -> bool,
    {
        match self.entries.get(&fingerprint)? {
            Entry::Quick(id) => verify(*id).then_some(*id),
            Entry::Bucket(ids) => ids.iter().copied().find(|&id| verify(id)),
        }
    }

    /// Drop the association between `fingerprint` and `slot`.
    ///
    /// A bucket left with a single id is demoted back to a quick entry.
    /// Returns `false` if the pair was not recorded.
    pub fn remove(&mut self, fingerprint: u64, slot: SlotId) -> bool {
        let MapEntry::Occupied(mut occupied) = self.entries.entry(fingerprint) else {
            return false;
        };

        match *occupied.get_mut() {
            Entry::Quick(id) => {
                if id != slot {
                    return false;
                }
                occupied.remove();
                self.quick_count -= 1;
            }
            Entry::Bucket(ref mut ids) => {
                let Some(pos) = ids.iter().position(|&id| id == slot) else {
                    return false;
                };
                ids.remove(pos);
                self.bucketed_ids -= 1;
                if ids.len() == 1 {
                    let survivor = ids[0];
                    *occupied.get_mut() = Entry::Quick(survivor);
                    self.bucket_count -= 1;
                    self.bucketed_ids -= 1;
                    self.quick_count += 1;
                    tracing::debug!(fingerprint, "demoted collision bucket to quick entry");
                }
            }
        }
        true
    }

    /// Rewrite `old` to `new` under `fingerprint`, keeping the entry's shape
    /// and the id's position within its bucket.
    ///
    /// Asking to update an id that is not recorded is a bookkeeping bug in
    /// the caller: it asserts in debug builds and returns `false` otherwise.
    pub fn update(&mut self, fingerprint: u64, old: SlotId, new: SlotId) -> bool {
        let found = match self.entries.get_mut(&fingerprint) {
            Some(Entry::Quick(id)) if *id == old => {
                *id = new;
                true
            }
            Some(Entry::Bucket(ids)) => match ids.iter_mut().find(|id| **id == old) {
                Some(id) => {
                    *id = new;
                    true
                }
                None => false,
            },
            _ => false,
        };
        debug_assert!(
            found,
            "update of unrecorded slot {old} under fingerprint {fingerprint:#018x}"
        );
        found
    }

    /// Remove everything and reset every counter.
    pub fn clear(&mut self) {
        self.clear_entries();
        self.overflow_count = 0;
    }

    /// Remove everything but keep the cumulative overflow count.
    pub(crate) fn clear_entries(&mut self) {
        self.entries.clear();
        self.quick_count = 0;
        self.bucket_count = 0;
        self.bucketed_ids = 0;
    }

    /// Whether no fingerprint holds an id.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total ids stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.quick_count + self.bucketed_ids
    }

    /// Number of ids currently stored under `fingerprint`.
    pub fn ids_for(&self, fingerprint: u64) -> usize {
        match self.entries.get(&fingerprint) {
            None => 0,
            Some(Entry::Quick(_)) => 1,
            Some(Entry::Bucket(ids)) => ids.len(),
        }
    }

    /// Whether `slot` is recorded under `fingerprint`.
    pub fn contains(&self, fingerprint: u64, slot: SlotId) -> bool {
        match self.entries.get(&fingerprint) {
            None => false,
            Some(Entry::Quick(id)) => *id == slot,
            Some(Entry::Bucket(ids)) => ids.contains(&slot),
        }
    }

    /// Maximum ids one fingerprint can hold (`N`).
    #[inline]
    pub const fn capacity_per_fingerprint(&self) -> usize {
        N
    }

    /// Fingerprints holding exactly one id.
    #[inline]
    pub fn quick_map_count(&self) -> usize {
        self.quick_count
    }

    /// Fingerprints holding a collision bucket.
    #[inline]
    pub fn collision_count(&self) -> usize {
        self.bucket_count
    }

    /// Adds refused because a bucket was full, since creation or the last
    /// [`clear`](Self::clear).
    #[inline]
    pub fn collision_overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// Mean ids per collision bucket, or 0 without buckets.
    pub fn average_collision_chain_length(&self) -> f64 {
        if self.bucket_count == 0 {
            0.0
        } else {
            self.bucketed_ids as f64 / self.bucket_count as f64
        }
    }

    /// Reserved id slots relative to `expected_total_count` records.
    ///
    /// A quick entry reserves one slot. A bucket reserves its `N` id slots
    /// plus one for its length, so with no collisions and
    /// `expected_total_count` equal to the number of records this is exactly
    /// 1.0, and any bucket pushes it above even when full.
    pub fn load_factor(&self, expected_total_count: usize) -> f64 {
        if expected_total_count == 0 {
            return 0.0;
        }
        let reserved = self.quick_count + self.bucket_count * (N + 1);
        reserved as f64 / expected_total_count as f64
    }

    /// Snapshot of every counter.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            quick_entries: self.quick_count,
            collision_buckets: self.bucket_count,
            bucketed_ids: self.bucketed_ids,
            overflow_count: self.overflow_count,
            average_chain_length: self.average_collision_chain_length(),
        }
    }

    /// Release spare table capacity.
    pub fn shrink_to_fit(&mut self) {
        self.entries.shrink_to_fit();
    }

    /// Approximate heap bytes held by the index.
    pub fn memory_usage(&self) -> usize {
        // One control byte per table slot.
        self.entries.capacity() * (mem::size_of::<(u64, Entry<N>)>() + 1)
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let mut quick = 0usize;
        let mut buckets = 0usize;
        let mut bucketed = 0usize;
        for (fingerprint, entry) in &self.entries {
            match entry {
                Entry::Quick(_) => quick += 1,
                Entry::Bucket(ids) => {
                    assert!(
                        (2..=N).contains(&ids.len()),
                        "bucket for {fingerprint:#x} holds {} ids",
                        ids.len()
                    );
                    assert!(!ids.spilled(), "bucket for {fingerprint:#x} spilled");
                    buckets += 1;
                    bucketed += ids.len();
                }
            }
        }
        assert_eq!(quick, self.quick_count, "quick entry count drifted");
        assert_eq!(buckets, self.bucket_count, "bucket count drifted");
        assert_eq!(bucketed, self.bucketed_ids, "bucketed id count drifted");
    }
}

impl<const N: usize> Default for HashIdMap<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for HashIdMap<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashIdMap")
            .field("capacity_per_fingerprint", &N)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u64 = 0xdead_beef;

    #[test]
    fn test_quick_entry() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        assert!(idx.is_empty());
        assert!(idx.add(H, 7));
        assert_eq!(idx.quick_map_count(), 1);
        assert_eq!(idx.collision_count(), 0);
        assert_eq!(idx.find(H, |_| true), Some(7));
        assert_eq!(idx.find(H + 1, |_| true), None);
        idx.assert_invariants();
    }

    #[test]
    fn test_quick_entry_rejected_by_verify() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        idx.add(H, 7);
        let mut calls = 0;
        assert_eq!(
            idx.find(H, |_| {
                calls += 1;
                false
            }),
            None
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_fill_bucket_then_overflow() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        for id in 0..4 {
            assert!(idx.add(H, id));
        }
        assert_eq!(idx.collision_count(), 1);
        assert_eq!(idx.quick_map_count(), 0);
        assert_eq!(idx.average_collision_chain_length(), 4.0);

        assert!(!idx.add(H, 4));
        assert_eq!(idx.collision_overflow_count(), 1);
        assert_eq!(idx.ids_for(H), 4);
        assert!(!idx.contains(H, 4));
        assert_eq!(idx.len(), 4);
        idx.assert_invariants();
    }

    #[test]
    fn test_bucket_scan_order() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        for id in [10, 20, 30] {
            idx.add(H, id);
        }
        let mut seen = Vec::new();
        let hit = idx.find(H, |id| {
            seen.push(id);
            id >= 20
        });
        assert_eq!(hit, Some(20));
        assert_eq!(seen, vec![10, 20]);
        assert_eq!(idx.find(H, |_| false), None);
    }

    #[test]
    fn test_remove_quick() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        idx.add(H, 1);
        assert!(!idx.remove(H, 2));
        assert!(!idx.remove(H + 1, 1));
        assert!(idx.remove(H, 1));
        assert!(idx.is_empty());
        assert_eq!(idx.quick_map_count(), 0);
    }

    #[test]
    fn test_remove_demotes_two_element_bucket() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        idx.add(H, 1);
        idx.add(H, 2);
        assert_eq!(idx.collision_count(), 1);

        assert!(idx.remove(H, 1));
        assert_eq!(idx.collision_count(), 0);
        assert_eq!(idx.quick_map_count(), 1);
        assert_eq!(idx.find(H, |_| true), Some(2));
        assert_eq!(idx.average_collision_chain_length(), 0.0);
        idx.assert_invariants();

        // Re-adding promotes again.
        idx.add(H, 3);
        assert_eq!(idx.collision_count(), 1);
        idx.assert_invariants();
    }

    #[test]
    fn test_remove_keeps_bucket_order() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        for id in [1, 2, 3, 4] {
            idx.add(H, id);
        }
        assert!(idx.remove(H, 2));
        assert!(!idx.remove(H, 2));
        let mut seen = Vec::new();
        idx.find(H, |id| {
            seen.push(id);
            false
        });
        assert_eq!(seen, vec![1, 3, 4]);
    }

    #[test]
    fn test_capacity_reclaimed_after_remove() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        for id in 0..4 {
            idx.add(H, id);
        }
        assert!(idx.remove(H, 1));
        assert_eq!(idx.ids_for(H), 3);
        assert!(idx.add(H, 4));
        assert_eq!(idx.ids_for(H), 4);
        assert_eq!(idx.collision_overflow_count(), 0);
        idx.assert_invariants();
    }

    #[test]
    fn test_update() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        idx.add(H, 5);
        assert!(idx.update(H, 5, 0));
        assert!(idx.contains(H, 0));
        assert!(!idx.contains(H, 5));

        idx.add(H + 1, 1);
        idx.add(H + 1, 9);
        idx.add(H + 1, 3);
        assert!(idx.update(H + 1, 9, 2));
        let mut seen = Vec::new();
        idx.find(H + 1, |id| {
            seen.push(id);
            false
        });
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(idx.collision_count(), 1);
        idx.assert_invariants();
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "unrecorded slot"))]
    fn test_update_unrecorded() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        idx.add(H, 5);
        assert!(!idx.update(H, 6, 0));
        assert!(idx.contains(H, 5));
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut idx: HashIdMap<2> = HashIdMap::new();
        idx.add(H, 0);
        idx.add(H, 1);
        assert!(!idx.add(H, 2));
        idx.add(1, 3);

        idx.clear_entries();
        assert!(idx.is_empty());
        assert_eq!(idx.collision_overflow_count(), 1);

        idx.add(H, 0);
        idx.clear();
        assert!(idx.is_empty());
        assert_eq!(idx.stats(), IndexStats::default());
    }

    fn ten_quick_then_four_way<const N: usize>() -> HashIdMap<N> {
        let mut idx: HashIdMap<N> = HashIdMap::new();
        assert_eq!(idx.load_factor(0), 0.0);
        for fp in 0..10u64 {
            idx.add(fp, fp as usize);
        }
        assert_eq!(idx.load_factor(10), 1.0);

        for id in 10..14 {
            assert!(idx.add(100, id));
        }
        assert_eq!(idx.collision_overflow_count(), 0);
        idx
    }

    #[test]
    fn test_load_factor() {
        let idx = ten_quick_then_four_way::<8>();
        assert_eq!(idx.load_factor(14), 19.0 / 14.0);
    }

    #[test]
    fn test_load_factor_full_bucket() {
        // The four-way bucket is exactly at capacity.
        let idx = ten_quick_then_four_way::<4>();
        assert!(idx.load_factor(14) > 1.0);
        assert_eq!(idx.load_factor(14), 15.0 / 14.0);
    }

    #[test]
    fn test_stats() {
        let mut idx: HashIdMap<4> = HashIdMap::new();
        idx.add(1, 0);
        idx.add(2, 1);
        idx.add(2, 2);
        idx.add(3, 3);
        idx.add(3, 4);
        idx.add(3, 5);
        let stats = idx.stats();
        assert_eq!(stats.quick_entries, 1);
        assert_eq!(stats.collision_buckets, 2);
        assert_eq!(stats.bucketed_ids, 5);
        assert_eq!(stats.average_chain_length, 2.5);
        assert_eq!(idx.len(), 6);
        assert_eq!(idx.capacity_per_fingerprint(), 4);
    }
}
