//! # hashid-map
//!
//! A dense, pool-backed unordered map indexed by 64-bit key fingerprints.
//!
//! ## Architecture
//!
//! 1. **Record pool**: key/value records live in a recycling slot arena;
//!    released slots are reused by later inserts.
//! 2. **Dense array**: handles to live records, packed at positions
//!    `0..len`. Deleting from the middle moves the last record into the hole.
//! 3. **Hash index** ([`HashIdMap`]): fingerprint → position, with a quick
//!    entry for the common single-key case and a fixed-capacity inline bucket
//!    of up to `N` positions for fingerprints shared by several keys.
//!
//! Fingerprints can collide, so every lookup confirms the stored key. A
//! fingerprint shared by more than `N` keys cannot be indexed; `add` reports
//! [`MapError::IndexFull`] and leaves the map unchanged.
//!
//! ## Example
//!
//! ```rust
//! use hashid_map::UnorderedMap;
//!
//! let mut map: UnorderedMap<String, u32> = UnorderedMap::new();
//! map.add("alpha".to_string(), 1).unwrap();
//! map.add("beta".to_string(), 2).unwrap();
//! assert!(map.add("alpha".to_string(), 3).is_err());
//!
//! assert_eq!(map.get("alpha"), Some(&1));
//! assert_eq!(map.delete("alpha"), Some(1));
//! assert_eq!(map.find_index("beta"), Some(0));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod fingerprint;
pub mod index;
pub mod managed_map;
pub mod map;
pub mod pool;
pub mod value_map;

pub use error::MapError;
pub use fingerprint::{fingerprint, FingerprintBuilder};
pub use index::{HashIdMap, IndexStats, SlotId};
pub use managed_map::UnorderedManagedMap;
pub use map::{UnorderedMap, DEFAULT_BUCKET_CAPACITY};
pub use pool::{Record, RecordHandle, RecordPool};
pub use value_map::UnorderedValueMap;

/// Construction-time settings for the map types.
///
/// The collision bucket capacity is not here: it is the const parameter `N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapConfig {
    /// Records to reserve room for in the dense array, pool and index.
    pub initial_capacity: usize,
    /// Make `clear` also return backing storage, like `free`.
    pub shrink_on_clear: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 0,
            shrink_on_clear: false,
        }
    }
}

#[cfg(test)]
mod proptests;
