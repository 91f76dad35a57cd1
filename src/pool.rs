//! Record pool with slot recycling.
//!
//! Records live in a single slot vector. Released slots are threaded onto an
//! intrusive free list and handed out again by later acquires, so churn does
//! not reallocate:
//! - handles are 32-bit slot numbers, not pointers
//! - a handle stays valid until its record is released
//! - a released handle may be returned again by the next `acquire`

use std::fmt;
use std::mem;

/// A 32-bit slot number identifying a pooled record.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RecordHandle(u32);

impl RecordHandle {
    /// The null handle (refers to no record).
    pub const fn null() -> Self {
        Self(u32::MAX)
    }

    /// Check if this handle is null.
    pub fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    /// # Panics
    /// Panics if the slot number is >= 2^32 - 1.
    fn from_usize(slot: usize) -> Self {
        assert!(slot < u32::MAX as usize, "record pool exhausted");
        Self(slot as u32)
    }

    /// Get the slot number as usize.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("RecordHandle(null)")
        } else {
            write!(f, "RecordHandle({})", self.0)
        }
    }
}

/// A key/value pair owned by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<K, V> {
    pub key: K,
    pub value: V,
}

impl<K, V> Record<K, V> {
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

#[derive(Clone)]
enum Slot<K, V> {
    Live(Record<K, V>),
    /// Next free slot, or null at the end of the list.
    Free(RecordHandle),
}

/// Recycling allocator for [`Record`]s.
#[derive(Clone)]
pub struct RecordPool<K, V> {
    slots: Vec<Slot<K, V>>,
    free_head: RecordHandle,
    free_len: usize,
    acquired: u64,
    released: u64,
    recycled: u64,
}

impl<K, V> RecordPool<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: RecordHandle::null(),
            free_len: 0,
            acquired: 0,
            released: 0,
            recycled: 0,
        }
    }

    /// Store a record, reusing a released slot when one is available.
    pub fn acquire(&mut self, key: K, value: V) -> RecordHandle {
        let record = Record { key, value };
        self.acquired += 1;

        if self.free_head.is_null() {
            let handle = RecordHandle::from_usize(self.slots.len());
            self.slots.push(Slot::Live(record));
            return handle;
        }

        let handle = self.free_head;
        let slot = &mut self.slots[handle.as_usize()];
        let next = match mem::replace(slot, Slot::Live(record)) {
            Slot::Free(next) => next,
            Slot::Live(_) => panic!("free list points at live record {handle:?}"),
        };
        self.free_head = next;
        self.free_len -= 1;
        self.recycled += 1;
        tracing::trace!(slot = handle.as_usize(), "recycled pool slot");
        handle
    }

    /// Take a record out of the pool and put its slot on the free list.
    ///
    /// # Panics
    /// Panics if `handle` does not refer to a live record.
    pub fn release(&mut self, handle: RecordHandle) -> Record<K, V> {
        let Some(slot) = self.slots.get_mut(handle.as_usize()) else {
            panic!("released unknown record {handle:?}");
        };
        match mem::replace(slot, Slot::Free(self.free_head)) {
            Slot::Live(record) => {
                self.free_head = handle;
                self.free_len += 1;
                self.released += 1;
                record
            }
            Slot::Free(next) => {
                *slot = Slot::Free(next);
                panic!("released record {handle:?} twice");
            }
        }
    }

    pub fn get(&self, handle: RecordHandle) -> Option<&Record<K, V>> {
        match self.slots.get(handle.as_usize()) {
            Some(Slot::Live(record)) => Some(record),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: RecordHandle) -> Option<&mut Record<K, V>> {
        match self.slots.get_mut(handle.as_usize()) {
            Some(Slot::Live(record)) => Some(record),
            _ => None,
        }
    }

    /// Records acquired and not yet released.
    #[inline]
    pub fn outstanding(&self) -> usize {
        (self.acquired - self.released) as usize
    }

    #[inline]
    pub fn total_acquired(&self) -> u64 {
        self.acquired
    }

    #[inline]
    pub fn total_released(&self) -> u64 {
        self.released
    }

    /// Acquires that were served from the free list.
    #[inline]
    pub fn recycled(&self) -> u64 {
        self.recycled
    }

    /// Released slots waiting to be reused.
    #[inline]
    pub fn free_slots(&self) -> usize {
        self.free_len
    }

    /// Slots ever handed out (live plus free).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Release every record. Slot storage is kept for reuse.
    pub fn clear(&mut self) {
        self.released += self.outstanding() as u64;
        self.slots.clear();
        self.free_head = RecordHandle::null();
        self.free_len = 0;
    }

    /// Release every record and return the slot storage.
    pub fn free(&mut self) {
        self.clear();
        self.slots = Vec::new();
    }

    pub fn shrink_to_fit(&mut self) {
        if self.outstanding() == 0 {
            self.free();
        } else {
            self.slots.shrink_to_fit();
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.slots.capacity() * mem::size_of::<Slot<K, V>>()
    }
}

impl<K, V> Default for RecordPool<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for RecordPool<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordPool")
            .field("outstanding", &self.outstanding())
            .field("free_slots", &self.free_len)
            .field("capacity", &self.capacity())
            .finish()
    }
}
