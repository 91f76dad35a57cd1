//! Errors surfaced by the map engine.

use std::fmt;

/// Why a map operation did not take effect.
///
/// Every variant is local and recoverable: the map is left exactly as it
/// was before the failing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// `add` was called for a key that is already present.
    DuplicateKey,

    /// The collision bucket for this key's fingerprint already holds
    /// `capacity` ids, so the key cannot be indexed.
    IndexFull {
        /// Fingerprint whose bucket overflowed.
        fingerprint: u64,
        /// Per-fingerprint bucket capacity of the index.
        capacity: usize,
    },

    /// The key is not present.
    NotFound,
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::DuplicateKey => write!(f, "key is already present"),
            MapError::IndexFull {
                fingerprint,
                capacity,
            } => write!(
                f,
                "collision bucket for fingerprint {fingerprint:#018x} is full ({capacity} ids)"
            ),
            MapError::NotFound => write!(f, "key not found"),
        }
    }
}

impl std::error::Error for MapError {}
