//! 64-bit key fingerprints.
//!
//! A fingerprint is a non-cryptographic hash of a key. Distinct keys may
//! share one, so nothing in this crate treats fingerprint equality as key
//! equality: every lookup verifies the candidate key.

use std::hash::{BuildHasher, BuildHasherDefault, Hash};

use twox_hash::XxHash64;

/// Default fingerprint function: XXH64 with seed 0.
///
/// Deterministic across runs and processes, unlike `RandomState`.
pub type FingerprintBuilder = BuildHasherDefault<XxHash64>;

/// Fingerprint `key` with `builder`.
#[inline]
pub fn fingerprint<S, Q>(builder: &S, key: &Q) -> u64
where
    S: BuildHasher,
    Q: Hash + ?Sized,
{
    builder.hash_one(key)
}
