//! Pair fingerprints.
//!
//! A fingerprint is a 64-bit FNV-1a hash over the identity fields of two
//! records. It is a deduplication key only; collisions are not mitigated.

use crate::collector::headers::IdentityIndices;
use crate::collector::types::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::Hasher;

/// FNV-1a 64-bit offset basis.
pub const FNV1A64_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64-bit prime.
pub const FNV1A64_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Streaming FNV-1a 64-bit hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64(u64);

impl Fnv1a64 {
    pub fn new() -> Self {
        Self(FNV1A64_OFFSET)
    }
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Fnv1a64 {
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(FNV1A64_PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// How pair fingerprints are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMode {
    /// Hash the pair in discovery order. Deduplication checks both orders.
    #[default]
    Ordered,
    /// Put the pair in a canonical order first. One lookup suffices.
    Canonical,
}

impl FingerprintMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "ordered" => Some(FingerprintMode::Ordered),
            "canonical" => Some(FingerprintMode::Canonical),
            _ => None,
        }
    }
}

/// Fingerprint of `(rec1, rec2)`: the identity fields of `rec1` in position
/// order, then those of `rec2`.
///
/// Not symmetric: `pair_fingerprint(a, b, ..)` and `pair_fingerprint(b, a, ..)`
/// differ in general. `None` if either record lacks an identity field.
pub fn pair_fingerprint(rec1: &Record, rec2: &Record, indices: &IdentityIndices) -> Option<u64> {
    let mut hasher = Fnv1a64::new();
    for record in [rec1, rec2] {
        for index in indices.positions() {
            hasher.write(record.field(index)?.as_bytes());
        }
    }
    Some(hasher.finish())
}

/// Order `rec1` and `rec2` by their identity fields, falling back to the full
/// field list so that only identical records compare equal.
pub fn canonical_order<'a>(
    rec1: &'a Record,
    rec2: &'a Record,
    indices: &IdentityIndices,
) -> (&'a Record, &'a Record) {
    let identity = |r: &'a Record| indices.positions().map(|i| r.field(i).unwrap_or_default());
    let ordering = identity(rec1)
        .cmp(&identity(rec2))
        .then_with(|| rec1.fields().cmp(rec2.fields()));
    match ordering {
        Ordering::Greater => (rec2, rec1),
        _ => (rec1, rec2),
    }
}

/// Order-independent fingerprint: `canonical_fingerprint(a, b) ==
/// canonical_fingerprint(b, a)`.
pub fn canonical_fingerprint(
    rec1: &Record,
    rec2: &Record,
    indices: &IdentityIndices,
) -> Option<u64> {
    let (first, second) = canonical_order(rec1, rec2, indices);
    pair_fingerprint(first, second, indices)
}
