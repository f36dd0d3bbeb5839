// Copyright (c) 2018 Aleksandr Bezobchuk
// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! Element hashing and probe index derivation.
//!
//! Filters whose slices hold at most `2^16` bits derive both double hashing
//! seeds from the two 16-bit halves of a single 32-bit hash. Larger slices
//! need two independent 32-bit hashes, computed over two differently-shaped
//! wrappings of the element.
use std::hash::{BuildHasher, Hash, Hasher};

use siphasher::sip::SipHasher13;

/// Largest slice bits exponent supported by 32-bit hashes.
pub const MAX_BITS_EXPONENT: u32 = 32;

/// Largest exponent for which a single hash is split in two.
const SPLIT_BITS_EXPONENT: u32 = 16;

/// Key used by the default SipHash builder.
const HASHER_KEY: [u8; 16] = [
    136, 168, 28, 251, 141, 239, 69, 38, 166, 209, 98, 201, 2, 169, 146, 170,
];

/// The default hash function: SipHash-1-3 with a fixed key, so that hashes
/// are stable across processes and persisted filters can be reloaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SipBuildHasher {
    key: [u8; 16],
}

impl SipBuildHasher {
    /// Create a builder keyed with a custom 128-bit key.
    pub fn with_key(key: [u8; 16]) -> Self {
        Self { key }
    }
}

impl Default for SipBuildHasher {
    fn default() -> Self {
        Self::with_key(HASHER_KEY)
    }
}

impl BuildHasher for SipBuildHasher {
    type Hasher = SipHasher13;

    fn build_hasher(&self) -> SipHasher13 {
        SipHasher13::new_with_key(&self.key)
    }
}

/// Base hashes of one element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Hashes {
    Single(u32),
    Pair(u32, u32),
}

impl Hashes {
    /// Hash `item` with enough bits for slices of `2^bits_exponent` bits.
    pub(crate) fn new<K: Hash + ?Sized, S: BuildHasher>(
        hasher: &S,
        bits_exponent: u32,
        item: &K,
    ) -> Self {
        let h0 = hash32(hasher, &(item,));

        if bits_exponent <= SPLIT_BITS_EXPONENT {
            Hashes::Single(h0)
        } else {
            Hashes::Pair(h0, hash32(hasher, &[item]))
        }
    }

    /// Derive the `(step, start)` double hashing seeds for slices of
    /// `mask + 1` bits.
    pub(crate) fn seeds(&self, mask: u64) -> (u64, u64) {
        match *self {
            Hashes::Pair(h0, h1) if mask > 1 << SPLIT_BITS_EXPONENT => {
                (h0 as u64 & mask, h1 as u64 & mask)
            }
            Hashes::Pair(h0, _) | Hashes::Single(h0) => {
                ((h0 as u64 >> 16) & mask, h0 as u64 & mask)
            }
        }
    }
}

/// Iterator over the probe indices of one element, one per slice.
pub(crate) struct Probes {
    index: u64,
    step: u64,
    mask: u64,
    remaining: usize,
}

impl Probes {
    pub(crate) fn new(hashes: &Hashes, bits_exponent: u32, count: usize) -> Self {
        let mask = (1u64 << bits_exponent) - 1;
        let (step, index) = hashes.seeds(mask);

        Self {
            index,
            step,
            mask,
            remaining: count,
        }
    }
}

impl Iterator for Probes {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.index;
        self.index = (self.index + self.step) & self.mask;
        self.remaining -= 1;

        Some(index as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Hash into the `[0, 2^32)` range.
fn hash32<T: Hash + ?Sized, S: BuildHasher>(hasher: &S, item: &T) -> u32 {
    let mut state = hasher.build_hasher();
    item.hash(&mut state);

    state.finish() as u32
}
