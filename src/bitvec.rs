// Copyright (c) 2020 Helge Wrede, Alexander Schultheiß, Lukas Simon
// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! Bit vector functionality.
use std::fmt::Debug;

use crate::error::{Error, Result};

/// Number of bits held by one storage word.
const WORD_BITS: usize = u64::BITS as usize;

/// A packed bit vector of fixed length.
///
/// Accessing a bit past the end of the vector panics with an
/// "index out of bounds" message; filters only ever pass masked indices,
/// which are always in range.
#[derive(Clone, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u64>,
    nbits: usize,
}

impl BitVec {
    /// Create a new, zeroed bit vector of the given length, in bits.
    pub fn new(nbits: usize) -> Result<Self> {
        if nbits == 0 {
            return Err(Error::InvalidSize);
        }
        Ok(Self::zeroed(nbits))
    }

    /// Create a zeroed bit vector of a length already known to be non-zero.
    pub(crate) fn zeroed(nbits: usize) -> Self {
        debug_assert!(nbits > 0);

        Self {
            words: vec![0; word_count(nbits)],
            nbits,
        }
    }

    /// Rebuild a bit vector of `nbits` bits from its raw storage words.
    ///
    /// The word count must match the length exactly, and no bit past the
    /// end of the vector may be set.
    pub fn from_words(nbits: usize, words: Vec<u64>) -> Result<Self> {
        if nbits == 0 {
            return Err(Error::InvalidSize);
        }
        if words.len() != word_count(nbits) {
            return Err(Error::malformed(format!(
                "expected {} words for {} bits, got {}",
                word_count(nbits),
                nbits,
                words.len()
            )));
        }
        let tail = nbits % WORD_BITS;
        if tail != 0 && words[words.len() - 1] >> tail != 0 {
            return Err(Error::malformed(format!(
                "bits set past the end of a {} bit vector",
                nbits
            )));
        }
        Ok(Self { words, nbits })
    }

    /// Get the length in bits of the vector.
    pub fn len(&self) -> usize {
        self.nbits
    }

    /// Check whether this vector is empty, ie. has a length of zero.
    /// Always `false` for vectors built through [`BitVec::new`].
    pub fn is_empty(&self) -> bool {
        self.nbits == 0
    }

    /// Set a single bit to `1`. Setting a bit twice has no further effect.
    pub fn set(&mut self, index: usize) {
        self.check(index);
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    /// Check whether a bit is set.
    pub fn is_set(&self, index: usize) -> bool {
        self.check(index);
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Count the number of `1` bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Return the underlying word storage.
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    fn check(&self, index: usize) {
        if index >= self.len() {
            panic!(
                "index out of bounds: the len is {} but the index is {}",
                self.len(),
                index,
            )
        }
    }
}

fn word_count(nbits: usize) -> usize {
    (nbits + WORD_BITS - 1) / WORD_BITS
}

impl From<BitVec> for Vec<u64> {
    fn from(other: BitVec) -> Vec<u64> {
        other.words
    }
}

impl Debug for BitVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nbits > 256 {
            return write!(f, "BitVec({} bits, {} set)", self.nbits, self.count_ones());
        }
        let bits: String = (0..self.nbits)
            .map(|i| if self.is_set(i) { '1' } else { '0' })
            .collect();
        write!(f, "BitVec({})", bits)
    }
}
