// Copyright (c) 2018 Aleksandr Bezobchuk
// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! A fixed-capacity, partitioned Bloom filter using enhanced double hashing.

use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use crate::bitvec::BitVec;
use crate::error::{Error, Result};
use crate::hash::{Hashes, Probes, SipBuildHasher, MAX_BITS_EXPONENT};
use crate::state::BloomState;
use crate::Filter;

/// The default false positive probability value, 0.1%.
pub const DEFAULT_ERROR_PROBABILITY: f64 = 0.001;

/// A Bloom filter with a fixed capacity that keeps track of items of type `K`.
///
/// The filter is split into `k` slices of `2^mb` bits each, and every item
/// sets exactly one bit per slice.
#[derive(Clone, Debug)]
pub struct BloomFilter<K, S = SipBuildHasher> {
    error_prob: f64,
    max_capacity: usize,
    bits_exponent: u32,
    size: usize,
    slices: Vec<BitVec>,
    hasher: S,
    key: PhantomData<K>,
}

impl<K: Hash> BloomFilter<K> {
    /// Return a new Bloom filter holding at least `capacity` items.
    /// The false positive probability is [`DEFAULT_ERROR_PROBABILITY`].
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_error(capacity, DEFAULT_ERROR_PROBABILITY)
    }

    /// Return a new Bloom filter with a given item capacity and a
    /// desired false positive probability.
    pub fn with_error(capacity: usize, error_prob: f64) -> Result<Self> {
        Self::with_hasher(capacity, error_prob, SipBuildHasher::default())
    }
}

impl<K: Hash, S: BuildHasher> BloomFilter<K, S> {
    /// Return a new Bloom filter with a given item capacity, false positive
    /// probability and hash function.
    ///
    /// The capacity must be at least `4 / error_prob`, so that double hashing
    /// has enough room to spread items.
    pub fn with_hasher(capacity: usize, error_prob: f64, hasher: S) -> Result<Self> {
        check_error_prob(error_prob)?;
        if capacity == 0 {
            return Err(Error::invalid("capacity must be positive"));
        }
        if (capacity as f64) < 4. / error_prob {
            return Err(Error::invalid(format!(
                "capacity {} is below 4 / {}",
                capacity, error_prob
            )));
        }
        let exponent = optimal_bits_exponent(capacity, error_prob);
        if exponent > MAX_BITS_EXPONENT as f64 {
            return Err(Error::invalid(format!(
                "capacity {} at error {} needs slices larger than 2^{} bits",
                capacity, error_prob, MAX_BITS_EXPONENT
            )));
        }

        Self::with_bits_exponent(exponent as u32, error_prob, hasher)
    }

    /// Return a new Bloom filter whose slices hold `2^bits_exponent` bits each.
    /// The capacity is whatever that slice size supports at `error_prob`.
    pub fn with_bits_exponent(bits_exponent: u32, error_prob: f64, hasher: S) -> Result<Self> {
        check_error_prob(error_prob)?;
        check_bits_exponent(bits_exponent).map_err(Error::InvalidParameters)?;

        Ok(Self::sized(bits_exponent, error_prob, hasher))
    }

    /// Build a filter from parameters already known to be in range.
    pub(crate) fn sized(bits_exponent: u32, error_prob: f64, hasher: S) -> Self {
        let nslices = optimal_slices(error_prob);
        let max_capacity = optimal_capacity(bits_exponent, error_prob);
        let slices = (0..nslices)
            .map(|_| BitVec::zeroed(1 << bits_exponent))
            .collect();

        log::debug!(
            "bloom filter: error={} slices={} slice_bits=2^{} capacity={}",
            error_prob,
            nslices,
            bits_exponent,
            max_capacity
        );

        Self {
            error_prob,
            max_capacity,
            bits_exponent,
            size: 0,
            slices,
            hasher,
            key: PhantomData,
        }
    }

    /// Rebuild a filter from its persisted state. `hasher` must be the hash
    /// function the filter was originally built with, otherwise membership
    /// answers are meaningless.
    pub fn from_state(state: BloomState, hasher: S) -> Result<Self> {
        if !(state.error_prob > 0. && state.error_prob < 1.) {
            return Err(Error::malformed(format!(
                "error probability {} is outside (0, 1)",
                state.error_prob
            )));
        }
        check_bits_exponent(state.slice_bits_exponent).map_err(Error::MalformedState)?;
        if state.max_capacity == 0 {
            return Err(Error::malformed("max capacity must be positive"));
        }
        let nslices = optimal_slices(state.error_prob);
        if state.slices.len() != nslices {
            return Err(Error::malformed(format!(
                "expected {} slices, got {}",
                nslices,
                state.slices.len()
            )));
        }
        let nbits = 1 << state.slice_bits_exponent;
        let slices = state
            .slices
            .into_iter()
            .map(|words| BitVec::from_words(nbits, words))
            .collect::<Result<Vec<_>>>()?;

        log::trace!(
            "bloom filter restored: size={} slice_bits=2^{}",
            state.size,
            state.slice_bits_exponent
        );

        Ok(Self {
            error_prob: state.error_prob,
            max_capacity: state.max_capacity,
            bits_exponent: state.slice_bits_exponent,
            size: state.size,
            slices,
            hasher,
            key: PhantomData,
        })
    }

    /// Set an item in the Bloom filter. Return `true` if the item was added,
    /// or `false` if it was already (possibly falsely) reported as present,
    /// in which case the filter is left untouched.
    pub fn insert(&mut self, item: &K) -> bool {
        let hashes = Hashes::new(&self.hasher, self.bits_exponent, item);
        self.insert_hashes(&hashes)
    }

    /// Return whether or not a given item is likely in the Bloom filter or not. There is a
    /// possibility for a false positive with the probability being under the Bloom filter's `p`
    /// value, but a false negative will never occur.
    pub fn contains(&self, item: &K) -> bool {
        let hashes = Hashes::new(&self.hasher, self.bits_exponent, item);
        self.contains_hashes(&hashes)
    }
}

impl<K, S> BloomFilter<K, S> {
    /// Number of items added to the filter.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check whether no item was ever added.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of items the filter holds while honoring its error probability.
    /// This may be slightly above the capacity the filter was requested with.
    pub fn capacity(&self) -> usize {
        self.max_capacity
    }

    /// Target false positive probability.
    pub fn error_prob(&self) -> f64 {
        self.error_prob
    }

    /// Each slice holds `2^bits_exponent` bits.
    pub fn bits_exponent(&self) -> u32 {
        self.bits_exponent
    }

    /// Number of slices used (`k` parameter).
    pub fn slices(&self) -> usize {
        self.slices.len()
    }

    /// Return the number of bits in this filter, across all slices.
    pub fn bits(&self) -> usize {
        self.slices.iter().map(BitVec::len).sum()
    }

    /// Check whether the filter has reached its capacity.
    pub fn is_full(&self) -> bool {
        self.size >= self.max_capacity
    }

    /// Return the hash function of this filter.
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Capture the filter's state for persistence. The hash function is not
    /// part of the state.
    pub fn to_state(&self) -> BloomState {
        BloomState {
            error_prob: self.error_prob,
            max_capacity: self.max_capacity,
            slice_bits_exponent: self.bits_exponent,
            size: self.size,
            slices: self
                .slices
                .iter()
                .map(|slice| slice.as_words().to_vec())
                .collect(),
        }
    }

    pub(crate) fn contains_hashes(&self, hashes: &Hashes) -> bool {
        Probes::new(hashes, self.bits_exponent, self.slices.len())
            .zip(self.slices.iter())
            .all(|(index, slice)| slice.is_set(index))
    }

    pub(crate) fn insert_hashes(&mut self, hashes: &Hashes) -> bool {
        if self.contains_hashes(hashes) {
            return false;
        }
        let probes = Probes::new(hashes, self.bits_exponent, self.slices.len());
        for (index, slice) in probes.zip(self.slices.iter_mut()) {
            slice.set(index);
        }
        self.size += 1;

        true
    }
}

impl<K: Hash, S: BuildHasher> Filter<K> for BloomFilter<K, S> {
    fn contains(&self, item: &K) -> bool {
        BloomFilter::contains(self, item)
    }

    fn insert(&mut self, item: &K) -> bool {
        BloomFilter::insert(self, item)
    }

    fn len(&self) -> usize {
        BloomFilter::len(self)
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.max_capacity)
    }
}

/// Return the number of slices (`k`) needed for a false positive probability.
pub fn optimal_slices(error_prob: f64) -> usize {
    1 + (1. / error_prob).log2().floor() as usize
}

/// Return the slice bits exponent for which a filter reaches `error_prob` after
/// `capacity` items.
fn optimal_bits_exponent(capacity: usize, error_prob: f64) -> f64 {
    let p = slice_error_prob(error_prob);

    1. + (-(1. - (1. - p).powf(1. / capacity as f64)).log2()).floor()
}

/// Return the number of items a filter with slices of `2^bits_exponent` bits
/// holds before exceeding `error_prob`.
pub fn optimal_capacity(bits_exponent: u32, error_prob: f64) -> usize {
    let p = slice_error_prob(error_prob);
    let m = (1u64 << bits_exponent) as f64;

    ((1. - p).ln() / (1. - 1. / m).ln()).floor() as usize
}

/// The error probability is spread evenly over the slices.
fn slice_error_prob(error_prob: f64) -> f64 {
    error_prob.powf(1. / optimal_slices(error_prob) as f64)
}

fn check_error_prob(error_prob: f64) -> Result<()> {
    if error_prob > 0. && error_prob < 1. {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "error probability {} is outside (0, 1)",
            error_prob
        )))
    }
}

fn check_bits_exponent(bits_exponent: u32) -> std::result::Result<(), String> {
    if (1..=MAX_BITS_EXPONENT).contains(&bits_exponent) {
        Ok(())
    } else {
        Err(format!(
            "bits exponent {} is outside 1..={}",
            bits_exponent, MAX_BITS_EXPONENT
        ))
    }
}
