//! A scalable Bloom filter, a space-efficient probabilistic data structure
//! that keeps its false positive probability bounded no matter how many
//! items are added.
//!
//! # Bloom Filters
//!
//! A Bloom filter is a space-efficient probabilistic data structure that is
//! used to test whether an element is a member of a set. It allows for queries
//! to return: "possibly in set" or "definitely not in set". Elements can be
//! added to the set, but not removed; the more elements that are added to the
//! set, the larger the probability of false positives.
//!
//! A [`BloomFilter`] is sized upfront for a given capacity and false positive
//! probability. Its bits are split into `k` equally sized slices, and every
//! item sets one bit in each slice.
//!
//! # Scalable Bloom Filters
//!
//! A [`ScalableBloomFilter`] does not need to know its capacity in advance.
//! It chains fixed-capacity filters: once the newest filter is full, a larger
//! one with a tighter false positive probability is started. The error
//! probabilities of the chain form a geometric series bounded by the
//! configured probability, as described by Almeida, Baquero, Preguiça and
//! Hutchison in *Scalable Bloom Filters*.
//!
//! # Enhanced Double Hashing
//!
//! Probe positions are derived from at most two base hashes, as shown to be
//! effective by Adam Kirsch and Michael Mitzenmacher in *Less Hashing, Same
//! Performance: Building a Better Bloom Filter*. The index into slice `i` is
//!
//! g<sub>i</sub>(x) = (H<sub>0</sub>(x) + iH<sub>1</sub>(x)) mod m
//!
//! The default hash function is SipHash-1-3 with a fixed key. Any
//! [`std::hash::BuildHasher`] can be supplied instead; it is not part of a
//! filter's persisted state and must be supplied again when restoring one.
//!
//! # Example
//!
//! ```
//! use sbloomy::ScalableBloomFilter;
//!
//! let capacity = 10_000;
//! let mut filter = ScalableBloomFilter::with_error(capacity, 0.01).unwrap();
//!
//! filter.insert(&"foo");
//! filter.insert(&"bar");
//!
//! assert!(filter.contains(&"foo"));
//! assert!(filter.contains(&"bar"));
//! filter.contains(&"baz"); // false, most likely
//!
//! assert_eq!(filter.len(), 2);
//! ```
#![warn(missing_docs)]
#![allow(clippy::bool_assert_comparison)]

pub mod bitvec;
pub mod bloom;
pub mod error;
pub mod hash;
pub mod scalable;
pub mod state;

pub use bloom::{BloomFilter, DEFAULT_ERROR_PROBABILITY};
pub use error::{Error, Result};
pub use hash::SipBuildHasher;
pub use scalable::{Config, Growth, ScalableBloomFilter};
pub use state::{BloomState, ScalableState};

/// Operations shared by fixed-capacity and scalable filters.
pub trait Filter<K> {
    /// Check whether an item was possibly added. Never a false negative.
    fn contains(&self, item: &K) -> bool;

    /// Add an item. Return `false`, leaving the filter untouched, if the
    /// item was already reported as present.
    fn insert(&mut self, item: &K) -> bool;

    /// Number of items added.
    fn len(&self) -> usize;

    /// Check whether no item was ever added.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of items the filter holds within its false positive
    /// probability, or `None` if it is unbounded.
    fn capacity(&self) -> Option<usize>;
}
