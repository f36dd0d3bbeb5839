// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! A scalable Bloom filter.
//!
//! The filter starts out as a single fixed-capacity [`BloomFilter`]. When
//! that filter is full, a new one with larger slices and a tighter error
//! probability is started, and so on. Lookups check every filter in the
//! chain. The `i`-th filter (counting from zero) targets an error
//! probability of `e * (1 - r) * r^i`, so the compounded false positive
//! probability of the chain never exceeds `e`.
use std::hash::{BuildHasher, Hash};
use std::iter;

use serde::{Deserialize, Serialize};

use crate::bloom::{BloomFilter, DEFAULT_ERROR_PROBABILITY};
use crate::error::{Error, Result};
use crate::hash::{Hashes, SipBuildHasher, MAX_BITS_EXPONENT};
use crate::state::ScalableState;
use crate::Filter;

/// How fast the slices of each new filter grow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Growth {
    /// Slices double in size.
    #[default]
    Slow = 1,
    /// Slices grow four times larger.
    Medium = 2,
    /// Slices grow eight times larger.
    Fast = 3,
}

impl Growth {
    /// Increment applied to the slice bits exponent of each new filter.
    pub fn exponent(self) -> u32 {
        self as u32
    }

    /// Error probability ratio that pairs well with this growth rate.
    pub fn default_ratio(self) -> f64 {
        match self {
            Growth::Slow => 0.85,
            Growth::Medium => 0.75,
            Growth::Fast => 0.65,
        }
    }
}

impl TryFrom<u32> for Growth {
    type Error = Error;

    fn try_from(exponent: u32) -> Result<Self> {
        match exponent {
            1 => Ok(Growth::Slow),
            2 => Ok(Growth::Medium),
            3 => Ok(Growth::Fast),
            _ => Err(Error::invalid(format!(
                "growth must be 1, 2 or 3, got {}",
                exponent
            ))),
        }
    }
}

/// Parameters of a scalable Bloom filter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Capacity of the first filter in the chain.
    pub capacity: usize,
    /// Overall target false positive probability.
    pub error_prob: f64,
    /// Factor by which each new filter tightens its error probability.
    pub error_prob_ratio: f64,
    /// Growth rate of the slices of each new filter.
    pub growth: Growth,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Config {
    /// Default parameters with the given initial capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            error_prob: DEFAULT_ERROR_PROBABILITY,
            error_prob_ratio: Growth::default().default_ratio(),
            growth: Growth::default(),
        }
    }

    /// Set the overall false positive probability.
    pub fn error_prob(mut self, error_prob: f64) -> Self {
        self.error_prob = error_prob;
        self
    }

    /// Set the growth rate, along with its default error probability ratio.
    pub fn growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self.error_prob_ratio = growth.default_ratio();
        self
    }

    /// Set the error probability ratio.
    pub fn error_prob_ratio(mut self, error_prob_ratio: f64) -> Self {
        self.error_prob_ratio = error_prob_ratio;
        self
    }

    /// Check that the parameters describe a usable filter.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid("capacity must be positive"));
        }
        if !(self.error_prob > 0. && self.error_prob < 1.) {
            return Err(Error::invalid(format!(
                "error probability {} is outside (0, 1)",
                self.error_prob
            )));
        }
        if !(self.error_prob_ratio > 0. && self.error_prob_ratio < 1.) {
            return Err(Error::invalid(format!(
                "error probability ratio {} is outside (0, 1)",
                self.error_prob_ratio
            )));
        }
        if (self.capacity as f64) < 4. / self.initial_error_prob() {
            return Err(Error::invalid(format!(
                "capacity {} is below 4 / {}",
                self.capacity,
                self.initial_error_prob()
            )));
        }
        Ok(())
    }

    fn initial_error_prob(&self) -> f64 {
        self.error_prob * (1. - self.error_prob_ratio)
    }
}

/// A Bloom filter that grows to accommodate any number of items of type `K`,
/// while keeping its false positive probability below a fixed bound.
#[derive(Clone, Debug)]
pub struct ScalableBloomFilter<K, S = SipBuildHasher> {
    error_prob: f64,
    error_prob_ratio: f64,
    growth: Growth,
    size: usize,
    /// The newest, largest filter. New items go here.
    head: BloomFilter<K, S>,
    /// Older, full filters, oldest first.
    history: Vec<BloomFilter<K, S>>,
    hasher: S,
}

impl<K: Hash> ScalableBloomFilter<K> {
    /// Return a new scalable Bloom filter with a given initial capacity.
    /// The false positive probability is [`DEFAULT_ERROR_PROBABILITY`].
    pub fn new(capacity: usize) -> Result<Self> {
        Self::from_config(Config::new(capacity))
    }

    /// Return a new scalable Bloom filter with a given initial capacity and
    /// overall false positive probability.
    pub fn with_error(capacity: usize, error_prob: f64) -> Result<Self> {
        Self::from_config(Config::new(capacity).error_prob(error_prob))
    }

    /// Return a new scalable Bloom filter with a given initial capacity,
    /// overall false positive probability and growth rate.
    pub fn with_growth(capacity: usize, error_prob: f64, growth: Growth) -> Result<Self> {
        Self::from_config(Config::new(capacity).error_prob(error_prob).growth(growth))
    }

    /// Return a new scalable Bloom filter from a configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        Self::from_config_with_hasher(config, SipBuildHasher::default())
    }
}

impl<K: Hash, S: BuildHasher + Clone> ScalableBloomFilter<K, S> {
    /// Return a new scalable Bloom filter with every parameter given.
    pub fn with_hasher(
        capacity: usize,
        error_prob: f64,
        error_prob_ratio: f64,
        growth: Growth,
        hasher: S,
    ) -> Result<Self> {
        let config = Config {
            capacity,
            error_prob,
            error_prob_ratio,
            growth,
        };
        Self::from_config_with_hasher(config, hasher)
    }

    /// Return a new scalable Bloom filter from a configuration and a hash function.
    pub fn from_config_with_hasher(config: Config, hasher: S) -> Result<Self> {
        config.validate()?;

        let head = BloomFilter::with_hasher(
            config.capacity,
            config.initial_error_prob(),
            hasher.clone(),
        )?;

        Ok(Self {
            error_prob: config.error_prob,
            error_prob_ratio: config.error_prob_ratio,
            growth: config.growth,
            size: 0,
            head,
            history: Vec::new(),
            hasher,
        })
    }

    /// Rebuild a filter from its persisted state. `hasher` must be the hash
    /// function the filter was originally built with.
    pub fn from_state(state: ScalableState, hasher: S) -> Result<Self> {
        if !(state.error_prob > 0. && state.error_prob < 1.) {
            return Err(Error::malformed(format!(
                "error probability {} is outside (0, 1)",
                state.error_prob
            )));
        }
        if !(state.error_prob_ratio > 0. && state.error_prob_ratio < 1.) {
            return Err(Error::malformed(format!(
                "error probability ratio {} is outside (0, 1)",
                state.error_prob_ratio
            )));
        }
        let growth = Growth::try_from(state.growth)
            .map_err(|_| Error::malformed(format!("unknown growth {}", state.growth)))?;

        let total = state
            .filters
            .iter()
            .try_fold(0usize, |total, f| total.checked_add(f.size))
            .ok_or_else(|| Error::malformed("sizes overflow"))?;
        if total != state.size {
            return Err(Error::malformed(format!(
                "size {} does not match the {} items held by the filters",
                state.size, total
            )));
        }
        let mut filters = state
            .filters
            .into_iter()
            .map(|f| BloomFilter::from_state(f, hasher.clone()))
            .collect::<Result<Vec<_>>>()?;
        if filters.is_empty() {
            return Err(Error::malformed("a scalable filter needs at least one filter"));
        }
        // Lookups hash with the head's exponent, so the head must be the
        // largest and tightest filter.
        for pair in filters.windows(2) {
            let (newer, older) = (&pair[0], &pair[1]);
            if newer.bits_exponent() < older.bits_exponent()
                || newer.error_prob() > older.error_prob()
            {
                return Err(Error::malformed("filters are not stored newest first"));
            }
        }
        let head = filters.remove(0);
        filters.reverse();

        log::trace!(
            "scalable filter restored: size={} filters={}",
            state.size,
            filters.len() + 1
        );

        Ok(Self {
            error_prob: state.error_prob,
            error_prob_ratio: state.error_prob_ratio,
            growth,
            size: state.size,
            head,
            history: filters,
            hasher,
        })
    }

    /// Set an item in the filter. Return `true` if the item was added, or
    /// `false` if some filter in the chain already reported it as present.
    pub fn insert(&mut self, item: &K) -> bool {
        let hashes = Hashes::new(&self.hasher, self.head.bits_exponent(), item);
        if self.contains_hashes(&hashes) {
            return false;
        }
        if self.head.is_full() {
            self.grow();
            // The new head may need more hash bits than the old one.
            self.head.insert(item);
        } else {
            self.head.insert_hashes(&hashes);
        }
        self.size += 1;

        true
    }

    /// Return whether or not a given item is likely in the filter or not.
    /// False negatives never occur.
    pub fn contains(&self, item: &K) -> bool {
        let hashes = Hashes::new(&self.hasher, self.head.bits_exponent(), item);
        self.contains_hashes(&hashes)
    }

    fn grow(&mut self) {
        let bits_exponent =
            (self.head.bits_exponent() + self.growth.exponent()).min(MAX_BITS_EXPONENT);
        // Stays positive after any realistic number of growths.
        let error_prob = (self.head.error_prob() * self.error_prob_ratio).max(f64::MIN_POSITIVE);
        let head = BloomFilter::sized(bits_exponent, error_prob, self.hasher.clone());

        self.history.push(std::mem::replace(&mut self.head, head));

        log::debug!(
            "scalable filter grown: filters={} slice_bits=2^{} error={} size={}",
            self.history.len() + 1,
            bits_exponent,
            error_prob,
            self.size
        );
    }
}

impl<K, S> ScalableBloomFilter<K, S> {
    /// Number of items added, across all filters.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Check whether no item was ever added.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Overall target false positive probability.
    pub fn error_prob(&self) -> f64 {
        self.error_prob
    }

    /// Factor by which each new filter tightens its error probability.
    pub fn error_prob_ratio(&self) -> f64 {
        self.error_prob_ratio
    }

    /// Growth rate of the slices of each new filter.
    pub fn growth(&self) -> Growth {
        self.growth
    }

    /// Number of filters in the chain.
    pub fn filter_count(&self) -> usize {
        self.history.len() + 1
    }

    /// Iterate over the filters of the chain, newest first.
    pub fn filters(&self) -> impl Iterator<Item = &BloomFilter<K, S>> + '_ {
        iter::once(&self.head).chain(self.history.iter().rev())
    }

    /// Return the number of bits used by all filters.
    pub fn bits(&self) -> usize {
        self.filters().map(BloomFilter::bits).sum()
    }

    /// Capture the filter's state for persistence. The hash function is not
    /// part of the state.
    pub fn to_state(&self) -> ScalableState {
        ScalableState {
            error_prob: self.error_prob,
            error_prob_ratio: self.error_prob_ratio,
            growth: self.growth.exponent(),
            size: self.size,
            filters: self.filters().map(BloomFilter::to_state).collect(),
        }
    }

    fn contains_hashes(&self, hashes: &Hashes) -> bool {
        self.filters().any(|filter| filter.contains_hashes(hashes))
    }
}

impl<K: Hash, S: BuildHasher + Clone> Filter<K> for ScalableBloomFilter<K, S> {
    fn contains(&self, item: &K) -> bool {
        ScalableBloomFilter::contains(self, item)
    }

    fn insert(&mut self, item: &K) -> bool {
        ScalableBloomFilter::insert(self, item)
    }

    fn len(&self) -> usize {
        ScalableBloomFilter::len(self)
    }

    fn capacity(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(config: Config, n: u64) -> ScalableBloomFilter<u64> {
        let mut sbf = ScalableBloomFilter::from_config(config).unwrap();
        for i in 1..=n {
            sbf.insert(&i);
        }
        sbf
    }

    #[test]
    fn test_chain_growth() {
        let config = Config::new(100)
            .error_prob(0.1)
            .growth(Growth::Fast)
            .error_prob_ratio(0.1);
        let sbf = filled(config, 90_000);

        assert!(sbf.contains(&1));
        // Roughly one insertion in ten is a false positive of an earlier,
        // full filter and is skipped.
        assert_eq!(sbf.len(), 79_641);
        assert_eq!(sbf.filter_count(), 5);
        assert_eq!(sbf.filters().map(BloomFilter::len).sum::<usize>(), sbf.len());
        for filter in sbf.filters().skip(1) {
            assert!(filter.is_full());
        }
    }

    #[test]
    fn test_bulk_insertion() {
        let config = Config::new(6000)
            .error_prob(0.001)
            .growth(Growth::Fast)
            .error_prob_ratio(0.001);
        let sbf = filled(config, 10_000);

        assert_eq!(sbf.len(), 9_998);
        assert_eq!(sbf.filter_count(), 1);
    }

    #[test]
    fn test_no_false_negatives() {
        let mut sbf = ScalableBloomFilter::<u64>::with_growth(200, 0.1, Growth::Medium).unwrap();

        for i in 0..5000 {
            sbf.insert(&i);
            assert!(sbf.contains(&i), "item {} resulted in a false negative", i);
        }
        for i in 0..5000 {
            assert!(sbf.contains(&i), "item {} resulted in a false negative", i);
        }
        assert!(sbf.filter_count() > 1);
    }

    #[test]
    fn test_size_tracks_new_items() {
        let mut sbf = ScalableBloomFilter::<u64>::with_error(1000, 0.05).unwrap();

        for i in 0..3000 {
            let present = sbf.contains(&i);
            let len = sbf.len();

            assert_eq!(sbf.insert(&i), !present);
            assert_eq!(sbf.len(), if present { len } else { len + 1 });
        }
        // Re-inserting anything is a no-op.
        let before = sbf.to_state();
        for i in 0..3000 {
            assert!(!sbf.insert(&i));
        }
        assert_eq!(sbf.to_state(), before);
    }

    #[test]
    fn test_error_budget() {
        let config = Config::new(2000).error_prob(0.01).growth(Growth::Medium);
        let sbf = filled(config, 50_000);
        let e = config.error_prob;
        let r = config.error_prob_ratio;

        assert!(sbf.filter_count() > 2);

        let chain: Vec<_> = sbf.filters().collect();
        let mut total = 0.;
        for (i, filter) in chain.iter().rev().enumerate() {
            let expected = e * (1. - r) * r.powi(i as i32);

            assert!((filter.error_prob() - expected).abs() < 1e-12 * e);
            total += filter.error_prob();
        }
        assert!(total < e);

        for pair in chain.windows(2) {
            assert_eq!(
                pair[0].bits_exponent(),
                pair[1].bits_exponent() + Growth::Medium.exponent()
            );
        }
    }

    #[test]
    fn test_false_positive_rate() {
        let error_prob = 0.01;
        let sbf = filled(Config::new(4000).error_prob(error_prob), 50_000);

        let samples = 100_000;
        let false_positives = (100_000..100_000 + samples)
            .filter(|i| sbf.contains(i))
            .count();
        let rate = false_positives as f64 / samples as f64;

        assert!(rate < 2. * error_prob, "false positive rate {} is too high", rate);
    }

    #[test]
    fn test_clone_is_a_snapshot() {
        let mut sbf = ScalableBloomFilter::<u64>::with_error(1000, 0.1).unwrap();
        sbf.insert(&1);

        let before = sbf.clone();
        for i in 2..10_000 {
            sbf.insert(&i);
        }
        assert!(sbf.filter_count() > 1);
        assert_eq!(before.filter_count(), 1);
        assert_eq!(before.len(), 1);
        assert!(before.contains(&1));
        assert!(!before.contains(&2));
    }

    #[test]
    fn test_invalid_parameters() {
        let hasher = SipBuildHasher::default();
        let cases = [
            (0, 0.1, 0.5),
            (1000, 0., 0.5),
            (1000, 1., 0.5),
            (1000, 0.1, 0.),
            (1000, 0.1, 1.),
            // 4 / (0.1 * 0.5) = 80
            (79, 0.1, 0.5),
        ];
        for (capacity, error_prob, ratio) in cases {
            assert!(
                matches!(
                    ScalableBloomFilter::<u64>::with_hasher(
                        capacity,
                        error_prob,
                        ratio,
                        Growth::Slow,
                        hasher
                    ),
                    Err(Error::InvalidParameters(_))
                ),
                "({}, {}, {}) should be rejected",
                capacity,
                error_prob,
                ratio
            );
        }
        assert!(
            ScalableBloomFilter::<u64>::with_hasher(80, 0.1, 0.5, Growth::Slow, hasher).is_ok()
        );
    }

    #[test]
    fn test_growth() {
        assert_eq!(Growth::try_from(1u32), Ok(Growth::Slow));
        assert_eq!(Growth::try_from(2u32), Ok(Growth::Medium));
        assert_eq!(Growth::try_from(3u32), Ok(Growth::Fast));
        assert!(matches!(
            Growth::try_from(0u32),
            Err(Error::InvalidParameters(_))
        ));
        assert!(matches!(
            Growth::try_from(4u32),
            Err(Error::InvalidParameters(_))
        ));
        assert_eq!(Growth::Medium.default_ratio(), 0.75);
    }

    #[test]
    fn test_config() {
        let config = Config::default();
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.error_prob, DEFAULT_ERROR_PROBABILITY);
        assert_eq!(config.growth, Growth::Slow);
        assert_eq!(config.error_prob_ratio, 0.85);

        let config = Config::new(10_000).growth(Growth::Fast);
        assert_eq!(config.error_prob_ratio, 0.65);
        let config = config.error_prob_ratio(0.5);
        assert_eq!(config.growth, Growth::Fast);
        assert_eq!(config.error_prob_ratio, 0.5);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<Config>(&json).unwrap(), config);

        let sbf = ScalableBloomFilter::<u64>::from_config(config).unwrap();
        assert_eq!(sbf.growth(), Growth::Fast);
        assert_eq!(sbf.error_prob_ratio(), 0.5);
        assert_eq!(sbf.error_prob(), DEFAULT_ERROR_PROBABILITY);
    }

    #[test]
    fn test_filter_trait() {
        fn fill<F: Filter<u64>>(filter: &mut F, n: u64) -> usize {
            (0..n).filter(|i| filter.insert(i)).count()
        }
        let mut plain = BloomFilter::<u64>::with_error(1000, 0.01).unwrap();
        let mut scalable = ScalableBloomFilter::<u64>::with_error(5000, 0.01).unwrap();

        assert_eq!(fill(&mut plain, 500), Filter::len(&plain));
        assert_eq!(fill(&mut scalable, 20_000), Filter::len(&scalable));
        assert_eq!(Filter::capacity(&plain), Some(plain.capacity()));
        assert_eq!(Filter::capacity(&scalable), None);
        assert!(!Filter::is_empty(&scalable));
    }

    #[test]
    fn test_state_roundtrip() {
        let config = Config::new(100)
            .error_prob(0.1)
            .growth(Growth::Medium)
            .error_prob_ratio(0.5);
        let sbf = filled(config, 5000);
        assert!(sbf.filter_count() > 1);

        let json = serde_json::to_string(&sbf.to_state()).unwrap();
        let state: ScalableState = serde_json::from_str(&json).unwrap();
        assert_eq!(state.filters.len(), sbf.filter_count());
        assert_eq!(state.filters[0], sbf.filters().next().unwrap().to_state());

        let mut restored =
            ScalableBloomFilter::<u64>::from_state(state, SipBuildHasher::default()).unwrap();
        assert_eq!(restored.to_state(), sbf.to_state());
        for i in 1..=5000 {
            assert!(restored.contains(&i));
        }

        // The restored filter keeps growing like the original.
        let mut original = sbf.clone();
        for i in 5001..=20_000 {
            assert_eq!(restored.insert(&i), original.insert(&i));
        }
        assert_eq!(restored.to_state(), original.to_state());
    }

    #[test]
    fn test_malformed_state() {
        let sbf = filled(Config::new(100).error_prob(0.1).error_prob_ratio(0.5), 1000);
        let hasher = SipBuildHasher::default();
        let restore = |state| ScalableBloomFilter::<u64>::from_state(state, hasher);

        let mut state = sbf.to_state();
        state.filters.clear();
        state.size = 0;
        assert!(matches!(restore(state), Err(Error::MalformedState(_))));

        let mut state = sbf.to_state();
        state.size += 1;
        assert!(matches!(restore(state), Err(Error::MalformedState(_))));

        let mut state = sbf.to_state();
        state.growth = 4;
        assert!(matches!(restore(state), Err(Error::MalformedState(_))));

        let mut state = sbf.to_state();
        state.error_prob_ratio = 1.;
        assert!(matches!(restore(state), Err(Error::MalformedState(_))));

        let mut state = sbf.to_state();
        state.filters[0].slices[0].pop();
        assert!(matches!(restore(state), Err(Error::MalformedState(_))));

        let mut state = sbf.to_state();
        state.filters[0].size = usize::MAX;
        state.filters[1].size = 2;
        state.size = 1;
        assert!(matches!(restore(state), Err(Error::MalformedState(_))));
    }

    #[test]
    fn test_reversed_chain_is_rejected() {
        let config = Config::new(10_000)
            .error_prob(0.001)
            .growth(Growth::Fast)
            .error_prob_ratio(0.5);
        let sbf = filled(config, 50_000);
        assert!(sbf.filter_count() > 1);

        let mut state = sbf.to_state();
        state.filters.reverse();

        assert!(matches!(
            ScalableBloomFilter::<u64>::from_state(state, SipBuildHasher::default()),
            Err(Error::MalformedState(_))
        ));
    }
}
