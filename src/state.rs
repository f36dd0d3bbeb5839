// Copyright (c) 2022 Alexis Sellier
//
// Licensed under the MIT license.

//! Persisted filter state.
//!
//! These records hold everything needed to rebuild a filter except its hash
//! function, which must be supplied again when restoring. Any `serde` format
//! can be used to store them.
use serde::{Deserialize, Serialize};

/// State of a single, fixed-capacity Bloom filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BloomState {
    /// Target false positive probability.
    pub error_prob: f64,
    /// Number of items the filter holds within its error probability.
    pub max_capacity: usize,
    /// Each slice holds `2^slice_bits_exponent` bits.
    pub slice_bits_exponent: u32,
    /// Number of items added.
    pub size: usize,
    /// Raw words of each slice, in slice order.
    pub slices: Vec<Vec<u64>>,
}

/// State of a scalable Bloom filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalableState {
    /// Overall target false positive probability.
    pub error_prob: f64,
    /// Factor by which each new filter tightens its error probability.
    pub error_prob_ratio: f64,
    /// Slice bits exponent increment for each new filter.
    pub growth: u32,
    /// Number of items added, across the whole chain.
    pub size: usize,
    /// The chain of filters, newest first.
    pub filters: Vec<BloomState>,
}
