//! Smoothed negative-sampling distribution.
//!
//! Negative samples are drawn from a unigram distribution raised to the 3/4
//! power (Mikolov et al. 2013). The exponent sits between the raw frequency
//! distribution (over-samples hubs) and the uniform one (over-samples rare
//! ids):
//!
//! ```text
//! P(i) = count(i)^0.75 / Σⱼ count(j)^0.75
//! ```
//!
//! Draws are O(1) through an alias table. Ids with a zero count have zero
//! probability and are never returned.

use crate::{Error, Result};
use rand::Rng;
use rand_distr::weighted::WeightedAliasIndex;
use rand_distr::Distribution;
use std::fmt;

/// Exponent applied to raw counts before sampling negatives.
pub const SMOOTHING_POWER: f64 = 0.75;

/// Immutable O(1) sampler over a smoothed count distribution.
pub struct NegativeDistribution {
    index: WeightedAliasIndex<f64>,
    len: usize,
}

impl NegativeDistribution {
    /// Build from raw counts with the standard 0.75 smoothing.
    pub fn from_counts(counts: &[u64]) -> Result<Self> {
        Self::with_power(counts, SMOOTHING_POWER)
    }

    /// Build from raw counts with a custom smoothing exponent.
    pub fn with_power(counts: &[u64], power: f64) -> Result<Self> {
        if !power.is_finite() || power < 0.0 {
            return Err(Error::Sampling(format!("invalid smoothing power {}", power)));
        }

        let weights: Vec<f64> = counts
            .iter()
            .map(|&c| if c == 0 { 0.0 } else { (c as f64).powf(power) })
            .collect();
        if weights.iter().all(|&w| w == 0.0) {
            return Err(Error::EmptyDistribution("negative-sampling counts".into()));
        }

        let len = weights.len();
        let index = WeightedAliasIndex::new(weights).map_err(|e| Error::Sampling(e.to_string()))?;
        Ok(Self { index, len })
    }

    /// Draw one id.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.index.sample(rng) as u32
    }

    /// Size of the id space (including zero-probability ids).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the id space is empty (never true for a constructed sampler).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for NegativeDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegativeDistribution")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}
