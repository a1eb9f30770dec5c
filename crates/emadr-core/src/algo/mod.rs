//! Sampling structures.
//!
//! - [`sampling`]: O(1) weighted edge sampler for one relation graph
//! - [`negative`]: smoothed unigram distribution for negative sampling

pub mod negative;
pub mod sampling;

pub use negative::{NegativeDistribution, SMOOTHING_POWER};
pub use sampling::EdgeSampler;
