//! Weighted edge sampling over a bipartite graph.
//!
//! Sampling an edge proportionally to its weight decomposes into two O(1)
//! alias draws:
//!
//! ```text
//! P(l, r) = w(l, r) / W
//!         = [w(l) / W] · [w(l, r) / w(l)]
//!            left draw    neighbor draw
//! ```
//!
//! where `w(l)` is the total incident weight of left vertex `l` and `W` the
//! grand total. One alias table covers the left vertices, and one per left
//! vertex covers its neighbors, so no merged edge list is ever materialized.
//!
//! The sampler also owns the graph's smoothed negative distribution over
//! right vertices (see [`NegativeDistribution`]).
//!
//! Sampling structures are immutable after construction and can be shared
//! across threads by reference. The only mutable state is a per-edge usage
//! counter kept for diagnostics; it uses relaxed atomics and never affects
//! which edges are drawn.

use super::negative::NegativeDistribution;
use crate::{BipartiteGraph, Error, Result};
use rand::Rng;
use rand_distr::weighted::WeightedAliasIndex;
use rand_distr::Distribution;
use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

/// O(1) edge and negative sampler for one relation graph.
///
/// # Example
///
/// ```rust
/// use emadr_core::{BipartiteGraph, EdgeSampler};
/// use rand::SeedableRng;
///
/// let graph = BipartiteGraph::from_adjacency(2, 2, vec![vec![(0, 3)], vec![(1, 1)]]).unwrap();
/// let sampler = EdgeSampler::new(graph).unwrap();
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(42);
/// let (left, right) = sampler.sample_edge(&mut rng);
/// assert!(left < 2 && right < 2);
/// ```
pub struct EdgeSampler {
    graph: BipartiteGraph,
    left: WeightedAliasIndex<u64>,
    /// `None` for left vertices with no positive-weight neighbor.
    neighbors: Vec<Option<WeightedAliasIndex<u64>>>,
    negatives: Arc<NegativeDistribution>,
    usage: Vec<AtomicU32>,
    total_weight: u64,
}

impl EdgeSampler {
    /// Build a sampler whose negatives follow the graph's own right-vertex
    /// weights (smoothed).
    pub fn new(graph: BipartiteGraph) -> Result<Self> {
        let negatives = NegativeDistribution::from_counts(&graph.right_weights())?;
        Self::with_negatives(graph, Arc::new(negatives))
    }

    /// Build a sampler with an externally supplied negative distribution
    /// (e.g. from a frequency file). Its id space must match the graph's
    /// right side.
    pub fn with_negatives(
        graph: BipartiteGraph,
        negatives: Arc<NegativeDistribution>,
    ) -> Result<Self> {
        if negatives.len() != graph.num_right() {
            return Err(Error::shape(
                "negative distribution size",
                graph.num_right(),
                negatives.len(),
            ));
        }

        let left_weights = graph.left_weights();
        let total_weight: u64 = left_weights.iter().sum();
        if total_weight == 0 {
            return Err(Error::EmptyDistribution(
                "edge sampler (graph has no weighted edges)".into(),
            ));
        }

        let left = WeightedAliasIndex::new(left_weights.clone())
            .map_err(|e| Error::Sampling(format!("left vertex table: {}", e)))?;

        let neighbors = (0..graph.num_left())
            .into_par_iter()
            .map(|l| {
                if left_weights[l] == 0 {
                    return Ok(None);
                }
                let weights: Vec<u64> = graph.weights(l).iter().map(|&w| u64::from(w)).collect();
                WeightedAliasIndex::new(weights)
                    .map(Some)
                    .map_err(|e| Error::Sampling(format!("left vertex {}: {}", l, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let usage = (0..graph.num_edges()).map(|_| AtomicU32::new(0)).collect();

        info!(
            left = graph.num_left(),
            right = graph.num_right(),
            edges = graph.num_edges(),
            total_weight,
            "edge sampler ready"
        );

        Ok(Self {
            graph,
            left,
            neighbors,
            negatives,
            usage,
            total_weight,
        })
    }

    /// Underlying graph.
    pub fn graph(&self) -> &BipartiteGraph {
        &self.graph
    }

    /// Number of left vertices.
    pub fn num_left(&self) -> usize {
        self.graph.num_left()
    }

    /// Number of right vertices.
    pub fn num_right(&self) -> usize {
        self.graph.num_right()
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Draw an edge with probability proportional to its weight.
    ///
    /// Left vertices with zero total weight are never returned.
    #[inline]
    pub fn sample_edge<R: Rng + ?Sized>(&self, rng: &mut R) -> (u32, u32) {
        let left = self.left.sample(rng);
        let table = self.neighbors[left]
            .as_ref()
            .unwrap_or_else(|| unreachable!("zero-weight left vertex has zero probability"));
        let k = table.sample(rng);
        self.record(left, k);
        (left as u32, self.graph.neighbors(left)[k])
    }

    /// Draw a neighbor of a given left vertex proportionally to edge weight.
    ///
    /// Returns [`Error::EmptyVertex`] if `left` has no positive-weight
    /// neighbor, and [`Error::InvalidGraph`] if it is out of range.
    pub fn sample_right<R: Rng + ?Sized>(&self, left: usize, rng: &mut R) -> Result<u32> {
        let table = self
            .neighbors
            .get(left)
            .ok_or_else(|| {
                Error::InvalidGraph(format!(
                    "left vertex {} out of range ({} vertices)",
                    left,
                    self.num_left()
                ))
            })?
            .as_ref()
            .ok_or(Error::EmptyVertex(left))?;
        let k = table.sample(rng);
        self.record(left, k);
        Ok(self.graph.neighbors(left)[k])
    }

    /// Draw a right vertex from the smoothed negative distribution.
    ///
    /// May coincide with the true target of the current edge.
    #[inline]
    pub fn sample_negative<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.negatives.sample(rng)
    }

    /// Shared handle to the negative distribution.
    pub fn negatives(&self) -> &Arc<NegativeDistribution> {
        &self.negatives
    }

    #[inline]
    fn record(&self, left: usize, k: usize) {
        self.usage[self.graph.edge_offset(left) + k].fetch_add(1, Ordering::Relaxed);
    }

    /// How many times edge `k` of `left` has been drawn.
    pub fn usage(&self, left: usize, k: usize) -> u32 {
        self.usage[self.graph.edge_offset(left) + k].load(Ordering::Relaxed)
    }

    /// Number of edges never drawn so far.
    pub fn unused_edges(&self) -> usize {
        self.usage
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) == 0)
            .count()
    }

    /// Zero all usage counters.
    pub fn reset_usage(&self) {
        for c in &self.usage {
            c.store(0, Ordering::Relaxed);
        }
    }
}

impl fmt::Debug for EdgeSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeSampler")
            .field("num_left", &self.num_left())
            .field("num_right", &self.num_right())
            .field("num_edges", &self.graph.num_edges())
            .field("total_weight", &self.total_weight)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    /// Left totals: [1, 2, 3, 0, 4]; vertex 3 has an edge but zero weight,
    /// vertex 5 has no edges at all.
    fn weighted_graph() -> BipartiteGraph {
        BipartiteGraph::from_adjacency(
            6,
            3,
            vec![
                vec![(0, 1)],
                vec![(1, 2)],
                vec![(0, 1), (2, 2)],
                vec![(1, 0)],
                vec![(0, 1), (1, 3)],
                vec![],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_left_share_chi_square() {
        let sampler = EdgeSampler::new(weighted_graph()).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(317);
        let n = 100_000usize;
        let mut counts = [0usize; 6];
        for _ in 0..n {
            let (l, _) = sampler.sample_edge(&mut rng);
            counts[l as usize] += 1;
        }

        assert_eq!(counts[3], 0);
        assert_eq!(counts[5], 0);

        let weights = [1.0, 2.0, 3.0, 0.0, 4.0, 0.0];
        let total: f64 = weights.iter().sum();
        let chi2: f64 = weights
            .iter()
            .zip(&counts)
            .filter(|(&w, _)| w > 0.0)
            .map(|(&w, &c)| {
                let expected = n as f64 * w / total;
                (c as f64 - expected).powi(2) / expected
            })
            .sum();
        // df = 3, p = 0.001 critical value is 16.27
        assert!(chi2 < 16.27, "chi-square {} too large: {:?}", chi2, counts);
    }

    #[test]
    fn test_neighbor_share() {
        let sampler = EdgeSampler::new(weighted_graph()).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(7);
        let n = 40_000;
        let mut hits_heavy = 0;
        for _ in 0..n {
            if sampler.sample_right(4, &mut rng).unwrap() == 1 {
                hits_heavy += 1;
            }
        }
        let observed = hits_heavy as f64 / n as f64;
        assert!((observed - 0.75).abs() < 0.01, "observed {}", observed);
    }

    #[test]
    fn test_sample_right_rejects_empty_vertices() {
        let sampler = EdgeSampler::new(weighted_graph()).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(1);
        assert!(matches!(sampler.sample_right(5, &mut rng), Err(Error::EmptyVertex(5))));
        assert!(matches!(sampler.sample_right(3, &mut rng), Err(Error::EmptyVertex(3))));
        assert!(matches!(sampler.sample_right(99, &mut rng), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_usage_counters() {
        let sampler = EdgeSampler::new(weighted_graph()).unwrap();
        assert_eq!(sampler.unused_edges(), 8);

        let mut rng = XorShiftRng::seed_from_u64(31);
        for _ in 0..1_000 {
            sampler.sample_edge(&mut rng);
        }
        // Only the zero-weight edge of vertex 3 stays unused.
        assert_eq!(sampler.unused_edges(), 1);
        assert_eq!(sampler.usage(3, 0), 0);
        assert!(sampler.usage(4, 1) > sampler.usage(4, 0));

        sampler.reset_usage();
        assert_eq!(sampler.unused_edges(), 8);
    }

    #[test]
    fn test_negatives_follow_right_weights() {
        // Right totals: [3, 5, 2]
        let sampler = EdgeSampler::new(weighted_graph()).unwrap();
        let mut rng = XorShiftRng::seed_from_u64(297);
        let mut counts = [0usize; 3];
        for _ in 0..30_000 {
            counts[sampler.sample_negative(&mut rng) as usize] += 1;
        }
        assert!(counts[1] > counts[0] && counts[0] > counts[2]);
    }

    #[test]
    fn test_empty_graph_rejected() {
        let graph = BipartiteGraph::from_adjacency(2, 2, vec![vec![(0, 0)], vec![]]).unwrap();
        assert!(EdgeSampler::new(graph).is_err());
    }

    #[test]
    fn test_negative_size_must_match() {
        let negatives = Arc::new(NegativeDistribution::from_counts(&[1, 1, 1, 1]).unwrap());
        let err = EdgeSampler::with_negatives(weighted_graph(), negatives).unwrap_err();
        assert!(matches!(err, Error::Shape { expected: 3, actual: 4, .. }));
    }
}
