//! Weighted bipartite relation graphs.
//!
//! Every relation the trainer learns from (entity↔entity, document↔entity,
//! document↔word) is stored the same way: a left id space, a right id space,
//! and for each left vertex a list of `(right_id, weight)` pairs. The
//! entity↔entity graph is simply a bipartite graph whose two sides are the
//! same id space.
//!
//! Adjacency is kept in compressed form (offsets / targets / weights) so that
//! edge `k` of left vertex `i` has a stable flat index `offsets[i] + k`, which
//! the edge sampler uses for its usage counters.

use crate::{Error, Result};

/// Summary statistics for a [`BipartiteGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    /// Number of left vertices.
    pub num_left: usize,
    /// Number of right vertices.
    pub num_right: usize,
    /// Number of stored edges.
    pub num_edges: usize,
    /// Sum of all edge weights.
    pub total_weight: u64,
    /// Left vertices with zero total weight (never sampled as a source).
    pub isolated_left: usize,
    /// Right vertices with zero total weight (never drawn as a negative).
    pub isolated_right: usize,
    /// Largest left degree.
    pub max_degree: usize,
}

/// A weighted bipartite graph in compressed adjacency form.
///
/// # Example
///
/// ```rust
/// use emadr_core::BipartiteGraph;
///
/// let graph = BipartiteGraph::from_adjacency(
///     2,
///     3,
///     vec![vec![(0, 1), (2, 4)], vec![(1, 2)]],
/// )
/// .unwrap();
///
/// assert_eq!(graph.total_weight(), 7);
/// assert_eq!(graph.left_weight(0), 5);
/// assert_eq!(graph.right_weights(), vec![1, 2, 4]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BipartiteGraph {
    num_left: usize,
    num_right: usize,
    /// `offsets[i]..offsets[i + 1]` indexes the edges of left vertex `i`.
    offsets: Vec<usize>,
    targets: Vec<u32>,
    weights: Vec<u16>,
}

impl BipartiteGraph {
    /// Build a graph from per-left-vertex adjacency lists.
    ///
    /// `adjacency.len()` must equal `num_left` and every right id must be
    /// below `num_right`.
    pub fn from_adjacency(
        num_left: usize,
        num_right: usize,
        adjacency: Vec<Vec<(u32, u16)>>,
    ) -> Result<Self> {
        if adjacency.len() != num_left {
            return Err(Error::InvalidGraph(format!(
                "expected {} adjacency lists, got {}",
                num_left,
                adjacency.len()
            )));
        }

        let num_edges = adjacency.iter().map(Vec::len).sum();
        let mut builder = GraphBuilder::with_capacity(num_left, num_right, num_edges);
        for (left, list) in adjacency.into_iter().enumerate() {
            let (targets, weights): (Vec<u32>, Vec<u16>) = list.into_iter().unzip();
            builder.push_vertex(left, &targets, &weights)?;
        }
        builder.finish()
    }

    /// Number of left vertices.
    pub fn num_left(&self) -> usize {
        self.num_left
    }

    /// Number of right vertices.
    pub fn num_right(&self) -> usize {
        self.num_right
    }

    /// Number of stored edges.
    pub fn num_edges(&self) -> usize {
        self.targets.len()
    }

    /// Number of neighbors of left vertex `left`.
    pub fn degree(&self, left: usize) -> usize {
        self.offsets[left + 1] - self.offsets[left]
    }

    /// Right ids adjacent to `left`.
    pub fn neighbors(&self, left: usize) -> &[u32] {
        &self.targets[self.offsets[left]..self.offsets[left + 1]]
    }

    /// Edge weights of `left`, parallel to [`Self::neighbors`].
    pub fn weights(&self, left: usize) -> &[u16] {
        &self.weights[self.offsets[left]..self.offsets[left + 1]]
    }

    /// Flat index of the first edge of `left`.
    pub fn edge_offset(&self, left: usize) -> usize {
        self.offsets[left]
    }

    /// Total incident weight of a left vertex.
    pub fn left_weight(&self, left: usize) -> u64 {
        self.weights(left).iter().map(|&w| u64::from(w)).sum()
    }

    /// Total incident weight of every left vertex.
    pub fn left_weights(&self) -> Vec<u64> {
        (0..self.num_left).map(|i| self.left_weight(i)).collect()
    }

    /// Total incident weight of every right vertex.
    pub fn right_weights(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.num_right];
        for (&r, &w) in self.targets.iter().zip(&self.weights) {
            sums[r as usize] += u64::from(w);
        }
        sums
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> u64 {
        self.weights.iter().map(|&w| u64::from(w)).sum()
    }

    /// Iterate `(left, right, weight)` over every edge.
    pub fn edges(&self) -> impl Iterator<Item = (usize, u32, u16)> + '_ {
        (0..self.num_left).flat_map(move |l| {
            self.neighbors(l)
                .iter()
                .zip(self.weights(l))
                .map(move |(&r, &w)| (l, r, w))
        })
    }

    /// Compute summary statistics.
    pub fn stats(&self) -> GraphStats {
        let left = self.left_weights();
        let right = self.right_weights();
        GraphStats {
            num_left: self.num_left,
            num_right: self.num_right,
            num_edges: self.num_edges(),
            total_weight: left.iter().sum(),
            isolated_left: left.iter().filter(|&&w| w == 0).count(),
            isolated_right: right.iter().filter(|&&w| w == 0).count(),
            max_degree: (0..self.num_left).map(|i| self.degree(i)).max().unwrap_or(0),
        }
    }
}

/// Incremental builder used by the adjacency reader.
///
/// Vertices must be pushed in order `0..num_left`.
#[derive(Debug)]
pub(crate) struct GraphBuilder {
    num_left: usize,
    num_right: usize,
    offsets: Vec<usize>,
    targets: Vec<u32>,
    weights: Vec<u16>,
}

impl GraphBuilder {
    pub(crate) fn with_capacity(num_left: usize, num_right: usize, edges: usize) -> Self {
        let mut offsets = Vec::with_capacity(num_left + 1);
        offsets.push(0);
        Self {
            num_left,
            num_right,
            offsets,
            targets: Vec::with_capacity(edges),
            weights: Vec::with_capacity(edges),
        }
    }

    pub(crate) fn push_vertex(
        &mut self,
        left: usize,
        targets: &[u32],
        weights: &[u16],
    ) -> Result<()> {
        if targets.len() != weights.len() {
            return Err(Error::InvalidGraph(format!(
                "left vertex {}: {} neighbors but {} weights",
                left,
                targets.len(),
                weights.len()
            )));
        }
        if let Some(&bad) = targets.iter().find(|&&r| r as usize >= self.num_right) {
            return Err(Error::InvalidGraph(format!(
                "left vertex {} links to right vertex {} but only {} right vertices exist",
                left, bad, self.num_right
            )));
        }
        self.targets.extend_from_slice(targets);
        self.weights.extend_from_slice(weights);
        self.offsets.push(self.targets.len());
        Ok(())
    }

    pub(crate) fn finish(self) -> Result<BipartiteGraph> {
        if self.offsets.len() != self.num_left + 1 {
            return Err(Error::InvalidGraph(format!(
                "expected {} left vertices, got {}",
                self.num_left,
                self.offsets.len() - 1
            )));
        }
        Ok(BipartiteGraph {
            num_left: self.num_left,
            num_right: self.num_right,
            offsets: self.offsets,
            targets: self.targets,
            weights: self.weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> BipartiteGraph {
        BipartiteGraph::from_adjacency(
            3,
            4,
            vec![vec![(0, 2), (3, 1)], vec![], vec![(1, 5), (3, 3), (0, 1)]],
        )
        .unwrap()
    }

    #[test]
    fn test_weights() {
        let g = sample_graph();
        assert_eq!(g.num_edges(), 5);
        assert_eq!(g.left_weights(), vec![3, 0, 9]);
        assert_eq!(g.right_weights(), vec![3, 5, 0, 4]);
        assert_eq!(g.total_weight(), 12);
    }

    #[test]
    fn test_neighbors_and_offsets() {
        let g = sample_graph();
        assert_eq!(g.neighbors(2), &[1, 3, 0]);
        assert_eq!(g.weights(2), &[5, 3, 1]);
        assert!(g.neighbors(1).is_empty());
        assert_eq!(g.edge_offset(2), 2);
        assert_eq!(g.degree(0), 2);
    }

    #[test]
    fn test_stats() {
        let stats = sample_graph().stats();
        assert_eq!(stats.isolated_left, 1);
        assert_eq!(stats.isolated_right, 1);
        assert_eq!(stats.max_degree, 3);
        assert_eq!(stats.total_weight, 12);
    }

    #[test]
    fn test_rejects_out_of_range_neighbor() {
        let err = BipartiteGraph::from_adjacency(1, 2, vec![vec![(2, 1)]]).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn test_rejects_wrong_list_count() {
        let err = BipartiteGraph::from_adjacency(2, 2, vec![vec![(0, 1)]]).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn test_edges_iterator() {
        let g = sample_graph();
        let edges: Vec<_> = g.edges().collect();
        assert_eq!(edges.len(), 5);
        assert_eq!(edges[0], (0, 0, 2));
        assert_eq!(edges[4], (2, 0, 1));
    }
}
