// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::uninlined_format_args)]

//! Graph data model and sampling primitives for joint embedding training.
//!
//! This crate holds everything that is fixed for the duration of a training
//! run:
//!
//! - [`BipartiteGraph`] - a weighted relation between two id spaces
//! - [`EdgeSampler`] - O(1) weighted edge and neighbor sampling
//! - [`NegativeDistribution`] - smoothed unigram distribution for negatives
//! - [`formats`] - binary adjacency, frequency and vector files
//!
//! # Relations as Bipartite Graphs
//!
//! Three object spaces (entities, documents, words) are linked by three
//! relations:
//!
//! | Relation | Left | Right | Typical weight |
//! |----------|------|-------|----------------|
//! | entity↔entity | entity | entity | link count |
//! | document↔entity | document | entity | mention count |
//! | document↔word | document | word | term frequency |
//!
//! All three are stored as [`BipartiteGraph`]s; the entity↔entity graph just
//! has the same id space on both sides.
//!
//! # Why Alias Tables
//!
//! Skip-gram style training draws hundreds of millions of edges. Sampling
//! proportionally to weight by binary search over a cumulative array costs
//! O(log E) per draw; Walker's alias method (Walker 1977, Vose 1991) costs
//! O(1) after O(n) setup:
//!
//! | Method | Setup | Draw |
//! |--------|-------|------|
//! | Linear scan | O(1) | O(n) |
//! | Cumulative + binary search | O(n) | O(log n) |
//! | Alias table | O(n) | O(1) |
//!
//! The edge sampler uses one alias table over left vertices and one per left
//! vertex over its neighbors, rather than one table over all edges.
//!
//! # References
//!
//! - Tang et al. (2015). "LINE: Large-scale Information Network Embedding"
//! - Mikolov et al. (2013). "Distributed Representations of Words and Phrases"

pub mod algo;
pub mod error;
pub mod formats;
pub mod graph;

pub use algo::{EdgeSampler, NegativeDistribution, SMOOTHING_POWER};
pub use error::{Error, Result};
pub use formats::VectorSet;
pub use graph::{BipartiteGraph, GraphStats};
