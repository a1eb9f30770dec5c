//! `emadr` trains joint embeddings for entities, documents and words from
//! weighted relation graphs.
//!
//! This crate re-exports the two building blocks:
//!
//! - [`core`] (`emadr-core`): bipartite graphs, edge and negative samplers,
//!   binary file formats
//! - [`train`] (`emadr-train`): tables, kernels, the Hogwild trainer and the
//!   training pipelines
//!
//! ```rust,no_run
//! use emadr::{NegativeCounts, Pipeline, TrainConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dw = emadr::core::formats::load_adjacency("doc_words.bin")?;
//! let pipeline = Pipeline::new(TrainConfig::default().with_dim(50).with_threads(8))?;
//! let out = pipeline.doc_word(dw, &NegativeCounts::default())?;
//! emadr::core::formats::save_vectors("docs.bin", &out.docs)?;
//! # Ok(())
//! # }
//! ```

pub use emadr_core as core;
pub use emadr_train as train;

pub use emadr_core::{BipartiteGraph, EdgeSampler, NegativeDistribution, VectorSet};
pub use emadr_train::{DocVectors, NegativeCounts, Pipeline, TrainConfig, TrainingReport};
