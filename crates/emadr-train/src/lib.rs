// Allow minor clippy style warnings at crate level
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]

//! Hogwild negative-sampling trainer for joint entity, document and word
//! embeddings.
//!
//! # Model
//!
//! Every relation graph trains a source table to predict a target table with
//! the skip-gram negative-sampling objective (Mikolov et al. 2013):
//!
//! ```text
//! L(l, r) = log σ(f(s_l, t_r)) + Σ_{k=1..K} log σ(-f(s_l, t_{n_k})),   n_k ~ P_n
//! ```
//!
//! where `(l, r)` is an edge drawn proportionally to its weight, `P_n` is the
//! smoothed unigram distribution over the target space and `f` is the
//! relation's kernel (plain dot product by default).
//!
//! Relations share tables. In the joint model the entity source table is
//! both the source of the entity↔entity relation and the target of the
//! document↔entity relation, so documents land in the entity space:
//!
//! ```text
//!  entity↔entity:   E_src ──▶ E_tgt   (both directions)
//!  doc↔entity:      D_ent ──▶ E_src
//!  doc↔word:        D_wrd ──▶ W
//! ```
//!
//! With tied documents `D_ent` and `D_wrd` are one table.
//!
//! # Concurrency
//!
//! Workers update tables without locks (Hogwild, Recht et al. 2011). Each
//! cell is an `AtomicU32` holding `f32` bits and written with relaxed
//! ordering, so races lose updates but never produce torn values. See
//! [`table`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use emadr_train::{NegativeCounts, Pipeline, TrainConfig};
//!
//! let dw = emadr_core::formats::load_adjacency("doc_words.bin")?;
//! let pipeline = Pipeline::new(TrainConfig::default().with_dim(50))?;
//! let out = pipeline.doc_word(dw, &NegativeCounts::default())?;
//! emadr_core::formats::save_vectors("docs.bin", &out.docs)?;
//! ```

pub mod config;
pub mod error;
pub mod joint;
pub mod kernel;
pub mod pipeline;
pub mod relation;
pub mod schedule;
pub mod sigmoid;
pub mod table;
pub mod trainer;

pub use config::{RelationWeights, TrainConfig, INIT_SEED, THREAD_SEEDS};
pub use error::{Error, Result};
pub use joint::{JointTrainer, ProgressCallback, RelationReport, RoundProgress, TrainingReport};
pub use kernel::{
    ControlledMixKernel, DotKernel, Kernel, MatrixKernel, PairKernel, Scratch, UpdateMask,
};
pub use pipeline::{
    DocOutput, DocVectors, DocWordOutput, EntityNetOutput, JointOutput, NegativeCounts, Pipeline,
};
pub use relation::Relation;
pub use schedule::{LearningRate, LearningRateSchedule};
pub use sigmoid::SigmoidTable;
pub use table::{AtomicF32, EmbeddingTable, SharedTable};
pub use trainer::NegativeSamplingTrainer;
