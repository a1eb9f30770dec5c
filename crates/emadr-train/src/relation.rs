//! One trainable relation: a graph, the tables on each side, and how to
//! update them.

use crate::kernel::{Kernel, PairKernel, Scratch, UpdateMask};
use crate::table::SharedTable;
use crate::trainer::NegativeSamplingTrainer;
use crate::{Error, Result};
use emadr_core::EdgeSampler;
use rand::Rng;
use std::sync::Arc;

/// A relation graph bound to its source and target tables.
///
/// Sampled edge `(l, r)` trains `source[l]` to predict `target[r]`. A
/// symmetric relation (same id space on both sides) also trains
/// `source[r]` to predict `target[l]`.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    sampler: Arc<EdgeSampler>,
    source: SharedTable,
    target: SharedTable,
    trainer: NegativeSamplingTrainer,
    kernel: Arc<Kernel>,
    weight: f32,
    update: UpdateMask,
    symmetric: bool,
}

impl Relation {
    /// Relation with a dot-product kernel, weight 1 and both sides updated.
    pub fn new(
        name: impl Into<String>,
        sampler: Arc<EdgeSampler>,
        source: SharedTable,
        target: SharedTable,
        trainer: NegativeSamplingTrainer,
    ) -> Self {
        let kernel = Arc::new(Kernel::dot(source.dim()));
        Self {
            name: name.into(),
            sampler,
            source,
            target,
            trainer,
            kernel,
            weight: 1.0,
            update: UpdateMask::BOTH,
            symmetric: false,
        }
    }

    /// Use a different kernel (may be shared with other relations).
    pub fn with_kernel(mut self, kernel: Arc<Kernel>) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set the relation weight.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Set which sides are updated.
    pub fn with_update(mut self, update: UpdateMask) -> Self {
        self.update = update;
        self
    }

    /// Train both directions of every sampled edge.
    pub fn with_symmetric(mut self, symmetric: bool) -> Self {
        self.symmetric = symmetric;
        self
    }

    /// Relation name used in logs and reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Edge sampler.
    pub fn sampler(&self) -> &Arc<EdgeSampler> {
        &self.sampler
    }

    /// Source table.
    pub fn source(&self) -> &SharedTable {
        &self.source
    }

    /// Target table.
    pub fn target(&self) -> &SharedTable {
        &self.target
    }

    /// Kernel.
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Relation weight.
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Whether both directions are trained.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Check that tables, kernel, negatives and graph agree.
    pub fn validate(&self) -> Result<()> {
        let what = |s: &str| format!("{} {}", self.name, s);
        let (left, right) = (self.sampler.num_left(), self.sampler.num_right());

        if self.source.count() < left {
            return Err(Error::shape(what("source table rows"), left, self.source.count()));
        }
        if self.target.count() < right {
            return Err(Error::shape(what("target table rows"), right, self.target.count()));
        }
        if self.trainer.num_targets() != self.target.count() {
            return Err(Error::shape(
                what("negative id space"),
                self.target.count(),
                self.trainer.num_targets(),
            ));
        }
        if self.kernel.source_dim() != self.source.dim() {
            return Err(Error::shape(
                what("source dimension"),
                self.kernel.source_dim(),
                self.source.dim(),
            ));
        }
        if self.kernel.target_dim() != self.target.dim() {
            return Err(Error::shape(
                what("target dimension"),
                self.kernel.target_dim(),
                self.target.dim(),
            ));
        }
        if self.symmetric {
            if left != right {
                return Err(Error::shape(what("symmetric graph sides"), left, right));
            }
            if self.source.count() < right {
                return Err(Error::shape(what("source table rows"), right, self.source.count()));
            }
            if self.target.count() < left {
                return Err(Error::shape(what("target table rows"), left, self.target.count()));
            }
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(Error::Config(format!(
                "{} weight must be non-negative, got {}",
                self.name, self.weight
            )));
        }
        Ok(())
    }

    /// Sample one edge and train it at learning rate `alpha`.
    ///
    /// `scratch` must be sized for this relation's kernel.
    #[inline]
    pub fn train_sample<R: Rng + ?Sized>(&self, rng: &mut R, alpha: f32, scratch: &mut Scratch) {
        let (left, right) = self.sampler.sample_edge(rng);
        let scale = alpha * self.weight;
        self.trainer.train_pair(
            self.kernel.as_ref(),
            self.source.row(left as usize),
            right as usize,
            &self.target,
            scale,
            scratch,
            self.update,
            rng,
        );
        if self.symmetric {
            self.trainer.train_pair(
                self.kernel.as_ref(),
                self.source.row(right as usize),
                left as usize,
                &self.target,
                scale,
                scratch,
                self.update,
                rng,
            );
        }
    }
}
