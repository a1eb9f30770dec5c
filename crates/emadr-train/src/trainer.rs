//! Negative-sampling step for one observed pair.
//!
//! For an observed `(source, target)` pair and `k` negatives `n₁..n_k` drawn
//! from the target space's smoothed distribution, one step ascends
//!
//! ```text
//! log σ(f(s, t)) + Σⱼ log σ(-f(s, nⱼ))
//! ```
//!
//! Target rows move immediately, term by term. The source gradient is
//! accumulated over all `k + 1` terms and applied once at the end, so every
//! term sees the same source row.
//!
//! A negative may coincide with the true target. It is trained as a negative
//! anyway; with realistic vocabulary sizes this is rare noise.

use crate::kernel::{PairKernel, Scratch, UpdateMask};
use crate::sigmoid::SigmoidTable;
use crate::table::{AtomicF32, EmbeddingTable};
use emadr_core::NegativeDistribution;
use rand::Rng;
use std::sync::Arc;

/// Negative-sampling trainer for one target space.
///
/// Stateless apart from configuration; share it freely across threads.
#[derive(Debug, Clone)]
pub struct NegativeSamplingTrainer {
    sigmoid: Arc<SigmoidTable>,
    negatives: Arc<NegativeDistribution>,
    num_negative: usize,
}

impl NegativeSamplingTrainer {
    /// Trainer drawing `num_negative` negatives per pair from `negatives`.
    pub fn new(
        sigmoid: Arc<SigmoidTable>,
        negatives: Arc<NegativeDistribution>,
        num_negative: usize,
    ) -> Self {
        Self {
            sigmoid,
            negatives,
            num_negative,
        }
    }

    /// Negatives drawn per pair.
    pub fn num_negative(&self) -> usize {
        self.num_negative
    }

    /// Size of the target id space the negatives come from.
    pub fn num_targets(&self) -> usize {
        self.negatives.len()
    }

    /// Positive term (label 1) against `targets[target]`.
    #[allow(clippy::too_many_arguments)]
    pub fn train_positive<K: PairKernel + ?Sized>(
        &self,
        kernel: &K,
        source: &[AtomicF32],
        target: usize,
        targets: &EmbeddingTable,
        scale: f32,
        scratch: &mut Scratch,
        update_target: bool,
    ) -> f32 {
        kernel.train_term(
            source,
            targets.row(target),
            1.0,
            scale,
            &self.sigmoid,
            scratch,
            update_target,
        )
    }

    /// `num_negative` negative terms (label 0), each against a freshly
    /// sampled target row.
    #[allow(clippy::too_many_arguments)]
    pub fn train_negative_batch<K: PairKernel + ?Sized, R: Rng + ?Sized>(
        &self,
        kernel: &K,
        source: &[AtomicF32],
        targets: &EmbeddingTable,
        scale: f32,
        scratch: &mut Scratch,
        update_target: bool,
        rng: &mut R,
    ) {
        for _ in 0..self.num_negative {
            let negative = self.negatives.sample(rng) as usize;
            kernel.train_term(
                source,
                targets.row(negative),
                0.0,
                scale,
                &self.sigmoid,
                scratch,
                update_target,
            );
        }
    }

    /// Full step for one pair: positive term, negatives, then the
    /// accumulated source update and kernel constraints.
    ///
    /// `scale` is the learning rate times the relation weight. `scratch` must
    /// have been sized for `kernel` (see [`Scratch::for_kernel`]); it is
    /// zeroed here.
    #[allow(clippy::too_many_arguments)]
    pub fn train_pair<K: PairKernel + ?Sized, R: Rng + ?Sized>(
        &self,
        kernel: &K,
        source: &[AtomicF32],
        target: usize,
        targets: &EmbeddingTable,
        scale: f32,
        scratch: &mut Scratch,
        update: UpdateMask,
        rng: &mut R,
    ) {
        scratch.reset();
        self.train_positive(kernel, source, target, targets, scale, scratch, update.target);
        self.train_negative_batch(kernel, source, targets, scale, scratch, update.target, rng);
        if update.source {
            kernel.apply_source_gradient(source, scratch);
        }
        kernel.apply_param_gradient(scratch);
        kernel.apply_post_update_constraints();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{DotKernel, Kernel};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn trainer(counts: &[u64], k: usize) -> NegativeSamplingTrainer {
        NegativeSamplingTrainer::new(
            Arc::new(SigmoidTable::default()),
            Arc::new(NegativeDistribution::from_counts(counts).unwrap()),
            k,
        )
    }

    #[test]
    fn test_frozen_target_increases_score_monotonically() {
        // Target 0 = e₀, the only negative (id 1) = e₁.
        let targets = EmbeddingTable::zeros(2, 4);
        targets.row(0)[0].set(1.0);
        targets.row(1)[1].set(1.0);
        let sources = EmbeddingTable::zeros(1, 4);

        let t = trainer(&[0, 5], 3);
        let kernel = DotKernel::new(4);
        let mut scratch = Scratch::for_kernel(&kernel);
        let mut rng = XorShiftRng::seed_from_u64(317);

        let mut prev = kernel.score(sources.row(0), targets.row(0));
        for _ in 0..200 {
            t.train_pair(
                &kernel,
                sources.row(0),
                0,
                &targets,
                0.025,
                &mut scratch,
                UpdateMask::SOURCE_ONLY,
                &mut rng,
            );
            let score = kernel.score(sources.row(0), targets.row(0));
            assert!(score > prev, "score {} did not increase from {}", score, prev);
            prev = score;
        }
        assert_eq!(targets.row_values(0), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(targets.row_values(1), vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_frozen_source_moves_targets_only() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let sources = EmbeddingTable::uniform(1, 8, &mut rng);
        let targets = EmbeddingTable::zeros(3, 8);
        let before = sources.row_values(0);

        // Target 2 is never drawn as a negative.
        let t = trainer(&[1, 1, 0], 2);
        let kernel = Kernel::dot(8);
        let mut scratch = Scratch::for_kernel(&kernel);
        t.train_pair(
            &kernel,
            sources.row(0),
            2,
            &targets,
            0.5,
            &mut scratch,
            UpdateMask::TARGET_ONLY,
            &mut rng,
        );
        assert_eq!(sources.row_values(0), before);
        assert!(targets.row_values(2).iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_zero_targets_leave_source_unchanged_on_first_step() {
        // With all-zero targets the source gradient is zero.
        let mut rng = XorShiftRng::seed_from_u64(31);
        let sources = EmbeddingTable::uniform(1, 4, &mut rng);
        let targets = EmbeddingTable::zeros(2, 4);
        let before = sources.row_values(0);

        let t = trainer(&[0, 1], 1);
        let kernel = DotKernel::new(4);
        let mut scratch = Scratch::for_kernel(&kernel);
        t.train_pair(
            &kernel,
            sources.row(0),
            0,
            &targets,
            0.1,
            &mut scratch,
            UpdateMask::BOTH,
            &mut rng,
        );
        assert_eq!(sources.row_values(0), before);
        assert!(targets.row_values(0).iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_relation_weight_scales_step() {
        let run = |scale: f32| {
            let targets = EmbeddingTable::filled(1, 2, 0.5);
            let sources = EmbeddingTable::zeros(1, 2);
            let t = trainer(&[1], 0);
            let kernel = DotKernel::new(2);
            let mut scratch = Scratch::for_kernel(&kernel);
            let mut rng = XorShiftRng::seed_from_u64(1);
            t.train_pair(
                &kernel,
                sources.row(0),
                0,
                &targets,
                scale,
                &mut scratch,
                UpdateMask::SOURCE_ONLY,
                &mut rng,
            );
            sources.row_values(0)[0]
        };
        assert!((run(0.2) - 2.0 * run(0.1)).abs() < 1e-6);
    }
}
