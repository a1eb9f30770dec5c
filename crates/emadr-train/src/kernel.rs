//! Energy kernels for negative-sampling updates.
//!
//! A kernel defines the score `f(s, t)` between a source row and a target
//! row and how one logistic-loss step on that score moves each side. For a
//! label `y ∈ {0, 1}` and step scale `η` (learning rate × relation weight):
//!
//! ```text
//! g  = (y - σ(f(s, t))) · η
//! Δs = g · ∂f/∂s        (accumulated, applied once per pair)
//! Δt = g · ∂f/∂t        (applied immediately, per term)
//! ```
//!
//! | Kernel | Source | Target | f(s, t) |
//! |--------|--------|--------|---------|
//! | [`DotKernel`] | d | d | `s · t` |
//! | [`ControlledMixKernel`] | 2d | d | `Σᵢ tᵢ (s₂ᵢ cᵢ + s₂ᵢ₊₁ (1 - cᵢ))` |
//! | [`MatrixKernel`] | d₀ | d₁ | `sᵀ M t` |
//!
//! The controlled-mix kernel blends two interleaved halves of the source by
//! learned per-dimension coefficients `c ∈ [0.01, 0.99]`. The complement form
//! swaps `c` and `1 - c`, so two relations sharing one coefficient vector pull
//! the halves in opposite directions. The matrix kernel links spaces of
//! different dimensionality through a learned linear map.
//!
//! Kernel parameters (coefficients, matrices) are shared Hogwild state just
//! like the embedding tables.

use crate::sigmoid::SigmoidTable;
use crate::table::{dot, AtomicF32};
use crate::{Error, Result};
use rand::Rng;

/// Which sides of a pair receive gradient updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateMask {
    /// Update the source row.
    pub source: bool,
    /// Update true and negative target rows.
    pub target: bool,
}

impl UpdateMask {
    /// Update both sides.
    pub const BOTH: Self = Self { source: true, target: true };
    /// Freeze targets (e.g. pretrained word vectors).
    pub const SOURCE_ONLY: Self = Self { source: true, target: false };
    /// Freeze sources.
    pub const TARGET_ONLY: Self = Self { source: false, target: true };
}

impl Default for UpdateMask {
    fn default() -> Self {
        Self::BOTH
    }
}

/// Per-thread gradient buffers, reused across pairs.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    /// Accumulated source gradient.
    pub grad: Vec<f32>,
    /// Accumulated kernel-parameter gradient (mixing coefficients).
    pub aux: Vec<f32>,
    /// Temporary per-term buffers.
    tmp: Vec<f32>,
}

impl Scratch {
    /// Buffers sized for `kernel`.
    pub fn for_kernel<K: PairKernel + ?Sized>(kernel: &K) -> Self {
        let mut scratch = Self::default();
        scratch.fit(kernel);
        scratch
    }

    /// Resize for `kernel` (no-op when already large enough) and zero the
    /// accumulators.
    pub fn fit<K: PairKernel + ?Sized>(&mut self, kernel: &K) {
        let (grad, aux, tmp) = kernel.scratch_len();
        if self.grad.len() != grad {
            self.grad.resize(grad, 0.0);
        }
        if self.aux.len() != aux {
            self.aux.resize(aux, 0.0);
        }
        if self.tmp.len() < tmp {
            self.tmp.resize(tmp, 0.0);
        }
        self.reset();
    }

    /// Zero the accumulated gradients.
    pub fn reset(&mut self) {
        self.grad.iter_mut().for_each(|x| *x = 0.0);
        self.aux.iter_mut().for_each(|x| *x = 0.0);
    }
}

/// Capability set of a pair kernel.
pub trait PairKernel: Send + Sync {
    /// Length of source rows.
    fn source_dim(&self) -> usize;

    /// Length of target rows.
    fn target_dim(&self) -> usize;

    /// `(grad, aux, tmp)` scratch lengths.
    fn scratch_len(&self) -> (usize, usize, usize) {
        (self.source_dim(), 0, 0)
    }

    /// Raw score `f(s, t)`.
    fn score(&self, source: &[AtomicF32], target: &[AtomicF32]) -> f32;

    /// One logistic term: accumulate `g · ∂f/∂s` into `scratch`, and update
    /// `target` in place when `update_target` is set. Returns `g`.
    #[allow(clippy::too_many_arguments)]
    fn train_term(
        &self,
        source: &[AtomicF32],
        target: &[AtomicF32],
        label: f32,
        scale: f32,
        sigmoid: &SigmoidTable,
        scratch: &mut Scratch,
        update_target: bool,
    ) -> f32;

    /// Add the accumulated source gradient into `source`.
    fn apply_source_gradient(&self, source: &[AtomicF32], scratch: &Scratch) {
        for (s, &g) in source.iter().zip(&scratch.grad) {
            s.add(g);
        }
    }

    /// Apply accumulated kernel-parameter gradients, if the kernel learns any.
    fn apply_param_gradient(&self, _scratch: &Scratch) {}

    /// Re-establish parameter invariants after an update.
    fn apply_post_update_constraints(&self) {}
}

/// Plain dot-product kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotKernel {
    dim: usize,
}

impl DotKernel {
    /// Kernel over `dim`-length rows on both sides.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl PairKernel for DotKernel {
    fn source_dim(&self) -> usize {
        self.dim
    }

    fn target_dim(&self) -> usize {
        self.dim
    }

    fn score(&self, source: &[AtomicF32], target: &[AtomicF32]) -> f32 {
        dot(source, target)
    }

    #[inline]
    fn train_term(
        &self,
        source: &[AtomicF32],
        target: &[AtomicF32],
        label: f32,
        scale: f32,
        sigmoid: &SigmoidTable,
        scratch: &mut Scratch,
        update_target: bool,
    ) -> f32 {
        let g = (label - sigmoid.get(dot(source, target))) * scale;
        for ((acc, s), t) in scratch.grad.iter_mut().zip(source).zip(target) {
            let tv = t.get();
            *acc += g * tv;
            if update_target {
                t.set(tv + g * s.get());
            }
        }
        g
    }
}

/// Lower clamp for mixing coefficients.
pub const MIX_MIN: f32 = 0.01;
/// Upper clamp for mixing coefficients.
pub const MIX_MAX: f32 = 0.99;

/// Controlled-mixture kernel: the source row holds two interleaved halves
/// blended by shared per-dimension coefficients.
#[derive(Debug)]
pub struct ControlledMixKernel {
    dim: usize,
    coefficients: Vec<AtomicF32>,
    complement: bool,
    update_params: bool,
}

impl ControlledMixKernel {
    /// Coefficients initialised to 0.5 (equal blend).
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            coefficients: (0..dim).map(|_| AtomicF32::new(0.5)).collect(),
            complement: false,
            update_params: true,
        }
    }

    /// Use the complement blend (`1 - c` on the even half).
    pub fn with_complement(mut self, complement: bool) -> Self {
        self.complement = complement;
        self
    }

    /// Learn the coefficients (default) or keep them fixed.
    pub fn with_update_params(mut self, update: bool) -> Self {
        self.update_params = update;
        self
    }

    /// Current coefficients.
    pub fn coefficients(&self) -> Vec<f32> {
        self.coefficients.iter().map(AtomicF32::get).collect()
    }

    #[inline]
    fn weights(&self, i: usize) -> (f32, f32) {
        let c = self.coefficients[i].get();
        if self.complement {
            (1.0 - c, c)
        } else {
            (c, 1.0 - c)
        }
    }

    fn mixed(&self, source: &[AtomicF32], i: usize) -> f32 {
        let (p, q) = self.weights(i);
        source[2 * i].get() * p + source[2 * i + 1].get() * q
    }
}

impl PairKernel for ControlledMixKernel {
    fn source_dim(&self) -> usize {
        2 * self.dim
    }

    fn target_dim(&self) -> usize {
        self.dim
    }

    fn scratch_len(&self) -> (usize, usize, usize) {
        (2 * self.dim, self.dim, 0)
    }

    fn score(&self, source: &[AtomicF32], target: &[AtomicF32]) -> f32 {
        (0..self.dim).map(|i| target[i].get() * self.mixed(source, i)).sum()
    }

    fn train_term(
        &self,
        source: &[AtomicF32],
        target: &[AtomicF32],
        label: f32,
        scale: f32,
        sigmoid: &SigmoidTable,
        scratch: &mut Scratch,
        update_target: bool,
    ) -> f32 {
        let g = (label - sigmoid.get(self.score(source, target))) * scale;
        let sign = if self.complement { -1.0 } else { 1.0 };
        for i in 0..self.dim {
            let (p, q) = self.weights(i);
            let (a, b) = (source[2 * i].get(), source[2 * i + 1].get());
            let tv = target[i].get();
            scratch.grad[2 * i] += g * tv * p;
            scratch.grad[2 * i + 1] += g * tv * q;
            scratch.aux[i] += sign * g * tv * (a - b);
            if update_target {
                target[i].set(tv + g * (a * p + b * q));
            }
        }
        g
    }

    fn apply_param_gradient(&self, scratch: &Scratch) {
        if !self.update_params {
            return;
        }
        for (c, &g) in self.coefficients.iter().zip(&scratch.aux) {
            c.add(g);
        }
    }

    fn apply_post_update_constraints(&self) {
        for c in &self.coefficients {
            let v = c.get();
            if !(MIX_MIN..=MIX_MAX).contains(&v) {
                c.set(v.clamp(MIX_MIN, MIX_MAX));
            }
        }
    }
}

/// Bilinear kernel `sᵀ M t` with a learned `source_dim × target_dim` map.
#[derive(Debug)]
pub struct MatrixKernel {
    source_dim: usize,
    target_dim: usize,
    /// Row-major, `source_dim` rows of `target_dim`.
    matrix: Vec<AtomicF32>,
    update_params: bool,
}

impl MatrixKernel {
    /// Small uniform initialisation, `(r - 0.5) / target_dim`.
    pub fn new<R: Rng + ?Sized>(source_dim: usize, target_dim: usize, rng: &mut R) -> Self {
        let scale = 1.0 / target_dim.max(1) as f32;
        let matrix = (0..source_dim * target_dim)
            .map(|_| AtomicF32::new((rng.random::<f32>() - 0.5) * scale))
            .collect();
        Self {
            source_dim,
            target_dim,
            matrix,
            update_params: true,
        }
    }

    /// Kernel with an explicit row-major matrix.
    pub fn from_matrix(source_dim: usize, target_dim: usize, values: &[f32]) -> Result<Self> {
        if values.len() != source_dim * target_dim {
            return Err(Error::shape("matrix size", source_dim * target_dim, values.len()));
        }
        Ok(Self {
            source_dim,
            target_dim,
            matrix: values.iter().map(|&v| AtomicF32::new(v)).collect(),
            update_params: true,
        })
    }

    /// Learn the matrix (default) or keep it fixed.
    pub fn with_update_params(mut self, update: bool) -> Self {
        self.update_params = update;
        self
    }

    /// Current matrix, row-major.
    pub fn matrix(&self) -> Vec<f32> {
        self.matrix.iter().map(AtomicF32::get).collect()
    }

    fn matrix_row(&self, i: usize) -> &[AtomicF32] {
        &self.matrix[i * self.target_dim..(i + 1) * self.target_dim]
    }
}

impl PairKernel for MatrixKernel {
    fn source_dim(&self) -> usize {
        self.source_dim
    }

    fn target_dim(&self) -> usize {
        self.target_dim
    }

    fn scratch_len(&self) -> (usize, usize, usize) {
        // tmp holds M·t then Mᵀ·s
        (self.source_dim, 0, self.source_dim + self.target_dim)
    }

    fn score(&self, source: &[AtomicF32], target: &[AtomicF32]) -> f32 {
        (0..self.source_dim)
            .map(|i| source[i].get() * dot(self.matrix_row(i), target))
            .sum()
    }

    fn train_term(
        &self,
        source: &[AtomicF32],
        target: &[AtomicF32],
        label: f32,
        scale: f32,
        sigmoid: &SigmoidTable,
        scratch: &mut Scratch,
        update_target: bool,
    ) -> f32 {
        let (mt, mts) =
            scratch.tmp[..self.source_dim + self.target_dim].split_at_mut(self.source_dim);
        mts.iter_mut().for_each(|x| *x = 0.0);

        let mut f = 0.0;
        for (i, m_t) in mt.iter_mut().enumerate() {
            let row = self.matrix_row(i);
            let s = source[i].get();
            *m_t = dot(row, target);
            f += s * *m_t;
            for (acc, m) in mts.iter_mut().zip(row) {
                *acc += m.get() * s;
            }
        }

        let g = (label - sigmoid.get(f)) * scale;

        for (acc, &m_t) in scratch.grad.iter_mut().zip(mt.iter()) {
            *acc += g * m_t;
        }
        if self.update_params {
            for i in 0..self.source_dim {
                let gs = g * source[i].get();
                for (m, t) in self.matrix_row(i).iter().zip(target) {
                    m.add(gs * t.get());
                }
            }
        }
        if update_target {
            for (t, &v) in target.iter().zip(mts.iter()) {
                t.add(g * v);
            }
        }
        g
    }
}

/// Kernel selected at configuration time.
#[derive(Debug)]
pub enum Kernel {
    /// Dot product.
    Dot(DotKernel),
    /// Controlled mixture of two source halves.
    ControlledMix(ControlledMixKernel),
    /// Learned bilinear map.
    Matrix(MatrixKernel),
}

impl Kernel {
    /// Dot-product kernel over `dim`.
    pub fn dot(dim: usize) -> Self {
        Self::Dot(DotKernel::new(dim))
    }

    fn inner(&self) -> &dyn PairKernel {
        match self {
            Self::Dot(k) => k,
            Self::ControlledMix(k) => k,
            Self::Matrix(k) => k,
        }
    }
}

impl From<DotKernel> for Kernel {
    fn from(k: DotKernel) -> Self {
        Self::Dot(k)
    }
}

impl From<ControlledMixKernel> for Kernel {
    fn from(k: ControlledMixKernel) -> Self {
        Self::ControlledMix(k)
    }
}

impl From<MatrixKernel> for Kernel {
    fn from(k: MatrixKernel) -> Self {
        Self::Matrix(k)
    }
}

impl PairKernel for Kernel {
    fn source_dim(&self) -> usize {
        self.inner().source_dim()
    }

    fn target_dim(&self) -> usize {
        self.inner().target_dim()
    }

    fn scratch_len(&self) -> (usize, usize, usize) {
        self.inner().scratch_len()
    }

    fn score(&self, source: &[AtomicF32], target: &[AtomicF32]) -> f32 {
        self.inner().score(source, target)
    }

    #[inline]
    fn train_term(
        &self,
        source: &[AtomicF32],
        target: &[AtomicF32],
        label: f32,
        scale: f32,
        sigmoid: &SigmoidTable,
        scratch: &mut Scratch,
        update_target: bool,
    ) -> f32 {
        match self {
            Self::Dot(k) => {
                k.train_term(source, target, label, scale, sigmoid, scratch, update_target)
            }
            Self::ControlledMix(k) => {
                k.train_term(source, target, label, scale, sigmoid, scratch, update_target)
            }
            Self::Matrix(k) => {
                k.train_term(source, target, label, scale, sigmoid, scratch, update_target)
            }
        }
    }

    fn apply_source_gradient(&self, source: &[AtomicF32], scratch: &Scratch) {
        self.inner().apply_source_gradient(source, scratch);
    }

    fn apply_param_gradient(&self, scratch: &Scratch) {
        self.inner().apply_param_gradient(scratch);
    }

    fn apply_post_update_constraints(&self) {
        self.inner().apply_post_update_constraints();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::EmbeddingTable;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn row(values: &[f32]) -> Vec<AtomicF32> {
        values.iter().map(|&v| AtomicF32::new(v)).collect()
    }

    fn values(row: &[AtomicF32]) -> Vec<f32> {
        row.iter().map(AtomicF32::get).collect()
    }

    #[test]
    fn test_dot_term_gradients() {
        let sigmoid = SigmoidTable::default();
        let k = DotKernel::new(2);
        let s = row(&[1.0, 0.0]);
        let t = row(&[0.0, 0.0]);
        let mut scratch = Scratch::for_kernel(&k);

        // σ(0) = 0.5, label 1, scale 0.2 → g = 0.1
        let g = k.train_term(&s, &t, 1.0, 0.2, &sigmoid, &mut scratch, true);
        assert!((g - 0.1).abs() < 1e-6);
        // Gradient uses the target before its update.
        assert_eq!(scratch.grad, vec![0.0, 0.0]);
        assert!((values(&t)[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_dot_frozen_target() {
        let sigmoid = SigmoidTable::default();
        let k = DotKernel::new(2);
        let s = row(&[0.3, -0.2]);
        let t = row(&[0.5, 0.5]);
        let mut scratch = Scratch::for_kernel(&k);
        k.train_term(&s, &t, 0.0, 1.0, &sigmoid, &mut scratch, false);
        assert_eq!(values(&t), vec![0.5, 0.5]);
        assert!(scratch.grad[0] < 0.0);
    }

    #[test]
    fn test_mix_score_blends_halves() {
        let k = ControlledMixKernel::new(2);
        let s = row(&[1.0, 3.0, 2.0, 0.0]);
        let t = row(&[1.0, 1.0]);
        // c = 0.5: (1·0.5 + 3·0.5) + (2·0.5 + 0) = 3
        assert!((k.score(&s, &t) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_mix_complement_swaps_weights() {
        let k = ControlledMixKernel::new(1);
        k.coefficients[0].set(0.8);
        let s = row(&[1.0, 0.0]);
        let t = row(&[1.0]);
        assert!((k.score(&s, &t) - 0.8).abs() < 1e-6);
        let k = k.with_complement(true);
        assert!((k.score(&s, &t) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_mix_coefficients_move_and_clamp() {
        let sigmoid = SigmoidTable::default();
        let k = ControlledMixKernel::new(1);
        let s = row(&[1.0, -1.0]);
        let t = row(&[1.0]);
        let mut scratch = Scratch::for_kernel(&k);
        k.train_term(&s, &t, 1.0, 10.0, &sigmoid, &mut scratch, false);
        // Positive label pushes c toward the half that agrees with t.
        assert!(scratch.aux[0] > 0.0);
        k.apply_param_gradient(&scratch);
        assert!(k.coefficients()[0] > MIX_MAX);
        k.apply_post_update_constraints();
        assert_eq!(k.coefficients()[0], MIX_MAX);

        k.coefficients[0].set(-0.3);
        k.apply_post_update_constraints();
        assert_eq!(k.coefficients()[0], MIX_MIN);
    }

    #[test]
    fn test_mix_fixed_params() {
        let sigmoid = SigmoidTable::default();
        let k = ControlledMixKernel::new(1).with_update_params(false);
        let s = row(&[1.0, -1.0]);
        let t = row(&[1.0]);
        let mut scratch = Scratch::for_kernel(&k);
        k.train_term(&s, &t, 1.0, 1.0, &sigmoid, &mut scratch, true);
        k.apply_param_gradient(&scratch);
        assert_eq!(k.coefficients(), vec![0.5]);
    }

    #[test]
    fn test_matrix_score() {
        // M = [[1, 2, 0], [0, 1, 1]]
        let k = MatrixKernel::from_matrix(2, 3, &[1.0, 2.0, 0.0, 0.0, 1.0, 1.0]).unwrap();
        let s = row(&[1.0, 2.0]);
        let t = row(&[1.0, 1.0, 1.0]);
        // sᵀ M t = 1·3 + 2·2 = 7
        assert!((k.score(&s, &t) - 7.0).abs() < 1e-6);
        assert!(MatrixKernel::from_matrix(2, 2, &[1.0]).is_err());
    }

    #[test]
    fn test_matrix_term_raises_positive_score() {
        let sigmoid = SigmoidTable::default();
        let mut rng = XorShiftRng::seed_from_u64(5);
        let k = MatrixKernel::new(3, 2, &mut rng);
        let src = EmbeddingTable::uniform(1, 3, &mut rng);
        let tgt = EmbeddingTable::uniform(1, 2, &mut rng);
        let mut scratch = Scratch::for_kernel(&k);

        let before = k.score(src.row(0), tgt.row(0));
        for _ in 0..20 {
            scratch.reset();
            k.train_term(src.row(0), tgt.row(0), 1.0, 0.5, &sigmoid, &mut scratch, true);
            k.apply_source_gradient(src.row(0), &scratch);
        }
        assert!(k.score(src.row(0), tgt.row(0)) > before);
    }

    #[test]
    fn test_kernel_enum_dims() {
        let mut rng = XorShiftRng::seed_from_u64(1);
        let cases: Vec<(Kernel, usize, usize)> = vec![
            (Kernel::dot(4), 4, 4),
            (ControlledMixKernel::new(4).into(), 8, 4),
            (MatrixKernel::new(3, 5, &mut rng).into(), 3, 5),
        ];
        for (k, s, t) in cases {
            assert_eq!((k.source_dim(), k.target_dim()), (s, t));
            assert_eq!(Scratch::for_kernel(&k).grad.len(), s);
        }
    }
}
