//! Shared, lock-free embedding tables.
//!
//! Training is Hogwild (Recht et al. 2011): every worker thread reads and
//! writes every table with no locks. Updates touch a handful of rows out of
//! millions, so collisions are rare, and a collision costs at most one stale
//! read-modify-write on a single float.
//!
//! Each element is an [`AtomicF32`] accessed with `Ordering::Relaxed`; on
//! x86-64 and aarch64 a relaxed 32-bit load or store is a plain move. `add`
//! is a load followed by a store, not an atomic read-modify-write, so
//! concurrent adds to the same element may lose one of the updates.
//!
//! # Tied tables
//!
//! Parameter tying across relations means two relations hold the *same*
//! [`SharedTable`] (`Arc` clones), not copies: an update through one is
//! visible through the other.

use crate::{Error, Result};
use emadr_core::VectorSet;
use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// An `f32` cell with relaxed atomic access.
#[derive(Default)]
#[repr(transparent)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    /// New cell holding `value`.
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    /// Relaxed load.
    #[inline]
    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Relaxed store.
    #[inline]
    pub fn set(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Non-atomic `self += x` (load, then store).
    #[inline]
    pub fn add(&self, x: f32) {
        self.set(self.get() + x);
    }
}

impl std::fmt::Debug for AtomicF32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.get().fmt(f)
    }
}

/// Dense `count × dim` table of shared floats.
#[derive(Debug)]
pub struct EmbeddingTable {
    count: usize,
    dim: usize,
    data: Vec<AtomicF32>,
}

/// A table handle shared between relations and worker threads.
pub type SharedTable = Arc<EmbeddingTable>;

impl EmbeddingTable {
    /// All-zero table (target-side initialisation).
    pub fn zeros(count: usize, dim: usize) -> Self {
        Self::from_fn(count, dim, |_| 0.0)
    }

    /// Uniform `(r - 0.5) / dim` initialisation, `r ∈ [0, 1)` (source side).
    pub fn uniform<R: Rng + ?Sized>(count: usize, dim: usize, rng: &mut R) -> Self {
        let scale = 1.0 / dim.max(1) as f32;
        Self::from_fn(count, dim, |_| (rng.random::<f32>() - 0.5) * scale)
    }

    /// Every element set to `value`.
    pub fn filled(count: usize, dim: usize, value: f32) -> Self {
        Self::from_fn(count, dim, |_| value)
    }

    fn from_fn(count: usize, dim: usize, mut f: impl FnMut(usize) -> f32) -> Self {
        let data = (0..count * dim).map(|i| AtomicF32::new(f(i))).collect();
        Self { count, dim, data }
    }

    /// Copy of an owned vector table (e.g. pretrained vectors).
    pub fn from_vectors(vectors: &VectorSet) -> Self {
        let data = vectors.as_slice().iter().map(|&x| AtomicF32::new(x)).collect();
        Self {
            count: vectors.count(),
            dim: vectors.dim(),
            data,
        }
    }

    /// Snapshot into an owned vector table.
    ///
    /// Taken while workers run, the snapshot may mix old and new values.
    pub fn to_vectors(&self) -> VectorSet {
        let data: Vec<f32> = self.data.iter().map(AtomicF32::get).collect();
        VectorSet::new(self.count, self.dim, data)
            .unwrap_or_else(|_| unreachable!("table length is count * dim"))
    }

    /// Wrap in an [`Arc`] for sharing.
    pub fn shared(self) -> SharedTable {
        Arc::new(self)
    }

    /// Number of rows.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Row length.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[AtomicF32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Row `i` copied out.
    pub fn row_values(&self, i: usize) -> Vec<f32> {
        self.row(i).iter().map(AtomicF32::get).collect()
    }

    /// Check the table against an expected shape.
    pub fn expect_shape(&self, label: &str, count: usize, dim: usize) -> Result<()> {
        if self.count != count {
            return Err(Error::shape(format!("{} count", label), count, self.count));
        }
        if self.dim != dim {
            return Err(Error::shape(format!("{} dimension", label), dim, self.dim));
        }
        Ok(())
    }
}

/// Dot product of two shared rows.
#[inline]
pub fn dot(a: &[AtomicF32], b: &[AtomicF32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x.get() * y.get()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn test_atomic_f32_ops() {
        let x = AtomicF32::new(1.5);
        x.add(-0.25);
        assert_eq!(x.get(), 1.25);
        x.set(-3.0);
        assert_eq!(x.get(), -3.0);
        assert_eq!(AtomicF32::default().get(), 0.0);
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        let table = EmbeddingTable::uniform(50, 10, &mut rng);
        let values = table.to_vectors();
        assert!(values.as_slice().iter().all(|&x| (-0.05..0.05).contains(&x)));
        assert!(values.as_slice().iter().any(|&x| x != 0.0));
    }

    #[test]
    fn test_vector_set_round_trip() {
        let set = VectorSet::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let table = EmbeddingTable::from_vectors(&set);
        assert_eq!(table.row_values(1), vec![4.0, 5.0, 6.0]);
        assert_eq!(table.to_vectors(), set);
    }

    #[test]
    fn test_tied_handles_share_storage() {
        let doc_for_entities = EmbeddingTable::zeros(4, 2).shared();
        let doc_for_words = Arc::clone(&doc_for_entities);
        doc_for_entities.row(3)[1].add(0.5);
        assert!(Arc::ptr_eq(&doc_for_entities, &doc_for_words));
        assert_eq!(doc_for_words.row_values(3), vec![0.0, 0.5]);
    }

    #[test]
    fn test_dot() {
        let t = EmbeddingTable::filled(2, 4, 0.5);
        assert_eq!(dot(t.row(0), t.row(1)), 1.0);
    }

    #[test]
    fn test_expect_shape() {
        let t = EmbeddingTable::zeros(3, 8);
        assert!(t.expect_shape("entity vectors", 3, 8).is_ok());
        assert!(matches!(
            t.expect_shape("entity vectors", 3, 16),
            Err(Error::Shape { expected: 16, actual: 8, .. })
        ));
    }
}
