//! Lookup-table logistic function.
//!
//! ```text
//! σ(x) = 1 / (1 + e^-x)
//! ```
//!
//! The hot loop evaluates σ once per positive and once per negative sample.
//! The table stores σ at `size + 1` evenly spaced grid points over `[-B, B]`
//! and returns the nearest one; outside the domain the value saturates to
//! exactly 0 or 1. With the defaults (`size = 1000`, `B = 6`) the grid step is
//! 0.012 and the absolute error stays around 0.0015 or less.

/// Default number of grid intervals.
pub const DEFAULT_TABLE_SIZE: usize = 1000;

/// Default domain bound `B`.
pub const DEFAULT_BOUND: f32 = 6.0;

/// Precomputed σ over `[-bound, bound]`. Read-only after construction.
#[derive(Debug, Clone)]
pub struct SigmoidTable {
    values: Vec<f32>,
    bound: f32,
    scale: f32,
}

impl SigmoidTable {
    /// Build a table with `size` intervals over `[-bound, bound]`.
    ///
    /// `size` is raised to at least 1 and a non-positive bound falls back to
    /// [`DEFAULT_BOUND`].
    pub fn new(size: usize, bound: f32) -> Self {
        let size = size.max(1);
        let bound = if bound > 0.0 && bound.is_finite() { bound } else { DEFAULT_BOUND };
        let step = 2.0 * f64::from(bound) / size as f64;
        let values = (0..=size)
            .map(|i| {
                let x = -f64::from(bound) + step * i as f64;
                (1.0 / (1.0 + (-x).exp())) as f32
            })
            .collect();
        Self {
            values,
            bound,
            scale: size as f32 / (2.0 * bound),
        }
    }

    /// Domain bound `B`.
    pub fn bound(&self) -> f32 {
        self.bound
    }

    /// Approximate σ(x).
    #[inline]
    pub fn get(&self, x: f32) -> f32 {
        if x >= self.bound {
            1.0
        } else if x <= -self.bound {
            0.0
        } else {
            // NaN also lands here and maps to index 0 via the saturating cast.
            let idx = ((x + self.bound) * self.scale + 0.5) as usize;
            self.values[idx.min(self.values.len() - 1)]
        }
    }
}

impl Default for SigmoidTable {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_SIZE, DEFAULT_BOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn test_saturates_outside_domain() {
        let t = SigmoidTable::default();
        assert_eq!(t.get(6.0), 1.0);
        assert_eq!(t.get(100.0), 1.0);
        assert_eq!(t.get(-6.0), 0.0);
        assert_eq!(t.get(f32::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_close_to_exact() {
        let t = SigmoidTable::default();
        let mut x = -5.999f32;
        while x < 6.0 {
            assert!((t.get(x) - exact(x)).abs() < 0.002, "x = {}", x);
            x += 0.0137;
        }
    }

    #[test]
    fn test_midpoint_and_monotone() {
        let t = SigmoidTable::default();
        assert!((t.get(0.0) - 0.5).abs() < 1e-6);
        let mut prev = 0.0;
        for i in -600..600 {
            let v = t.get(i as f32 / 100.0);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn test_coarse_table() {
        let t = SigmoidTable::new(4, 2.0);
        assert!((t.get(0.1) - 0.5).abs() < 1e-6);
        assert!((t.get(0.9) - exact(1.0)).abs() < 1e-6);
    }
}
