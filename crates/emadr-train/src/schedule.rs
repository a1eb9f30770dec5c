//! Linear learning-rate decay shared by all worker threads.
//!
//! ```text
//! α(p) = α₀ + (α_min - α₀) · p / P,     clamped to α ≥ α_min
//! ```
//!
//! where `p` counts samples processed by all threads and `P` is the planned
//! total (threads × rounds × samples per round). The rate is recomputed only
//! every `interval` samples per thread, so the curve is a staircase: each
//! worker adds `interval` to the shared counter when it crosses a boundary
//! and publishes the new rate for everyone to read.

use crate::table::AtomicF32;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of samples between rate recomputations.
pub const DEFAULT_DECAY_INTERVAL: u64 = 10_000;

/// Pure linear schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearningRateSchedule {
    /// Rate at `p = 0`.
    pub starting: f32,
    /// Floor, reached at `p = total`.
    pub min: f32,
    /// Planned number of samples across all threads.
    pub total: u64,
    /// Samples between recomputations.
    pub interval: u64,
}

impl LearningRateSchedule {
    /// Schedule from `starting` down to `min` over `total` samples.
    pub fn new(starting: f32, min: f32, total: u64) -> Self {
        Self {
            starting,
            min,
            total,
            interval: DEFAULT_DECAY_INTERVAL,
        }
    }

    /// Override the recomputation interval (at least 1).
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Rate after `progress` samples.
    pub fn rate_at(&self, progress: u64) -> f32 {
        if self.total == 0 {
            return self.starting;
        }
        let frac = (progress as f64 / self.total as f64).min(1.0);
        let (starting, min) = (f64::from(self.starting), f64::from(self.min));
        let rate = starting + (min - starting) * frac;
        (rate as f32).max(self.min)
    }
}

/// Shared, lock-free view of the current learning rate.
#[derive(Debug)]
pub struct LearningRate {
    schedule: LearningRateSchedule,
    progress: AtomicU64,
    current: AtomicF32,
}

impl LearningRate {
    /// Start at `schedule.starting` with zero progress.
    pub fn new(schedule: LearningRateSchedule) -> Self {
        Self {
            current: AtomicF32::new(schedule.starting),
            progress: AtomicU64::new(0),
            schedule,
        }
    }

    /// The schedule being followed.
    pub fn schedule(&self) -> &LearningRateSchedule {
        &self.schedule
    }

    /// Rate to use for the calling thread's `local_step`-th sample
    /// (0-based). Recomputes the shared rate on interval boundaries.
    #[inline]
    pub fn tick(&self, local_step: u64) -> f32 {
        let interval = self.schedule.interval;
        if (local_step + 1) % interval == 0 {
            let p = self.progress.fetch_add(interval, Ordering::Relaxed) + interval;
            let rate = self.schedule.rate_at(p - 1);
            self.current.set(rate);
            rate
        } else {
            self.current.get()
        }
    }

    /// Most recently published rate.
    pub fn current(&self) -> f32 {
        self.current.get()
    }

    /// Samples accounted for so far, at interval granularity.
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }
}
