//! Training configuration.

use crate::schedule::DEFAULT_DECAY_INTERVAL;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed per-thread seeds. Reproducible seed sets, not reproducible vectors:
/// thread interleaving still changes the update order between runs.
pub const THREAD_SEEDS: [u64; 10] = [317, 7, 31, 297, 1238, 23487, 238593, 92384, 129380, 23848];

/// Seed for table initialisation, kept apart from [`THREAD_SEEDS`] so no
/// worker replays the stream that filled the tables.
pub const INIT_SEED: u64 = 4357;

/// Per-relation weights multiplying the step size of each relation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationWeights {
    /// Entity↔entity (default: 1.0).
    pub entity_entity: f32,
    /// Document↔entity (default: 1.0).
    pub doc_entity: f32,
    /// Document↔word (default: 1.0).
    pub doc_word: f32,
}

impl Default for RelationWeights {
    fn default() -> Self {
        Self {
            entity_entity: 1.0,
            doc_entity: 1.0,
            doc_word: 1.0,
        }
    }
}

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Embedding dimension (default: 100).
    pub dim: usize,
    /// Number of rounds (default: 10).
    pub rounds: usize,
    /// Worker threads (default: 4).
    pub threads: usize,
    /// Negative samples per positive pair (default: 5).
    pub negative_samples: usize,
    /// Initial learning rate (default: 0.025).
    pub starting_alpha: f32,
    /// Final learning rate (default: 0.0001).
    pub min_alpha: f32,
    /// Samples per thread between learning-rate updates (default: 10 000).
    pub decay_interval: u64,
    /// Samples per round per thread. `None` uses half the summed weight of
    /// the graphs being trained.
    pub samples_per_round: Option<u64>,
    /// Relation weights.
    pub weights: RelationWeights,
    /// Documents use one table for both entity and word relations.
    pub tied: bool,
    /// Rescale the graph-choice distribution by relation weights.
    pub weight_mix: bool,
    /// Override of [`THREAD_SEEDS`].
    pub seeds: Option<Vec<u64>>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dim: 100,
            rounds: 10,
            threads: 4,
            negative_samples: 5,
            starting_alpha: 0.025,
            min_alpha: 0.0001,
            decay_interval: DEFAULT_DECAY_INTERVAL,
            samples_per_round: None,
            weights: RelationWeights::default(),
            tied: false,
            weight_mix: false,
            seeds: None,
        }
    }
}

impl TrainConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Set embedding dimension.
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    /// Set number of rounds.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set negatives per pair.
    pub fn with_negative_samples(mut self, n: usize) -> Self {
        self.negative_samples = n;
        self
    }

    /// Set starting and minimum learning rates.
    pub fn with_alpha(mut self, starting: f32, min: f32) -> Self {
        self.starting_alpha = starting;
        self.min_alpha = min;
        self
    }

    /// Set the decay recomputation interval.
    pub fn with_decay_interval(mut self, interval: u64) -> Self {
        self.decay_interval = interval;
        self
    }

    /// Fix the number of samples per round.
    pub fn with_samples_per_round(mut self, n: u64) -> Self {
        self.samples_per_round = Some(n);
        self
    }

    /// Set relation weights.
    pub fn with_weights(mut self, weights: RelationWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Tie the two document tables.
    pub fn with_tied(mut self, tied: bool) -> Self {
        self.tied = tied;
        self
    }

    /// Scale the graph mix by relation weights.
    pub fn with_weight_mix(mut self, weight_mix: bool) -> Self {
        self.weight_mix = weight_mix;
        self
    }

    /// Override per-thread seeds.
    pub fn with_seeds(mut self, seeds: Vec<u64>) -> Self {
        self.seeds = Some(seeds);
        self
    }

    /// Seed for worker `i`.
    ///
    /// Uses the override list if given, otherwise [`THREAD_SEEDS`]. Indices
    /// past the end of the table wrap and are mixed with the wrap count, so
    /// any thread count gets distinct fixed seeds.
    pub fn seed_for(&self, i: usize) -> u64 {
        let table: &[u64] = match &self.seeds {
            Some(s) if !s.is_empty() => s,
            _ => &THREAD_SEEDS,
        };
        let base = table[i % table.len()];
        let wrap = (i / table.len()) as u64;
        base ^ wrap.wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    /// Reject configurations that cannot train.
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 {
            return Err(Error::Config("dim must be positive".into()));
        }
        if self.rounds == 0 {
            return Err(Error::Config("rounds must be positive".into()));
        }
        if self.threads == 0 {
            return Err(Error::Config("threads must be positive".into()));
        }
        if self.decay_interval == 0 {
            return Err(Error::Config("decay_interval must be positive".into()));
        }
        for (name, alpha) in [
            ("starting_alpha", self.starting_alpha),
            ("min_alpha", self.min_alpha),
        ] {
            if !alpha.is_finite() || alpha <= 0.0 {
                return Err(Error::Config(format!(
                    "{} must be positive and finite, got {}",
                    name, alpha
                )));
            }
        }
        if self.min_alpha > self.starting_alpha {
            return Err(Error::Config(format!(
                "min_alpha {} exceeds starting_alpha {}",
                self.min_alpha, self.starting_alpha
            )));
        }
        let w = &self.weights;
        for (name, weight) in [
            ("entity_entity", w.entity_entity),
            ("doc_entity", w.doc_entity),
            ("doc_word", w.doc_word),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Config(format!(
                    "weight {} must be non-negative, got {}",
                    name, weight
                )));
            }
        }
        if self.samples_per_round == Some(0) {
            return Err(Error::Config("samples_per_round must be positive".into()));
        }
        Ok(())
    }
}
