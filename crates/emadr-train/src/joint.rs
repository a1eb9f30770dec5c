//! Multi-threaded joint training over several relations.
//!
//! # Proportional Mixing
//!
//! Each sample first picks a relation from a categorical distribution
//! proportional to the relations' total edge weights (optionally multiplied
//! by the relation weights), then draws an edge from that relation's graph:
//!
//! ```text
//! P(relation k) = W_k / Σⱼ W_j
//! P(edge e | k) = w_e / W_k
//! ```
//!
//! so every edge of every graph is visited at the rate it would be in one
//! merged edge list, without ever building that list.
//!
//! # Threads
//!
//! Every worker owns a [`XorShiftRng`] seeded from the fixed seed table and
//! its own gradient scratch buffers, and runs the full `rounds ×
//! samples_per_round` loop. Tables, samplers and the sigmoid table are
//! shared; tables are written without locks (see [`crate::table`]). The
//! learning rate decays over the samples of *all* threads.
//!
//! Only the set of seeds is reproducible. With more than one thread the
//! update order, and therefore the final vectors, vary between runs.

use crate::config::TrainConfig;
use crate::kernel::Scratch;
use crate::relation::Relation;
use crate::schedule::{LearningRate, LearningRateSchedule};
use crate::{Error, Result};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Progress reported by worker 0 at the start of each round.
#[derive(Debug, Clone, Copy)]
pub struct RoundProgress<'a> {
    /// Name of the training run (e.g. `"joint"`).
    pub run: &'a str,
    /// Round about to start (0-based).
    pub round: usize,
    /// Total rounds.
    pub rounds: usize,
    /// Current learning rate.
    pub learning_rate: f32,
}

/// Callback for training progress.
pub type ProgressCallback = Box<dyn Fn(&RoundProgress<'_>) + Send + Sync>;

/// Per-relation outcome of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationReport {
    /// Relation name.
    pub name: String,
    /// Edges sampled from this relation, across all threads.
    pub samples: u64,
    /// Edges of the graph never sampled during the run.
    pub unused_edges: usize,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Per-relation counts, in relation order.
    pub relations: Vec<RelationReport>,
    /// Samples per round per thread.
    pub samples_per_round: u64,
    /// Learning rate at the end of the run.
    pub final_learning_rate: f32,
    /// Wall-clock training time.
    pub elapsed: Duration,
}

impl TrainingReport {
    /// Total edges sampled.
    pub fn total_samples(&self) -> u64 {
        self.relations.iter().map(|r| r.samples).sum()
    }
}

/// Hogwild trainer over a fixed set of relations.
#[derive(Debug)]
pub struct JointTrainer {
    name: String,
    config: TrainConfig,
    relations: Vec<Relation>,
    mix: WeightedIndex<f64>,
    samples_per_round: u64,
}

impl JointTrainer {
    /// Validate the configuration and relations and build the relation mix.
    pub fn new(
        name: impl Into<String>,
        config: TrainConfig,
        relations: Vec<Relation>,
    ) -> Result<Self> {
        config.validate()?;
        if relations.is_empty() {
            return Err(Error::Config("at least one relation is required".into()));
        }
        for r in &relations {
            r.validate()?;
        }

        let mix_weights: Vec<f64> = relations
            .iter()
            .map(|r| {
                let w = r.sampler().total_weight() as f64;
                if config.weight_mix {
                    w * f64::from(r.weight())
                } else {
                    w
                }
            })
            .collect();
        let mix = WeightedIndex::new(&mix_weights)
            .map_err(|e| Error::Config(format!("relation mix: {}", e)))?;

        let total_weight: u64 = relations.iter().map(|r| r.sampler().total_weight()).sum();
        let samples_per_round = config.samples_per_round.unwrap_or((total_weight / 2).max(1));

        let name = name.into();
        let mix_total: f64 = mix_weights.iter().sum();
        for (r, w) in relations.iter().zip(&mix_weights) {
            info!(
                run = %name,
                relation = r.name(),
                edges_weight = r.sampler().total_weight(),
                share = w / mix_total,
                weight = r.weight(),
                "relation mix"
            );
        }
        info!(
            run = %name,
            samples_per_round,
            threads = config.threads,
            rounds = config.rounds,
            "trainer ready"
        );

        Ok(Self {
            name,
            config,
            relations,
            mix,
            samples_per_round,
        })
    }

    /// Relations in mix order.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Samples per round per thread.
    pub fn samples_per_round(&self) -> u64 {
        self.samples_per_round
    }

    /// Planned samples across all threads.
    pub fn total_samples(&self) -> u64 {
        self.config.threads as u64 * self.config.rounds as u64 * self.samples_per_round
    }

    /// Run to completion.
    pub fn train(&self) -> Result<TrainingReport> {
        self.train_with_callback(None)
    }

    /// Run to completion, reporting each round start to `progress`.
    pub fn train_with_callback(
        &self,
        progress: Option<&ProgressCallback>,
    ) -> Result<TrainingReport> {
        let schedule = LearningRateSchedule::new(
            self.config.starting_alpha,
            self.config.min_alpha,
            self.total_samples(),
        )
        .with_interval(self.config.decay_interval);
        let learning_rate = LearningRate::new(schedule);
        let start = Instant::now();

        let per_worker: Vec<Result<Vec<u64>>> = thread::scope(|s| {
            let handles: Vec<_> = (0..self.config.threads)
                .map(|id| {
                    let learning_rate = &learning_rate;
                    s.spawn(move || self.run_worker(id, learning_rate, progress))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(id, h)| h.join().map_err(|_| Error::WorkerPanicked(id)))
                .collect()
        });

        let mut samples = vec![0u64; self.relations.len()];
        for counts in per_worker {
            for (total, c) in samples.iter_mut().zip(counts?) {
                *total += c;
            }
        }

        let report = TrainingReport {
            relations: self
                .relations
                .iter()
                .zip(samples)
                .map(|(r, samples)| RelationReport {
                    name: r.name().to_string(),
                    samples,
                    unused_edges: r.sampler().unused_edges(),
                })
                .collect(),
            samples_per_round: self.samples_per_round,
            final_learning_rate: learning_rate.current(),
            elapsed: start.elapsed(),
        };
        for r in &report.relations {
            debug!(
                run = %self.name,
                relation = %r.name,
                samples = r.samples,
                unused_edges = r.unused_edges,
                "relation done"
            );
        }
        info!(
            run = %self.name,
            samples = report.total_samples(),
            final_alpha = report.final_learning_rate,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "training finished"
        );
        Ok(report)
    }

    fn run_worker(
        &self,
        id: usize,
        learning_rate: &LearningRate,
        progress: Option<&ProgressCallback>,
    ) -> Vec<u64> {
        let mut rng = XorShiftRng::seed_from_u64(self.config.seed_for(id));
        let mut scratch: Vec<Scratch> = self
            .relations
            .iter()
            .map(|r| Scratch::for_kernel(r.kernel()))
            .collect();
        let mut counts = vec![0u64; self.relations.len()];
        let mut step = 0u64;

        for round in 0..self.config.rounds {
            if id == 0 {
                let alpha = learning_rate.current();
                debug!(run = %self.name, round, alpha, "round start");
                if let Some(cb) = progress {
                    cb(&RoundProgress {
                        run: &self.name,
                        round,
                        rounds: self.config.rounds,
                        learning_rate: alpha,
                    });
                }
            }
            for _ in 0..self.samples_per_round {
                let alpha = learning_rate.tick(step);
                step += 1;
                let k = self.mix.sample(&mut rng);
                self.relations[k].train_sample(&mut rng, alpha, &mut scratch[k]);
                counts[k] += 1;
            }
        }
        counts
    }
}
