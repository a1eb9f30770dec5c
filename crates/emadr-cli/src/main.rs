//! emadr CLI - train joint entity/document/word embeddings from binary
//! relation graphs.
//!
//! # Usage
//!
//! ```bash
//! # Inspect an adjacency file
//! emadr stats doc_words.bin
//!
//! # Joint training over all three graphs
//! emadr joint --entity-entity ee.bin --doc-entity de.bin --doc-word dw.bin \
//!     --out-docs docs.bin --out-words words.bin --out-entities entities.bin \
//!     --dim 100 --rounds 10 --threads 8
//!
//! # Documents and words only, settings from a JSON file
//! emadr doc-word --doc-word dw.bin --out-docs docs.bin --config train.json
//!
//! # New documents against pretrained vectors
//! emadr new-docs --doc-word dw.bin --doc-entity de.bin \
//!     --word-vectors words.bin --entity-vectors entities.bin --out-docs new.bin
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use emadr_core::formats::{
    load_adjacency, load_frequencies, load_vectors, save_concatenated, save_vectors,
};
use emadr_core::{BipartiteGraph, VectorSet};
use emadr_train::{
    DocVectors, NegativeCounts, Pipeline, ProgressCallback, RelationWeights, RoundProgress,
    TrainConfig, TrainingReport,
};
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "emadr")]
#[command(about = "Joint entity, document and word embeddings", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show statistics about adjacency files
    Stats {
        /// Adjacency files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Train entities, documents and words jointly
    Joint {
        /// Entity-entity adjacency file
        #[arg(long)]
        entity_entity: PathBuf,

        /// Document-entity adjacency file
        #[arg(long)]
        doc_entity: PathBuf,

        /// Document-word adjacency file
        #[arg(long)]
        doc_word: PathBuf,

        #[command(flatten)]
        freqs: FrequencyArgs,

        /// Output document vectors (concatenated unless --tied)
        #[arg(long)]
        out_docs: PathBuf,

        /// Output word vectors
        #[arg(long)]
        out_words: PathBuf,

        /// Output entity vectors
        #[arg(long)]
        out_entities: PathBuf,

        #[command(flatten)]
        train: TrainArgs,
    },

    /// Train documents and words from the document-word graph
    DocWord {
        /// Document-word adjacency file
        #[arg(long)]
        doc_word: PathBuf,

        #[command(flatten)]
        freqs: FrequencyArgs,

        /// Output document vectors
        #[arg(long)]
        out_docs: PathBuf,

        /// Output word vectors
        #[arg(long)]
        out_words: Option<PathBuf>,

        #[command(flatten)]
        train: TrainArgs,
    },

    /// Train documents against pretrained, frozen vectors
    DocFixed {
        /// Document-word adjacency file
        #[arg(long)]
        doc_word: PathBuf,

        /// Pretrained word vectors
        #[arg(long)]
        word_vectors: PathBuf,

        /// Document-entity adjacency file (requires --entity-vectors)
        #[arg(long, requires = "entity_vectors")]
        doc_entity: Option<PathBuf>,

        /// Pretrained entity vectors (requires --doc-entity)
        #[arg(long, requires = "doc_entity")]
        entity_vectors: Option<PathBuf>,

        #[command(flatten)]
        freqs: FrequencyArgs,

        /// Output document vectors
        #[arg(long)]
        out_docs: PathBuf,

        #[command(flatten)]
        train: TrainArgs,
    },

    /// Bootstrap vectors for new documents in two phases
    NewDocs {
        /// Document-word adjacency file
        #[arg(long)]
        doc_word: PathBuf,

        /// Document-entity adjacency file
        #[arg(long)]
        doc_entity: PathBuf,

        /// Pretrained word vectors
        #[arg(long)]
        word_vectors: PathBuf,

        /// Pretrained entity vectors
        #[arg(long)]
        entity_vectors: PathBuf,

        #[command(flatten)]
        freqs: FrequencyArgs,

        /// Output document vectors (entity half first)
        #[arg(long)]
        out_docs: PathBuf,

        #[command(flatten)]
        train: TrainArgs,
    },

    /// Train entities from the entity-entity graph
    EntityNet {
        /// Entity-entity adjacency file
        #[arg(long)]
        entity_entity: PathBuf,

        #[command(flatten)]
        freqs: FrequencyArgs,

        /// Output entity source vectors
        #[arg(long)]
        out_source: PathBuf,

        /// Output entity target vectors
        #[arg(long)]
        out_target: Option<PathBuf>,

        #[command(flatten)]
        train: TrainArgs,
    },
}

#[derive(Args)]
struct FrequencyArgs {
    /// Entity frequency file for negative sampling
    #[arg(long)]
    entity_freq: Option<PathBuf>,

    /// Word frequency file for negative sampling
    #[arg(long)]
    word_freq: Option<PathBuf>,
}

/// Flags override fields of `--config`.
#[derive(Args)]
struct TrainArgs {
    /// JSON training configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Embedding dimension
    #[arg(long)]
    dim: Option<usize>,

    /// Number of rounds
    #[arg(long)]
    rounds: Option<usize>,

    /// Worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Negative samples per positive pair
    #[arg(long)]
    negative: Option<usize>,

    /// Starting learning rate
    #[arg(long)]
    alpha: Option<f32>,

    /// Minimum learning rate
    #[arg(long)]
    min_alpha: Option<f32>,

    /// Samples per round per thread
    #[arg(long)]
    samples_per_round: Option<u64>,

    /// Samples between learning-rate updates
    #[arg(long)]
    decay_interval: Option<u64>,

    /// Entity-entity relation weight
    #[arg(long)]
    weight_ee: Option<f32>,

    /// Document-entity relation weight
    #[arg(long)]
    weight_de: Option<f32>,

    /// Document-word relation weight
    #[arg(long)]
    weight_dw: Option<f32>,

    /// Share one document table between entity and word relations
    #[arg(long)]
    tied: bool,

    /// Scale the graph mix by relation weights
    #[arg(long)]
    weight_mix: bool,
}

impl TrainArgs {
    fn to_config(&self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TrainConfig::default(),
        };
        if let Some(dim) = self.dim {
            config = config.with_dim(dim);
        }
        if let Some(rounds) = self.rounds {
            config = config.with_rounds(rounds);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if let Some(n) = self.negative {
            config = config.with_negative_samples(n);
        }
        let (start, min) = (
            self.alpha.unwrap_or(config.starting_alpha),
            self.min_alpha.unwrap_or(config.min_alpha),
        );
        config = config.with_alpha(start, min);
        if let Some(n) = self.samples_per_round {
            config = config.with_samples_per_round(n);
        }
        if let Some(interval) = self.decay_interval {
            config = config.with_decay_interval(interval);
        }
        let w = config.weights;
        config = config.with_weights(RelationWeights {
            entity_entity: self.weight_ee.unwrap_or(w.entity_entity),
            doc_entity: self.weight_de.unwrap_or(w.doc_entity),
            doc_word: self.weight_dw.unwrap_or(w.doc_word),
        });
        if self.tied {
            config = config.with_tied(true);
        }
        if self.weight_mix {
            config = config.with_weight_mix(true);
        }
        Ok(config)
    }

    fn pipeline(&self) -> Result<Pipeline> {
        let config = self.to_config()?;
        let pipeline = Pipeline::new(config).context("Invalid training configuration")?;
        let bar = progress_bar(pipeline.config().rounds)?;
        Ok(pipeline.with_progress(bar))
    }
}

impl FrequencyArgs {
    fn load(&self) -> Result<NegativeCounts> {
        Ok(NegativeCounts {
            entities: self.entity_freq.as_deref().map(load_freq).transpose()?,
            words: self.word_freq.as_deref().map(load_freq).transpose()?,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Stats { inputs } => cmd_stats(&inputs),
        Commands::Joint {
            entity_entity,
            doc_entity,
            doc_word,
            freqs,
            out_docs,
            out_words,
            out_entities,
            train,
        } => {
            let pipeline = train.pipeline()?;
            let out = pipeline.all_joint(
                load_graph(&entity_entity)?,
                load_graph(&doc_entity)?,
                load_graph(&doc_word)?,
                &freqs.load()?,
            )?;
            print_report(&out.report);
            save_docs(&out_docs, &out.docs)?;
            save(&out_words, &out.words)?;
            save(&out_entities, &out.entities)
        }
        Commands::DocWord {
            doc_word,
            freqs,
            out_docs,
            out_words,
            train,
        } => {
            let pipeline = train.pipeline()?;
            let out = pipeline.doc_word(load_graph(&doc_word)?, &freqs.load()?)?;
            print_report(&out.report);
            save(&out_docs, &out.docs)?;
            match out_words {
                Some(path) => save(&path, &out.words),
                None => Ok(()),
            }
        }
        Commands::DocFixed {
            doc_word,
            word_vectors,
            doc_entity,
            entity_vectors,
            freqs,
            out_docs,
            train,
        } => {
            let pipeline = train.pipeline()?;
            let words = load_pretrained(&word_vectors)?;
            let counts = freqs.load()?;
            let out = match (doc_entity, entity_vectors) {
                (Some(de), Some(ev)) => pipeline.docs_fixed_targets(
                    load_graph(&doc_word)?,
                    load_graph(&de)?,
                    &counts,
                    &words,
                    &load_pretrained(&ev)?,
                )?,
                _ => pipeline.doc_word_fixed(load_graph(&doc_word)?, &counts, &words)?,
            };
            out.reports.iter().for_each(print_report);
            save_docs(&out_docs, &out.docs)
        }
        Commands::NewDocs {
            doc_word,
            doc_entity,
            word_vectors,
            entity_vectors,
            freqs,
            out_docs,
            train,
        } => {
            let pipeline = train.pipeline()?;
            let out = pipeline.new_docs(
                load_graph(&doc_word)?,
                load_graph(&doc_entity)?,
                &freqs.load()?,
                &load_pretrained(&word_vectors)?,
                &load_pretrained(&entity_vectors)?,
            )?;
            out.reports.iter().for_each(print_report);
            save_docs(&out_docs, &out.docs)
        }
        Commands::EntityNet {
            entity_entity,
            freqs,
            out_source,
            out_target,
            train,
        } => {
            let pipeline = train.pipeline()?;
            let out = pipeline.entity_net(load_graph(&entity_entity)?, &freqs.load()?)?;
            print_report(&out.report);
            save(&out_source, &out.source)?;
            match out_target {
                Some(path) => save(&path, &out.target),
                None => Ok(()),
            }
        }
    }
}

fn progress_bar(rounds: usize) -> Result<ProgressCallback> {
    let pb = ProgressBar::new(rounds as u64).with_finish(ProgressFinish::AndClear);
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] round {pos}/{len} ({elapsed})")?
            .progress_chars("=> "),
    );
    Ok(Box::new(move |p: &RoundProgress<'_>| {
        // Multi-phase pipelines restart the bar
        if p.round == 0 {
            pb.reset();
            pb.set_length(p.rounds as u64);
        }
        pb.set_position(p.round as u64 + 1);
        pb.set_message(format!("{} alpha={:.5}", p.run, p.learning_rate));
    }))
}

fn load_graph(path: &Path) -> Result<BipartiteGraph> {
    load_adjacency(path)
        .with_context(|| format!("Failed to load adjacency list {}", path.display()))
}

fn load_freq(path: &Path) -> Result<Vec<u64>> {
    load_frequencies(path).with_context(|| format!("Failed to load frequencies {}", path.display()))
}

fn load_pretrained(path: &Path) -> Result<VectorSet> {
    load_vectors(path).with_context(|| format!("Failed to load vectors {}", path.display()))
}

fn save(path: &Path, vectors: &VectorSet) -> Result<()> {
    save_vectors(path, vectors).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), count = vectors.count(), dim = vectors.dim(), "saved vectors");
    Ok(())
}

fn save_docs(path: &Path, docs: &DocVectors) -> Result<()> {
    match docs {
        DocVectors::Tied(vectors) => save(path, vectors),
        DocVectors::Split { entity, word } => {
            save_concatenated(path, entity, word)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                path = %path.display(),
                count = entity.count(),
                dim = entity.dim() + word.dim(),
                "saved concatenated vectors"
            );
            Ok(())
        }
    }
}

fn print_report(report: &TrainingReport) {
    println!("Trained {} samples in {:.2?}", report.total_samples(), report.elapsed);
    for r in &report.relations {
        println!("  {:<16} {:>12} samples  {:>10} unused edges", r.name, r.samples, r.unused_edges);
    }
    println!("  final alpha      {:.6}", report.final_learning_rate);
}

fn cmd_stats(inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        let stats = load_graph(input)?.stats();

        println!("Graph: {}", input.display());
        println!("  Left vertices:  {}", stats.num_left);
        println!("  Right vertices: {}", stats.num_right);
        println!("  Edges:          {}", stats.num_edges);
        println!("  Total weight:   {}", stats.total_weight);
        println!("  Isolated left:  {}", stats.isolated_left);
        println!("  Isolated right: {}", stats.isolated_right);
        println!("  Max degree:     {}", stats.max_degree);
    }
    Ok(())
}
