//! Training pipelines for entity, document and word embeddings.
//!
//! | Pipeline | Graphs | Trained | Frozen |
//! |----------|--------|---------|--------|
//! | [`Pipeline::all_joint`] | e↔e, d↔e, d↔w | entities, docs, words | - |
//! | [`Pipeline::doc_word`] | d↔w | docs, words | - |
//! | [`Pipeline::doc_word_fixed`] | d↔w | docs | words |
//! | [`Pipeline::docs_fixed_targets`] | d↔e, d↔w | docs (one table) | words, entities |
//! | [`Pipeline::new_docs`] | d↔e then d↔w | docs (two tables) | words, entities |
//! | [`Pipeline::entity_net`] | e↔e | entities | - |
//!
//! Initialisation is the same everywhere: tables used as a source are
//! uniform `(r - 0.5) / dim`, tables used only as targets start at zero, and
//! pretrained tables are loaded as given. In the joint pipeline the entity
//! source table is also the target of the document↔entity relation, which
//! ties documents and the entity↔entity model into one entity space.

use crate::config::{TrainConfig, INIT_SEED};
use crate::joint::{JointTrainer, ProgressCallback, TrainingReport};
use crate::kernel::UpdateMask;
use crate::relation::Relation;
use crate::sigmoid::SigmoidTable;
use crate::table::{EmbeddingTable, SharedTable};
use crate::trainer::NegativeSamplingTrainer;
use crate::{Error, Result};
use emadr_core::{BipartiteGraph, EdgeSampler, NegativeDistribution, VectorSet};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use std::sync::Arc;
use tracing::info;

/// Optional raw counts for negative sampling, per target space.
///
/// When absent, negatives follow the right-vertex weights of the graph.
#[derive(Debug, Clone, Default)]
pub struct NegativeCounts {
    /// Entity counts (frequency file).
    pub entities: Option<Vec<u64>>,
    /// Word counts (frequency file).
    pub words: Option<Vec<u64>>,
}

/// Document vectors produced by a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum DocVectors {
    /// One table serves both the entity and word relations.
    Tied(VectorSet),
    /// Separate tables, exported concatenated (entity half first).
    Split {
        /// Documents as predictors of entities.
        entity: VectorSet,
        /// Documents as predictors of words.
        word: VectorSet,
    },
}

/// Result of [`Pipeline::all_joint`].
#[derive(Debug, Clone)]
pub struct JointOutput {
    /// Document vectors.
    pub docs: DocVectors,
    /// Word vectors.
    pub words: VectorSet,
    /// Entity (source) vectors.
    pub entities: VectorSet,
    /// Run summary.
    pub report: TrainingReport,
}

/// Result of [`Pipeline::doc_word`].
#[derive(Debug, Clone)]
pub struct DocWordOutput {
    /// Document vectors.
    pub docs: VectorSet,
    /// Word vectors.
    pub words: VectorSet,
    /// Run summary.
    pub report: TrainingReport,
}

/// Result of pipelines that only train documents.
#[derive(Debug, Clone)]
pub struct DocOutput {
    /// Document vectors.
    pub docs: DocVectors,
    /// One summary per training phase.
    pub reports: Vec<TrainingReport>,
}

/// Result of [`Pipeline::entity_net`].
#[derive(Debug, Clone)]
pub struct EntityNetOutput {
    /// Entity source vectors.
    pub source: VectorSet,
    /// Entity target vectors.
    pub target: VectorSet,
    /// Run summary.
    pub report: TrainingReport,
}

/// Runs the training pipelines under one configuration.
pub struct Pipeline {
    config: TrainConfig,
    sigmoid: Arc<SigmoidTable>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Validate `config` and build the shared sigmoid table.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sigmoid: Arc::new(SigmoidTable::default()),
            progress: None,
        })
    }

    /// Report round starts to `callback`.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Entities, documents and words trained jointly from all three graphs.
    ///
    /// - e↔e: entity source → entity target, both directions
    /// - d↔e: doc (entity role) → entity source
    /// - d↔w: doc (word role) → word
    ///
    /// With `config.tied` both document roles share one table.
    pub fn all_joint(
        &self,
        entity_entity: BipartiteGraph,
        doc_entity: BipartiteGraph,
        doc_word: BipartiteGraph,
        counts: &NegativeCounts,
    ) -> Result<JointOutput> {
        let num_entities = entity_entity.num_left();
        let num_docs = doc_word.num_left();
        let num_words = doc_word.num_right();
        expect_sides("entity-entity graph", &entity_entity, num_entities, num_entities)?;
        expect_sides("doc-entity graph", &doc_entity, num_docs, num_entities)?;

        let dim = self.config.dim;
        let mut rng = init_rng();
        let entity_source = EmbeddingTable::uniform(num_entities, dim, &mut rng).shared();
        let entity_target = EmbeddingTable::zeros(num_entities, dim).shared();
        let words = EmbeddingTable::zeros(num_words, dim).shared();
        let doc_word_table = EmbeddingTable::uniform(num_docs, dim, &mut rng).shared();
        let doc_entity_table = if self.config.tied {
            Arc::clone(&doc_word_table)
        } else {
            EmbeddingTable::uniform(num_docs, dim, &mut rng).shared()
        };

        let entity_negatives = negatives(counts.entities.as_deref(), &doc_entity)?;
        let word_negatives = negatives(counts.words.as_deref(), &doc_word)?;
        let w = self.config.weights;

        let relations = vec![
            self.relation(
                "entity-entity",
                entity_entity,
                &entity_source,
                &entity_target,
                &entity_negatives,
            )?
            .with_symmetric(true)
            .with_weight(w.entity_entity),
            self.relation(
                "doc-entity",
                doc_entity,
                &doc_entity_table,
                &entity_source,
                &entity_negatives,
            )?
            .with_weight(w.doc_entity),
            self.relation("doc-word", doc_word, &doc_word_table, &words, &word_negatives)?
                .with_weight(w.doc_word),
        ];

        let report = self.run("joint", relations)?;
        let docs = if self.config.tied {
            DocVectors::Tied(doc_word_table.to_vectors())
        } else {
            DocVectors::Split {
                entity: doc_entity_table.to_vectors(),
                word: doc_word_table.to_vectors(),
            }
        };
        Ok(JointOutput {
            docs,
            words: words.to_vectors(),
            entities: entity_source.to_vectors(),
            report,
        })
    }

    /// Documents and words from the document↔word graph alone.
    pub fn doc_word(
        &self,
        doc_word: BipartiteGraph,
        counts: &NegativeCounts,
    ) -> Result<DocWordOutput> {
        let dim = self.config.dim;
        let mut rng = init_rng();
        let docs = EmbeddingTable::uniform(doc_word.num_left(), dim, &mut rng).shared();
        let words = EmbeddingTable::zeros(doc_word.num_right(), dim).shared();
        let word_negatives = negatives(counts.words.as_deref(), &doc_word)?;

        let relation = self
            .relation("doc-word", doc_word, &docs, &words, &word_negatives)?
            .with_weight(self.config.weights.doc_word);
        let report = self.run("doc-word", vec![relation])?;
        Ok(DocWordOutput {
            docs: docs.to_vectors(),
            words: words.to_vectors(),
            report,
        })
    }

    /// Documents against pretrained, frozen word vectors.
    pub fn doc_word_fixed(
        &self,
        doc_word: BipartiteGraph,
        counts: &NegativeCounts,
        words: &VectorSet,
    ) -> Result<DocOutput> {
        let mut rng = init_rng();
        let (docs, report) = self.train_docs_against_fixed(
            "doc-word-fixed",
            doc_word,
            counts.words.as_deref(),
            words,
            "word vectors",
            &mut rng,
        )?;
        Ok(DocOutput {
            docs: DocVectors::Tied(docs.to_vectors()),
            reports: vec![report],
        })
    }

    /// One document table trained against both pretrained word and entity
    /// vectors, both frozen.
    pub fn docs_fixed_targets(
        &self,
        doc_word: BipartiteGraph,
        doc_entity: BipartiteGraph,
        counts: &NegativeCounts,
        words: &VectorSet,
        entities: &VectorSet,
    ) -> Result<DocOutput> {
        let num_docs = doc_word.num_left();
        if doc_entity.num_left() != num_docs {
            return Err(Error::shape(
                "doc-entity graph left vertices",
                num_docs,
                doc_entity.num_left(),
            ));
        }
        let dim = self.config.dim;
        words.expect_shape("word vectors", doc_word.num_right(), dim)?;
        entities.expect_shape("entity vectors", doc_entity.num_right(), dim)?;

        let mut rng = init_rng();
        let docs = EmbeddingTable::uniform(num_docs, dim, &mut rng).shared();
        let word_table = EmbeddingTable::from_vectors(words).shared();
        let entity_table = EmbeddingTable::from_vectors(entities).shared();
        let word_negatives = negatives(counts.words.as_deref(), &doc_word)?;
        let entity_negatives = negatives(counts.entities.as_deref(), &doc_entity)?;

        let relations = vec![
            self.relation("doc-entity", doc_entity, &docs, &entity_table, &entity_negatives)?
                .with_update(UpdateMask::SOURCE_ONLY),
            self.relation("doc-word", doc_word, &docs, &word_table, &word_negatives)?
                .with_update(UpdateMask::SOURCE_ONLY),
        ];
        let report = self.run("docs-fixed-targets", relations)?;
        Ok(DocOutput {
            docs: DocVectors::Tied(docs.to_vectors()),
            reports: vec![report],
        })
    }

    /// Vectors for new documents in two phases: first the entity role
    /// against frozen entity vectors, then the word role against frozen word
    /// vectors. The output is split (entity half first).
    pub fn new_docs(
        &self,
        doc_word: BipartiteGraph,
        doc_entity: BipartiteGraph,
        counts: &NegativeCounts,
        words: &VectorSet,
        entities: &VectorSet,
    ) -> Result<DocOutput> {
        if doc_word.num_left() != doc_entity.num_left() {
            return Err(Error::shape(
                "document count of doc-entity graph",
                doc_word.num_left(),
                doc_entity.num_left(),
            ));
        }
        // Both phases draw from one stream so the two halves start apart.
        let mut rng = init_rng();
        let (entity_docs, entity_report) = self.train_docs_against_fixed(
            "new-docs/entities",
            doc_entity,
            counts.entities.as_deref(),
            entities,
            "entity vectors",
            &mut rng,
        )?;
        let (word_docs, word_report) = self.train_docs_against_fixed(
            "new-docs/words",
            doc_word,
            counts.words.as_deref(),
            words,
            "word vectors",
            &mut rng,
        )?;
        Ok(DocOutput {
            docs: DocVectors::Split {
                entity: entity_docs.to_vectors(),
                word: word_docs.to_vectors(),
            },
            reports: vec![entity_report, word_report],
        })
    }

    /// Entities from the entity↔entity graph alone; returns both tables.
    pub fn entity_net(
        &self,
        entity_entity: BipartiteGraph,
        counts: &NegativeCounts,
    ) -> Result<EntityNetOutput> {
        let n = entity_entity.num_left();
        expect_sides("entity-entity graph", &entity_entity, n, n)?;
        let dim = self.config.dim;
        let mut rng = init_rng();
        let source = EmbeddingTable::uniform(n, dim, &mut rng).shared();
        let target = EmbeddingTable::zeros(n, dim).shared();
        let entity_negatives = negatives(counts.entities.as_deref(), &entity_entity)?;

        let relation = self
            .relation("entity-entity", entity_entity, &source, &target, &entity_negatives)?
            .with_symmetric(true)
            .with_weight(self.config.weights.entity_entity);
        let report = self.run("entity-net", vec![relation])?;
        Ok(EntityNetOutput {
            source: source.to_vectors(),
            target: target.to_vectors(),
            report,
        })
    }

    fn train_docs_against_fixed(
        &self,
        run: &str,
        graph: BipartiteGraph,
        counts: Option<&[u64]>,
        fixed: &VectorSet,
        label: &str,
        rng: &mut XorShiftRng,
    ) -> Result<(SharedTable, TrainingReport)> {
        let dim = self.config.dim;
        fixed.expect_shape(label, graph.num_right(), dim)?;

        let docs = EmbeddingTable::uniform(graph.num_left(), dim, rng).shared();
        let targets = EmbeddingTable::from_vectors(fixed).shared();
        let negatives = negatives(counts, &graph)?;

        let relation = self
            .relation(run, graph, &docs, &targets, &negatives)?
            .with_update(UpdateMask::SOURCE_ONLY);
        let report = self.run(run, vec![relation])?;
        Ok((docs, report))
    }

    fn relation(
        &self,
        name: &str,
        graph: BipartiteGraph,
        source: &SharedTable,
        target: &SharedTable,
        negatives: &Arc<NegativeDistribution>,
    ) -> Result<Relation> {
        let sampler = Arc::new(EdgeSampler::with_negatives(graph, Arc::clone(negatives))?);
        let trainer = NegativeSamplingTrainer::new(
            Arc::clone(&self.sigmoid),
            Arc::clone(negatives),
            self.config.negative_samples,
        );
        Ok(Relation::new(name, sampler, Arc::clone(source), Arc::clone(target), trainer))
    }

    fn run(&self, name: &str, relations: Vec<Relation>) -> Result<TrainingReport> {
        info!(run = name, dim = self.config.dim, tied = self.config.tied, "starting");
        let trainer = JointTrainer::new(name, self.config.clone(), relations)?;
        trainer.train_with_callback(self.progress.as_ref())
    }
}

fn init_rng() -> XorShiftRng {
    XorShiftRng::seed_from_u64(INIT_SEED)
}

/// Negatives for a graph's right side: from counts if given, otherwise from
/// the graph's right-vertex weights.
fn negatives(counts: Option<&[u64]>, graph: &BipartiteGraph) -> Result<Arc<NegativeDistribution>> {
    let dist = match counts {
        Some(c) => {
            if c.len() != graph.num_right() {
                return Err(Error::shape("frequency count entries", graph.num_right(), c.len()));
            }
            NegativeDistribution::from_counts(c)?
        }
        None => NegativeDistribution::from_counts(&graph.right_weights())?,
    };
    Ok(Arc::new(dist))
}

fn expect_sides(what: &str, graph: &BipartiteGraph, left: usize, right: usize) -> Result<()> {
    if graph.num_left() != left {
        return Err(Error::shape(format!("{} left vertices", what), left, graph.num_left()));
    }
    if graph.num_right() != right {
        return Err(Error::shape(format!("{} right vertices", what), right, graph.num_right()));
    }
    Ok(())
}
