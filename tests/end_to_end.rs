//! End-to-end training runs on small synthetic graphs.

use emadr::{BipartiteGraph, DocVectors, NegativeCounts, Pipeline, TrainConfig, VectorSet};

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Documents {0, 1} use words {0, 1}; document 2 uses words {2, 3}.
fn block_graph() -> BipartiteGraph {
    BipartiteGraph::from_adjacency(
        3,
        4,
        vec![vec![(0, 1), (1, 1)], vec![(0, 1), (1, 1)], vec![(2, 1), (3, 1)]],
    )
    .unwrap()
}

fn config() -> TrainConfig {
    TrainConfig::default()
        .with_dim(8)
        .with_threads(1)
        .with_negative_samples(5)
        .with_rounds(50)
        .with_samples_per_round(1000)
        .with_alpha(0.025, 0.0001)
}

fn assert_edges_beat_non_edges(graph: &BipartiteGraph, docs: &VectorSet, words: &VectorSet) {
    for d in 0..graph.num_left() {
        let linked = graph.neighbors(d);
        let (mut min_edge, mut max_non_edge) = (f32::INFINITY, f32::NEG_INFINITY);
        for w in 0..graph.num_right() {
            let score = dot(docs.row(d), words.row(w));
            if linked.contains(&(w as u32)) {
                min_edge = min_edge.min(score);
            } else {
                max_non_edge = max_non_edge.max(score);
            }
        }
        assert!(
            min_edge > max_non_edge,
            "doc {}: weakest edge {} vs strongest non-edge {}",
            d,
            min_edge,
            max_non_edge
        );
    }
}

#[test]
fn test_held_out_pair_scores_below_edges() {
    // Every doc-word pair except (2, 3).
    let adjacency = (0..3u32)
        .map(|d| (0..4u32).filter(|&w| (d, w) != (2, 3)).map(|w| (w, 1)).collect())
        .collect();
    let graph = BipartiteGraph::from_adjacency(3, 4, adjacency).unwrap();
    let out = Pipeline::new(config())
        .unwrap()
        .doc_word(graph.clone(), &NegativeCounts::default())
        .unwrap();

    let held_out = dot(out.docs.row(2), out.words.row(3));
    for (d, w) in graph.edges().map(|(d, w, _)| (d, w as usize)) {
        let score = dot(out.docs.row(d), out.words.row(w));
        assert!(score > held_out, "edge ({}, {}) scored {} vs held-out {}", d, w, score, held_out);
    }
}

#[test]
fn test_doc_word_separates_blocks() {
    let graph = block_graph();
    let out = Pipeline::new(config())
        .unwrap()
        .doc_word(graph.clone(), &NegativeCounts::default())
        .unwrap();

    assert_eq!(out.report.total_samples(), 50 * 1000);
    assert_eq!(out.report.relations[0].unused_edges, 0);
    assert_edges_beat_non_edges(&graph, &out.docs, &out.words);
}

#[test]
fn test_doc_word_with_threads() {
    let graph = block_graph();
    let out = Pipeline::new(config().with_threads(4).with_samples_per_round(250))
        .unwrap()
        .doc_word(graph.clone(), &NegativeCounts::default())
        .unwrap();

    assert_eq!(out.report.total_samples(), 50 * 1000);
    assert_edges_beat_non_edges(&graph, &out.docs, &out.words);
}

#[test]
fn test_fixed_words_then_docs() {
    let graph = block_graph();
    let pipeline = Pipeline::new(config()).unwrap();
    let first = pipeline.doc_word(graph.clone(), &NegativeCounts::default()).unwrap();

    // Retrain documents from scratch against the frozen word vectors
    let out = pipeline
        .doc_word_fixed(graph.clone(), &NegativeCounts::default(), &first.words)
        .unwrap();
    let docs = match out.docs {
        DocVectors::Tied(docs) => docs,
        DocVectors::Split { .. } => panic!("doc-word-fixed produces one document table"),
    };
    assert_edges_beat_non_edges(&graph, &docs, &first.words);
}
