//! Adjacency-list files.
//!
//! ```text
//! i32 num_left
//! i32 num_right
//! repeat num_left times:
//!     i32 count
//!     i32 ids[count]
//!     u16 weights[count]
//! ```

use super::{at_path, header_i32, read_counted, read_len, MAX_RESERVE};
use crate::graph::GraphBuilder;
use crate::{BipartiteGraph, Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

const CONTEXT: &str = "adjacency list";

/// Read a graph from an adjacency-list stream.
///
/// Negative header counts, truncation and out-of-range neighbor ids are
/// rejected with an error naming the offending vertex.
pub fn read_adjacency<R: Read>(mut reader: R) -> Result<BipartiteGraph> {
    let num_left = read_len(&mut reader, CONTEXT, "left vertex count")?;
    let num_right = read_len(&mut reader, CONTEXT, "right vertex count")?;

    let mut builder = GraphBuilder::with_capacity(num_left.min(MAX_RESERVE), num_right, 0);
    let mut targets = Vec::new();
    let mut weights = Vec::new();
    let mut bytes = Vec::new();

    for left in 0..num_left {
        let vertex = format!("vertex {}", left);
        let count = read_len(&mut reader, CONTEXT, &format!("neighbor count of {}", vertex))?;

        let what = format!("neighbor ids of {}", vertex);
        read_counted(&mut reader, &mut bytes, count, 4, CONTEXT, &what)?;
        targets.clear();
        for chunk in bytes.chunks_exact(4) {
            let id = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let id = u32::try_from(id).map_err(|_| {
                Error::InvalidGraph(format!("left vertex {} has negative neighbor id {}", left, id))
            })?;
            targets.push(id);
        }

        let what = format!("weights of {}", vertex);
        read_counted(&mut reader, &mut bytes, count, 2, CONTEXT, &what)?;
        weights.clear();
        weights.extend(bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])));

        builder.push_vertex(left, &targets, &weights)?;
    }

    let graph = builder.finish()?;
    debug!(
        left = graph.num_left(),
        right = graph.num_right(),
        edges = graph.num_edges(),
        "read adjacency list"
    );
    Ok(graph)
}

/// Write a graph as an adjacency-list stream.
pub fn write_adjacency<W: Write>(graph: &BipartiteGraph, mut writer: W) -> Result<()> {
    writer.write_all(&header_i32(graph.num_left(), CONTEXT, "left vertex count")?)?;
    writer.write_all(&header_i32(graph.num_right(), CONTEXT, "right vertex count")?)?;
    for left in 0..graph.num_left() {
        writer.write_all(&header_i32(graph.degree(left), CONTEXT, "neighbor count")?)?;
        for &id in graph.neighbors(left) {
            // Right ids are bounded by num_right, which fit the header above.
            writer.write_all(&(id as i32).to_le_bytes())?;
        }
        for &w in graph.weights(left) {
            writer.write_all(&w.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Load a graph from an adjacency-list file.
pub fn load_adjacency(path: impl AsRef<Path>) -> Result<BipartiteGraph> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_adjacency(BufReader::new(file)).map_err(|e| at_path(e, path))
}

/// Save a graph to an adjacency-list file.
pub fn save_adjacency(path: impl AsRef<Path>, graph: &BipartiteGraph) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_adjacency(graph, BufWriter::new(file)).map_err(|e| at_path(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn test_read_known_bytes() {
        let bytes = encode(&[
            &2i32.to_le_bytes(),
            &3i32.to_le_bytes(),
            // vertex 0: two neighbors
            &2i32.to_le_bytes(),
            &0i32.to_le_bytes(),
            &2i32.to_le_bytes(),
            &7u16.to_le_bytes(),
            &1u16.to_le_bytes(),
            // vertex 1: none
            &0i32.to_le_bytes(),
        ]);
        let graph = read_adjacency(bytes.as_slice()).unwrap();
        assert_eq!(graph.num_left(), 2);
        assert_eq!(graph.num_right(), 3);
        assert_eq!(graph.neighbors(0), &[0, 2]);
        assert_eq!(graph.weights(0), &[7, 1]);
        assert_eq!(graph.degree(1), 0);
    }

    #[test]
    fn test_write_then_read_file() {
        let graph = BipartiteGraph::from_adjacency(
            3,
            2,
            vec![vec![(1, 4)], vec![], vec![(0, 1), (1, 65535)]],
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        save_adjacency(&path, &graph).unwrap();
        assert_eq!(load_adjacency(&path).unwrap(), graph);
    }

    #[test]
    fn test_truncated_names_vertex() {
        let bytes = encode(&[
            &1i32.to_le_bytes(),
            &2i32.to_le_bytes(),
            &2i32.to_le_bytes(),
            &0i32.to_le_bytes(),
        ]);
        let err = read_adjacency(bytes.as_slice()).unwrap_err();
        match err {
            Error::Format { message, .. } => assert!(message.contains("vertex 0"), "{}", message),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_huge_neighbor_count_is_truncation() {
        let bytes = encode(&[&1i32.to_le_bytes(), &1i32.to_le_bytes(), &i32::MAX.to_le_bytes()]);
        match read_adjacency(bytes.as_slice()).unwrap_err() {
            Error::Format { message, .. } => {
                assert!(message.contains("truncated"), "{}", message);
                assert!(message.contains("vertex 0"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_huge_vertex_count_is_truncation() {
        let bytes = encode(&[&i32::MAX.to_le_bytes(), &1i32.to_le_bytes()]);
        assert!(matches!(read_adjacency(bytes.as_slice()), Err(Error::Format { .. })));
    }

    #[test]
    fn test_negative_count_rejected() {
        let bytes = encode(&[&1i32.to_le_bytes(), &1i32.to_le_bytes(), &(-3i32).to_le_bytes()]);
        assert!(matches!(read_adjacency(bytes.as_slice()), Err(Error::Format { .. })));

        let bytes = encode(&[&(-1i32).to_le_bytes(), &1i32.to_le_bytes()]);
        assert!(matches!(read_adjacency(bytes.as_slice()), Err(Error::Format { .. })));
    }

    #[test]
    fn test_out_of_range_neighbor_rejected() {
        let bytes = encode(&[
            &1i32.to_le_bytes(),
            &2i32.to_le_bytes(),
            &1i32.to_le_bytes(),
            &5i32.to_le_bytes(),
            &1u16.to_le_bytes(),
        ]);
        assert!(matches!(read_adjacency(bytes.as_slice()), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, [1u8, 0]).unwrap();
        match load_adjacency(&path).unwrap_err() {
            Error::Format { context, .. } => assert!(context.ends_with("short.bin")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
