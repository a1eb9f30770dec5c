//! Dense vector files.
//!
//! ```text
//! i32 count
//! i32 dim
//! f32 data[count * dim]      (row-major)
//! ```
//!
//! A *concatenated* file uses the same layout with `dim = dim_a + dim_b`,
//! each record being a row of table A followed by the same row of table B.

use super::{at_path, header_i32, read_counted, read_len, MAX_RESERVE};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const CONTEXT: &str = "vector file";

/// An owned table of `count` vectors of length `dim`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSet {
    count: usize,
    dim: usize,
    data: Vec<f32>,
}

impl VectorSet {
    /// Wrap a flat row-major buffer.
    pub fn new(count: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        let expected = count
            .checked_mul(dim)
            .ok_or_else(|| Error::format(CONTEXT, format!("{} × {} overflows", count, dim)))?;
        if data.len() != expected {
            return Err(Error::shape("vector data length", expected, data.len()));
        }
        Ok(Self { count, dim, data })
    }

    /// All-zero table.
    pub fn zeros(count: usize, dim: usize) -> Self {
        Self {
            count,
            dim,
            data: vec![0.0; count * dim],
        }
    }

    /// Number of vectors.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Vector length.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Row `i`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Mutable row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // Indexed rather than chunked so dim == 0 is allowed.
        (0..self.count).map(move |i| self.row(i))
    }

    /// Flat row-major payload.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume into the flat payload.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Check count and dimension against what the current run needs.
    ///
    /// `label` names the table in the error (e.g. "pretrained word vectors").
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

/// Read a vector table.
pub fn read_vectors<R: Read>(mut reader: R) -> Result<VectorSet> {
    let count = read_len(&mut reader, CONTEXT, "vector count")?;
    let dim = read_len(&mut reader, CONTEXT, "dimension")?;

    // Read row by row so a corrupt header fails on truncation instead of
    // reserving the full claimed size up front.
    let mut data = Vec::with_capacity(count.saturating_mul(dim).min(MAX_RESERVE));
    let mut bytes = Vec::new();
    for i in 0..count {
        read_counted(&mut reader, &mut bytes, dim, 4, CONTEXT, &format!("vector {}", i))?;
        data.extend(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
        );
    }
    VectorSet::new(count, dim, data)
}

fn write_header<W: Write>(writer: &mut W, count: usize, dim: usize) -> Result<()> {
    writer.write_all(&header_i32(count, CONTEXT, "vector count")?)?;
    writer.write_all(&header_i32(dim, CONTEXT, "dimension")?)?;
    Ok(())
}

fn write_row<W: Write>(writer: &mut W, row: &[f32]) -> Result<()> {
    for &x in row {
        writer.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

/// Write a vector table.
pub fn write_vectors<W: Write>(set: &VectorSet, mut writer: W) -> Result<()> {
    write_header(&mut writer, set.count, set.dim)?;
    write_row(&mut writer, &set.data)?;
    writer.flush()?;
    Ok(())
}

/// Write two tables with the same count as one table of width `dim_a + dim_b`.
pub fn write_concatenated<W: Write>(a: &VectorSet, b: &VectorSet, mut writer: W) -> Result<()> {
    if a.count != b.count {
        return Err(Error::shape("concatenated vector count", a.count, b.count));
    }
    write_header(&mut writer, a.count, a.dim + b.dim)?;
    for i in 0..a.count {
        write_row(&mut writer, a.row(i))?;
        write_row(&mut writer, b.row(i))?;
    }
    writer.flush()?;
    Ok(())
}

/// Split each record of a concatenated table at `first_dim`.
pub fn split_concatenated(set: &VectorSet, first_dim: usize) -> Result<(VectorSet, VectorSet)> {
    if first_dim > set.dim {
        return Err(Error::shape("split point", set.dim, first_dim));
    }
    let second_dim = set.dim - first_dim;
    let mut a = Vec::with_capacity(set.count * first_dim);
    let mut b = Vec::with_capacity(set.count * second_dim);
    for i in 0..set.count {
        let (left, right) = set.row(i).split_at(first_dim);
        a.extend_from_slice(left);
        b.extend_from_slice(right);
    }
    Ok((
        VectorSet::new(set.count, first_dim, a)?,
        VectorSet::new(set.count, second_dim, b)?,
    ))
}

/// Load a vector file.
pub fn load_vectors(path: impl AsRef<Path>) -> Result<VectorSet> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_vectors(BufReader::new(file)).map_err(|e| at_path(e, path))
}

/// Save a vector file.
pub fn save_vectors(path: impl AsRef<Path>, set: &VectorSet) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_vectors(set, BufWriter::new(file)).map_err(|e| at_path(e, path))
}

/// Save two tables as one concatenated vector file.
pub fn save_concatenated(path: impl AsRef<Path>, a: &VectorSet, b: &VectorSet) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_concatenated(a, b, BufWriter::new(file)).map_err(|e| at_path(e, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(count: usize, dim: usize, offset: f32) -> VectorSet {
        let data = (0..count * dim).map(|i| offset + i as f32 * 0.5).collect();
        VectorSet::new(count, dim, data).unwrap()
    }

    #[test]
    fn test_file_round_trip_is_bit_identical() {
        let mut set = table(3, 4, -1.0);
        set.row_mut(1)[2] = f32::MIN_POSITIVE;
        set.row_mut(2)[0] = -0.0;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vecs.bin");
        save_vectors(&path, &set).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8 + 3 * 4 * 4);

        let back = load_vectors(&path).unwrap();
        assert_eq!((back.count(), back.dim()), (3, 4));
        let bits = |s: &VectorSet| s.as_slice().iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&back), bits(&set));
    }

    #[test]
    fn test_concatenated_split_recovers_tables() {
        let a = table(4, 3, 0.0);
        let b = table(4, 3, 100.0);
        let mut buf = Vec::new();
        write_concatenated(&a, &b, &mut buf).unwrap();

        let joined = read_vectors(buf.as_slice()).unwrap();
        assert_eq!(joined.dim(), 6);
        assert_eq!(&joined.row(1)[..3], a.row(1));
        assert_eq!(&joined.row(1)[3..], b.row(1));

        let (a2, b2) = split_concatenated(&joined, 3).unwrap();
        assert_eq!(a2, a);
        assert_eq!(b2, b);
    }

    #[test]
    fn test_concatenated_count_mismatch() {
        let mut buf = Vec::new();
        let err = write_concatenated(&table(2, 2, 0.0), &table(3, 2, 0.0), &mut buf).unwrap_err();
        assert!(matches!(err, Error::Shape { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn test_expect_shape_reports_values() {
        let set = table(5, 8, 0.0);
        assert!(set.expect_shape("word vectors", 5, 8).is_ok());
        let err = set.expect_shape("word vectors", 6, 8).unwrap_err();
        assert_eq!(err.to_string(), "word vectors count mismatch: expected 6, found 5");
        let err = set.expect_shape("word vectors", 5, 16).unwrap_err();
        assert_eq!(err.to_string(), "word vectors dimension mismatch: expected 16, found 8");
    }

    #[test]
    fn test_truncated_payload() {
        let mut buf = Vec::new();
        write_vectors(&table(2, 2, 0.0), &mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        let err = read_vectors(buf.as_slice()).unwrap_err();
        assert!(err.to_string().contains("vector 1"));
    }

    #[test]
    fn test_huge_dimension_is_truncation() {
        let bytes = [1i32.to_le_bytes(), i32::MAX.to_le_bytes()].concat();
        let err = read_vectors(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{:?}", err);
    }
}
