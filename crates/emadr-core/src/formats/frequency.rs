//! Frequency files: `i32 n`, then `n` little-endian `i32` counts.

use super::{at_path, header_i32, read_counted, read_len};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const CONTEXT: &str = "frequency file";

/// Read per-id counts. Negative counts are rejected.
pub fn read_frequencies<R: Read>(mut reader: R) -> Result<Vec<u64>> {
    let n = read_len(&mut reader, CONTEXT, "entry count")?;
    let mut bytes = Vec::new();
    read_counted(&mut reader, &mut bytes, n, 4, CONTEXT, "counts")?;
    bytes
        .chunks_exact(4)
        .enumerate()
        .map(|(i, c)| {
            let v = i32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            u64::try_from(v)
                .map_err(|_| Error::format(CONTEXT, format!("negative count {} for id {}", v, i)))
        })
        .collect()
}

/// Write per-id counts.
pub fn write_frequencies<W: Write>(counts: &[u64], mut writer: W) -> Result<()> {
    writer.write_all(&header_i32(counts.len(), CONTEXT, "entry count")?)?;
    for &c in counts {
        let c = usize::try_from(c).unwrap_or(usize::MAX);
        writer.write_all(&header_i32(c, CONTEXT, "count")?)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load counts from a frequency file.
pub fn load_frequencies(path: impl AsRef<Path>) -> Result<Vec<u64>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_frequencies(BufReader::new(file)).map_err(|e| at_path(e, path))
}

/// Save counts to a frequency file.
pub fn save_frequencies(path: impl AsRef<Path>, counts: &[u64]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_frequencies(counts, BufWriter::new(file)).map_err(|e| at_path(e, path))
}
