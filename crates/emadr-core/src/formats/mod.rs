//! Binary file formats.
//!
//! All formats are little-endian with `int32` headers:
//!
//! | File | Layout |
//! |------|--------|
//! | adjacency | `num_left, num_right`, then per left vertex `count, ids[count] (i32), weights[count] (u16)` |
//! | frequency | `n`, then `n × i32` |
//! | vectors | `count, dim`, then `count × dim × f32` |
//!
//! Each format has a reader/writer pair over `std::io::Read`/`Write` and a
//! `load_*`/`save_*` pair over paths. Path variants report the file path in
//! [`Error::Format`](crate::Error::Format) messages.

pub mod adjacency;
pub mod frequency;
pub mod vectors;

pub use adjacency::{load_adjacency, read_adjacency, save_adjacency, write_adjacency};
pub use frequency::{load_frequencies, read_frequencies, save_frequencies, write_frequencies};
pub use vectors::{
    load_vectors, read_vectors, save_concatenated, save_vectors, split_concatenated,
    write_concatenated, write_vectors, VectorSet,
};

use crate::{Error, Result};
use std::io::{self, Read};
use std::path::Path;

/// Read one little-endian `i32`, turning EOF into a [`Error::Format`].
pub(crate) fn read_i32<R: Read>(reader: &mut R, context: &str, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_full(reader, &mut buf, context, what)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a header field that must be non-negative.
pub(crate) fn read_len<R: Read>(reader: &mut R, context: &str, what: &str) -> Result<usize> {
    let value = read_i32(reader, context, what)?;
    usize::try_from(value)
        .map_err(|_| Error::format(context, format!("negative {}: {}", what, value)))
}

pub(crate) fn read_full<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    context: &str,
    what: &str,
) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            Error::format(context, format!("truncated while reading {}", what))
        }
        _ => Error::Io(e),
    })
}

/// Read `count` fixed-width items into `buf`.
///
/// The buffer grows with the bytes actually read, so a corrupt count on a
/// short stream fails as truncation without reserving the claimed size.
pub(crate) fn read_counted<R: Read>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    count: usize,
    width: usize,
    context: &str,
    what: &str,
) -> Result<()> {
    let len = count
        .checked_mul(width)
        .ok_or_else(|| Error::format(context, format!("{} count {} overflows", what, count)))?;
    buf.clear();
    reader.by_ref().take(len as u64).read_to_end(buf)?;
    if buf.len() != len {
        return Err(Error::format(context, format!("truncated while reading {}", what)));
    }
    Ok(())
}

/// Upper bound on capacity reserved from an unverified header.
pub(crate) const MAX_RESERVE: usize = 1 << 20;

/// Encode a length as an `i32` header field.
pub(crate) fn header_i32(value: usize, context: &str, what: &str) -> Result<[u8; 4]> {
    i32::try_from(value)
        .map(i32::to_le_bytes)
        .map_err(|_| {
            Error::format(context, format!("{} {} does not fit in an int32 header", what, value))
        })
}

/// Replace the generic context of a format error with the file path.
pub(crate) fn at_path(err: Error, path: &Path) -> Error {
    match err {
        Error::Format { message, .. } => Error::format(path.display().to_string(), message),
        other => other,
    }
}
