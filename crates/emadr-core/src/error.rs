use thiserror::Error;

/// Errors that can occur while loading graphs, building samplers or
/// reading/writing vector files.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Truncated or malformed binary input.
    #[error("Malformed {context}: {message}")]
    Format {
        /// What was being read (file path or structure name).
        context: String,
        /// What went wrong.
        message: String,
    },

    /// Structural invariant violated while building a graph.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// A weighted distribution has no positive mass to sample from.
    #[error("Cannot sample from {0}: no positive weight")]
    EmptyDistribution(String),

    /// A left vertex with no neighbors was queried for a neighbor.
    #[error("Left vertex {0} has no neighbors")]
    EmptyVertex(usize),

    /// Count or dimension disagreement between two things that must match.
    #[error("{what} mismatch: expected {expected}, found {actual}")]
    Shape {
        /// Which quantity was checked (e.g. "word vector count").
        what: String,
        /// Value required by the current run.
        expected: usize,
        /// Value actually found.
        actual: usize,
    },

    /// Weighted index construction failed.
    #[error("Sampling error: {0}")]
    Sampling(String),
}

impl Error {
    pub(crate) fn format(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::Shape`] error.
    pub fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Shape {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Result type alias for emadr-core.
pub type Result<T> = std::result::Result<T, Error>;
