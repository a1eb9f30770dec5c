use thiserror::Error;

/// Errors that can occur while configuring or running a training job.
#[derive(Error, Debug)]
pub enum Error {
    /// Graph, sampler or file-format error.
    #[error(transparent)]
    Core(#[from] emadr_core::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON configuration error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rejected configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Tables, kernels or pretrained vectors disagree on a count or dimension.
    #[error("{what} mismatch: expected {expected}, found {actual}")]
    Shape {
        /// Which quantity was checked.
        what: String,
        /// Value required by the current run.
        expected: usize,
        /// Value actually found.
        actual: usize,
    },

    /// A worker thread panicked; its updates may be partial.
    #[error("Training worker {0} panicked")]
    WorkerPanicked(usize),
}

impl Error {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Shape {
            what: what.into(),
            expected,
            actual,
        }
    }
}

/// Result type alias for emadr-train.
pub type Result<T> = std::result::Result<T, Error>;
