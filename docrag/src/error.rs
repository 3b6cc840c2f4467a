//! Error types for the `docrag` crate.

use thiserror::Error;

/// Errors that can occur while building, persisting, or querying an index.
#[derive(Debug, Error)]
pub enum RagError {
    /// The index could not be built from the supplied vectors.
    ///
    /// Raised for an empty corpus or for vectors of inconsistent length.
    /// No index is published and nothing is written to disk.
    #[error("Index build error: {0}")]
    IndexBuild(String),

    /// A query was issued against an index with zero rows.
    #[error("Index is empty")]
    EmptyIndex,

    /// The query text was empty or degenerate under the strict policy.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A search vector did not match the dimensionality of the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality of the index.
        expected: usize,
        /// The dimensionality of the supplied vector.
        actual: usize,
    },

    /// An error occurred in a pretrained embedding provider.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A persisted index could not be written or read back.
    #[error("Persistence error ({path}): {message}")]
    Persistence {
        /// The file or directory involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The summarizer failed to produce an answer.
    #[error("Summarizer error: {0}")]
    SummarizerError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
