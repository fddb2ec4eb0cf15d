use thiserror::Error;

/// A convenience `Result` alias using [`RagError`].
pub type RagResult<T> = Result<T, RagError>;

/// Top-level error type for the ragvault crates.
///
/// Degenerate inputs (zero-magnitude vectors, empty queries, empty corpora)
/// are not errors; they resolve to defined scores and results instead.
#[derive(Error, Debug)]
pub enum RagError {
    /// The backing storage could not be opened, read or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A chunk with this id is already stored.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Query and stored embeddings have different lengths.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Length of the query embedding.
        expected: usize,
        /// Length of the offending stored embedding.
        actual: usize,
    },

    /// A caller-supplied argument violates a precondition (e.g. `k == 0`).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding collaborator failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The text-generation collaborator failed.
    #[error("Generation error: {0}")]
    Generation(String),

    /// A document could not be parsed into chunks.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration could not be read or is invalid.
    #[error("Config error: {0}")]
    Config(String),
}
