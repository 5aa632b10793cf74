use thiserror::Error;

/// Failures of the retrieval collaborators. Any of these aborts the routing
/// call that hit it.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The article store could not be read or written.
    #[error("article store error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Queries never create a store; ingest the corpus first.
    #[error("article store not found at {}", path.display())]
    StoreNotFound { path: std::path::PathBuf },

    /// The store's directory could not be prepared.
    #[error("article store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding provider failed to produce a vector.
    #[error("embedding provider '{provider}' failed: {message}")]
    Embedding { provider: String, message: String },

    /// Query and stored vectors disagree on dimensionality.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Stored vectors were produced by another embedder.
    #[error("embeddings were computed by '{stored}', not '{current}'; run `lawsarthi embed --rebuild`")]
    EmbedderMismatch { stored: String, current: String },

    /// Stored embedding bytes are not a whole number of f32 values.
    #[error("corrupt embedding for article {id}: {len} bytes")]
    CorruptEmbedding { id: String, len: usize },

    /// The routing call did not finish within its deadline.
    #[error("query timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;
