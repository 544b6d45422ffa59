use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = SqlMarshalError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SqlMarshalError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Prepare error for `{sql}`: {source}")]
    PrepareError {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    /// Byte payload rejected before it reached the engine.
    #[error("blob too large: {len} bytes exceeds the {max} byte limit")]
    BlobTooLarge { len: usize, max: usize },

    /// Blob length is not a whole number of elements.
    #[error("length error: {len} bytes is not a multiple of element size {element_size}")]
    LengthMismatch { len: usize, element_size: usize },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A single-row call found no row.
    #[error("no result for `{sql}`")]
    NoResult { sql: String },

    /// A statement that must not produce rows produced one.
    #[error("unexpected row from `{sql}`")]
    UnexpectedRow { sql: String },

    /// Commit/rollback outside a transaction and similar caller mistakes.
    #[error("Transaction state error: {0}")]
    TransactionState(String),

    #[error("statement `{sql}` was compiled on another connection")]
    ForeignStatement { sql: String },

    #[error("Other error: {0}")]
    Other(String),
}

impl SqlMarshalError {
    /// True for errors that indicate caller logic rather than a storage failure.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::TransactionState(_) | Self::ForeignStatement { .. } | Self::ParameterError(_)
        )
    }
}
