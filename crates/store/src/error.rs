use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database could not be opened at all.
    #[error("cannot open store: {0}")]
    Open(String),
    /// A statement failed inside the backend.
    #[error("query failed on '{table}': {message}")]
    Query { table: String, message: String },
    /// Identifier contains characters we refuse to interpolate.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    /// Failure configured on a `MemoryStore` for testing.
    #[error("injected failure: {0}")]
    Injected(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl StoreError {
    pub(crate) fn query(table: &str, err: impl std::fmt::Display) -> Self {
        Self::Query {
            table: table.to_string(),
            message: err.to_string(),
        }
    }
}
