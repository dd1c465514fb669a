use thiserror::Error;

/// Core error type shared across modforge crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A name cannot be turned into identifiers.
    #[error("invalid name: {0}")]
    InvalidName(String),
    /// An entity referenced by a request is not known.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by modforge crates.
pub type Result<T> = std::result::Result<T, Error>;
