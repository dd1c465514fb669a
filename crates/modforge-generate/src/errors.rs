use std::path::PathBuf;

use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Core(#[from] modforge_core::Error),
    #[error("formatting error: {0}")]
    Format(#[from] std::fmt::Error),
    #[error("entity '{0}' is not known to the project")]
    UnknownEntity(String),
    #[error("anchor '{anchor}' not found in {}", path.display())]
    MissingAnchor { path: PathBuf, anchor: String },
    #[error("cannot render {artifact}: {message}")]
    Render { artifact: String, message: String },
    #[error("wiring failed for {relation}: {message}")]
    Wiring { relation: String, message: String },
    #[error("invalid module model at {}: {message}", path.display())]
    InvalidModel { path: PathBuf, message: String },
    #[error("commit failed for {}: {source}", path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerateError>;
