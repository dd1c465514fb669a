mod atomic;
mod jobs;
mod lock;
mod paths;
mod settings;

pub use atomic::{write_bytes_atomic, write_json_atomic};
pub use jobs::{JobRecord, JobStatus, JobStore, StepOutcome};
pub use lock::WorkspaceLock;
pub use paths::WorkspacePaths;
pub use settings::{
    ModforgeSettings, PipelineSettings, PipelineStep, load_or_create_settings, save_settings,
};

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("job '{0}' not found")]
    JobNotFound(String),
    #[error("invalid workspace state: {0}")]
    Invalid(String),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
