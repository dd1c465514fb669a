use modforge_schema::ValidationReport;
use thiserror::Error;

use crate::workspace::{PipelineStep, WorkspaceError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("generation error: {0}")]
    Generate(#[from] modforge_generate::GenerateError),
    #[error("schema error: {0}")]
    Schema(#[from] modforge_schema::SchemaError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request rejected:\n{}", .0.messages().join("\n"))]
    Rejected(ValidationReport),
    #[error("{step} step failed: {message}")]
    Pipeline { step: PipelineStep, message: String },
    #[error("job {id} failed: {message}")]
    JobFailed { id: String, message: String },
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("job runner stopped")]
    RunnerClosed,
    #[error("logging error: {0}")]
    Logging(String),
}

pub type CliResult<T> = Result<T, CliError>;
