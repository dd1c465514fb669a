//! Project-side plumbing for the `modforge` binary: settings, job records,
//! logging, the job runner and the post-generation pipeline.

pub mod error;
pub mod logging;
pub mod pipeline;
pub mod runner;
pub mod workspace;

pub use error::{CliError, CliResult};
pub use runner::{JobRunner, JobTicket, project_catalog};
