use std::path::PathBuf;

use chrono::{DateTime, Utc};
use modforge_generate::GenerationReport;
use serde::{Deserialize, Serialize};

use super::atomic::write_json_atomic;
use super::settings::PipelineStep;
use super::{WorkspaceError, WorkspacePaths, WorkspaceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Result of one pipeline command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: PipelineStep,
    pub argv: Vec<String>,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    /// Tail of stderr, kept for failed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Persisted state of one generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub module: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// The accepted request, replayed when the job is processed.
    pub request: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<GenerationReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    pub fn queued(module: &str, request: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            module: module.to_string(),
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            request,
            report: None,
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

/// Job records under `.modforge/jobs/`, one JSON file per job.
#[derive(Debug, Clone)]
pub struct JobStore {
    paths: WorkspacePaths,
}

impl JobStore {
    pub fn new(paths: WorkspacePaths) -> Self {
        Self { paths }
    }

    pub fn path(&self, id: &str) -> PathBuf {
        self.paths.job_path(id)
    }

    pub fn save(&self, record: &JobRecord) -> WorkspaceResult<()> {
        write_json_atomic(&self.path(&record.id), record)
    }

    pub fn load(&self, id: &str) -> WorkspaceResult<JobRecord> {
        let path = self.path(id);
        if !path.exists() {
            return Err(WorkspaceError::JobNotFound(id.to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_round_trip_through_the_store() {
        let root = std::env::temp_dir().join(format!("modforge_jobs_{}", uuid::Uuid::new_v4()));
        let store = JobStore::new(WorkspacePaths::new(root));

        let mut record = JobRecord::queued("invoice", serde_json::json!({ "name": "invoice" }));
        store.save(&record).unwrap();
        assert_eq!(store.load(&record.id).unwrap().status, JobStatus::Queued);

        record.start();
        record.fail("build exited with status 101");
        store.save(&record).unwrap();

        let loaded = store.load(&record.id).unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert!(loaded.status.is_finished());
        assert_eq!(loaded.error.as_deref(), Some("build exited with status 101"));
        assert!(matches!(
            store.load("missing"),
            Err(WorkspaceError::JobNotFound(_))
        ));
    }
}
