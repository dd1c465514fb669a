//! Job acceptance and the single generation worker.
//!
//! Requests are validated on submission and rejected before a job exists.
//! Accepted jobs are persisted as `queued` and handed to one consumer task.
//! For the whole job the consumer holds an in-process mutex and the
//! `.modforge/workspace.lock` file lock, so jobs from other `modforge`
//! processes on the same project wait their turn.

use std::sync::Arc;

use modforge_core::EntityCatalog;
use modforge_generate::module::build_catalog;
use modforge_generate::{GenerationEngine, load_models};
use modforge_schema::{ValidatedRequest, request_schema_value, validate_request};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::{CliError, CliResult};
use crate::pipeline::run_pipeline;
use crate::workspace::{JobRecord, JobStore, ModforgeSettings, WorkspaceLock, WorkspacePaths};

#[derive(Debug)]
struct RunnerState {
    paths: WorkspacePaths,
    settings: ModforgeSettings,
    store: JobStore,
    workspace: Mutex<()>,
}

struct QueuedJob {
    record: JobRecord,
    done: oneshot::Sender<JobRecord>,
}

/// Handle on an accepted job.
#[derive(Debug)]
pub struct JobTicket {
    pub id: String,
    done: oneshot::Receiver<JobRecord>,
}

impl JobTicket {
    /// Wait for the job to complete or fail.
    pub async fn finished(self) -> CliResult<JobRecord> {
        self.done.await.map_err(|_| CliError::RunnerClosed)
    }
}

#[derive(Clone)]
pub struct JobRunner {
    state: Arc<RunnerState>,
    sender: mpsc::UnboundedSender<QueuedJob>,
}

impl JobRunner {
    /// Spawn the worker. It stops once every runner handle is dropped and
    /// the queue is drained.
    pub fn start(paths: WorkspacePaths, settings: ModforgeSettings) -> (Self, JoinHandle<()>) {
        let state = Arc::new(RunnerState {
            store: JobStore::new(paths.clone()),
            paths,
            settings,
            workspace: Mutex::new(()),
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(work(Arc::clone(&state), receiver));
        (Self { state, sender }, worker)
    }

    /// Validate `request` and enqueue it. Returns as soon as the job is queued.
    pub fn submit(&self, request: Value) -> CliResult<JobTicket> {
        let validated = validate(&self.state, &request)?;
        let record = JobRecord::queued(&validated.job.entity.module, request);
        self.state.store.save(&record)?;
        info!(
            event = "job_queued",
            job_id = %record.id,
            module = %record.module,
            warnings = validated.warnings.len()
        );

        let id = record.id.clone();
        let (done, receiver) = oneshot::channel();
        self.sender
            .send(QueuedJob { record, done })
            .map_err(|_| CliError::RunnerClosed)?;
        Ok(JobTicket { id, done: receiver })
    }

    /// Check a request against the current project without queueing it.
    pub fn validate(&self, request: &Value) -> CliResult<ValidatedRequest> {
        validate(&self.state, request)
    }

    pub fn store(&self) -> &JobStore {
        &self.state.store
    }
}

/// Entities known to the project: configured ones plus generated modules.
pub fn project_catalog(paths: &WorkspacePaths, settings: &ModforgeSettings) -> CliResult<EntityCatalog> {
    let options = settings.generate_options(paths.root.clone());
    let models = load_models(&options.resolve(&options.modules_dir))?;
    Ok(build_catalog(settings.entities.iter().cloned(), &models))
}

fn validate(state: &RunnerState, request: &Value) -> CliResult<ValidatedRequest> {
    let catalog = project_catalog(&state.paths, &state.settings)?;
    let schema = request_schema_value()?;
    validate_request(request, &schema, &catalog, &state.settings.validation_options())
        .map_err(CliError::Rejected)
}

async fn work(state: Arc<RunnerState>, mut receiver: mpsc::UnboundedReceiver<QueuedJob>) {
    while let Some(job) = receiver.recv().await {
        let _workspace = state.workspace.lock().await;
        let record = match lock_project(&state).await {
            Ok(project) => {
                let record = process(&state, job.record).await;
                drop(project);
                record
            }
            Err(err) => {
                let mut record = job.record;
                error!(event = "workspace_lock_failed", job_id = %record.id, error = %err);
                record.fail(err.to_string());
                persist(&state, &record);
                record
            }
        };
        let _ = job.done.send(record);
    }
    info!(event = "job_runner_stopped");
}

async fn lock_project(state: &RunnerState) -> CliResult<WorkspaceLock> {
    let paths = state.paths.clone();
    let lock = tokio::task::spawn_blocking(move || {
        paths.ensure_dirs()?;
        WorkspaceLock::acquire(&paths)
    })
    .await??;
    Ok(lock)
}

async fn process(state: &RunnerState, mut record: JobRecord) -> JobRecord {
    record.start();
    persist(state, &record);
    info!(event = "job_started", job_id = %record.id, module = %record.module);

    match execute(state, &mut record).await {
        Ok(()) => {
            record.complete();
            info!(
                event = "job_completed",
                job_id = %record.id,
                module = %record.module,
                steps = record.steps.len()
            );
        }
        Err(err) => {
            warn!(event = "job_failed", job_id = %record.id, error = %err);
            record.fail(err.to_string());
        }
    }
    persist(state, &record);
    record
}

async fn execute(state: &RunnerState, record: &mut JobRecord) -> CliResult<()> {
    // The project may have changed while the job was queued.
    let validated = validate(state, &record.request)?;

    let engine = GenerationEngine::new(state.settings.generate_options(state.paths.root.clone()));
    let external = state.settings.entities.clone();
    let job = validated.job;
    let result = tokio::task::spawn_blocking(move || engine.run(&job, &external)).await??;
    record.report = Some(result.report);

    run_pipeline(&state.paths.root, &state.settings.pipeline, &mut record.steps).await
}

fn persist(state: &RunnerState, record: &JobRecord) {
    if let Err(err) = state.store.save(record) {
        error!(event = "job_record_write_failed", job_id = %record.id, error = %err);
    }
}
