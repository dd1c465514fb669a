use std::path::PathBuf;

use modforge_cli::workspace::{
    JobStatus, ModforgeSettings, PipelineSettings, PipelineStep, WorkspacePaths,
};
use modforge_cli::{CliError, JobRunner};
use serde_json::{Value, json};

fn project() -> WorkspacePaths {
    let root: PathBuf =
        std::env::temp_dir().join(format!("modforge_runner_{}", uuid::Uuid::new_v4()));
    let paths = WorkspacePaths::new(root);
    paths.ensure_dirs().expect("workspace dirs");
    paths
}

fn settings(pipeline: PipelineSettings) -> ModforgeSettings {
    ModforgeSettings {
        pipeline,
        ..ModforgeSettings::default()
    }
}

fn request(name: &str) -> Value {
    json!({
        "name": name,
        "fields": [{
            "name": "label",
            "type": "String",
            "subtype_options": { "subtype": "varchar", "length": 40 }
        }]
    })
}

#[tokio::test]
async fn accepted_job_completes_and_is_persisted() {
    let paths = project();
    let (runner, _worker) = JobRunner::start(paths.clone(), settings(PipelineSettings::disabled()));

    let ticket = runner.submit(request("tag")).expect("accepted");
    let id = ticket.id.clone();
    let record = ticket.finished().await.expect("finished");

    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.module, "tag");
    assert!(record.started_at.is_some() && record.finished_at.is_some());
    let report = record.report.expect("report");
    assert!(!report.files_written.is_empty());
    assert!(paths.root.join("src/modules/tag/module.json").exists());

    let stored = runner.store().load(&id).expect("stored record");
    assert_eq!(stored.status, JobStatus::Completed);
}

#[tokio::test]
async fn invalid_request_is_rejected_before_a_job_exists() {
    let paths = project();
    let (runner, _worker) = JobRunner::start(paths.clone(), settings(PipelineSettings::disabled()));

    let err = runner
        .submit(json!({ "name": "tag", "fields": [{ "name": "x", "type": "Strang" }] }))
        .unwrap_err();
    assert!(matches!(err, CliError::Rejected(ref report) if !report.errors.is_empty()));

    let jobs = std::fs::read_dir(&paths.jobs_dir).expect("jobs dir").count();
    assert_eq!(jobs, 0);
}

#[tokio::test]
async fn failing_pipeline_step_fails_the_job_without_rollback() {
    let paths = project();
    let pipeline = PipelineSettings {
        build: vec!["sh".to_string(), "-c".to_string(), "exit 101".to_string()],
        ..PipelineSettings::disabled()
    };
    let (runner, _worker) = JobRunner::start(paths.clone(), settings(pipeline));

    let record = runner
        .submit(request("tag"))
        .expect("accepted")
        .finished()
        .await
        .expect("finished");

    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.steps.len(), 1);
    assert_eq!(record.steps[0].step, PipelineStep::Build);
    assert_eq!(record.steps[0].exit_code, Some(101));
    assert!(record.error.as_deref().unwrap_or_default().contains("build"));
    assert!(paths.root.join("src/modules/tag/entity.rs").exists());
}

#[tokio::test]
async fn jobs_run_one_after_another() {
    let paths = project();
    let (runner, worker) = JobRunner::start(paths.clone(), settings(PipelineSettings::disabled()));

    let first = runner.submit(request("tag")).expect("first accepted");
    let second = runner.submit(request("badge")).expect("second accepted");
    drop(runner);

    let first = first.finished().await.expect("first finished");
    let second = second.finished().await.expect("second finished");
    worker.await.expect("worker stops");

    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(second.status, JobStatus::Completed);
    let first_done = first.finished_at.expect("first finish time");
    let second_start = second.started_at.expect("second start time");
    assert!(first_done <= second_start);

    let registry = std::fs::read_to_string(paths.root.join("src/modules/mod.rs")).expect("registry");
    assert!(registry.contains("pub mod tag;"));
    assert!(registry.contains("pub mod badge;"));
}

#[tokio::test]
async fn runners_sharing_a_project_do_not_overlap() {
    let paths = project();
    let slow = || {
        settings(PipelineSettings {
            build: vec!["sh".to_string(), "-c".to_string(), "sleep 0.5".to_string()],
            ..PipelineSettings::disabled()
        })
    };
    let (first_runner, _first_worker) = JobRunner::start(paths.clone(), slow());
    let (second_runner, _second_worker) = JobRunner::start(paths.clone(), slow());

    let first = first_runner.submit(request("tag")).expect("first accepted");
    let second = second_runner.submit(request("badge")).expect("second accepted");
    let (first, second) = tokio::join!(first.finished(), second.finished());
    let first = first.expect("first finished");
    let second = second.expect("second finished");

    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(second.status, JobStatus::Completed);
    let (earlier, later) = if first.started_at <= second.started_at {
        (&first, &second)
    } else {
        (&second, &first)
    };
    assert!(earlier.finished_at.expect("finish time") <= later.started_at.expect("start time"));

    let registry = std::fs::read_to_string(paths.root.join("src/modules/mod.rs")).expect("registry");
    assert!(registry.contains("pub mod tag;"));
    assert!(registry.contains("pub mod badge;"));
}
