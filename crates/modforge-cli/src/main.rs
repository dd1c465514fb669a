use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use modforge_cli::logging::init_logging;
use modforge_cli::workspace::{JobStatus, JobStore, WorkspacePaths, load_or_create_settings};
use modforge_cli::{CliError, CliResult, JobRunner, project_catalog};
use modforge_schema::{request_schema_value, validate_request};

#[derive(Parser, Debug)]
#[command(name = "modforge", version, about = "Module generator for axum + sqlx projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a descriptor, generate its module and run the pipeline.
    Generate(GenerateArgs),
    /// Validate a descriptor without generating anything.
    Validate(ValidateArgs),
    /// Print the descriptor JSON Schema.
    Schema,
    /// Print a persisted job record.
    Status(StatusArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Path to the descriptor JSON.
    descriptor: PathBuf,
    /// Project root.
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    descriptor: PathBuf,
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Args, Debug)]
struct StatusArgs {
    job_id: String,
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Validate(args) => run_validate(args),
        Command::Schema => run_schema(),
        Command::Status(args) => run_status(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_generate(args: GenerateArgs) -> CliResult<()> {
    let paths = WorkspacePaths::new(args.root);
    paths.ensure_dirs()?;
    init_logging(&paths.log_path())?;
    let settings = load_or_create_settings(&paths)?;
    let request = read_descriptor(&args.descriptor)?;

    let (runner, worker) = JobRunner::start(paths, settings);
    let ticket = runner.submit(request)?;
    println!("job {} queued", ticket.id);

    let record = ticket.finished().await?;
    drop(runner);
    worker.await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    match record.status {
        JobStatus::Completed => Ok(()),
        _ => Err(CliError::JobFailed {
            id: record.id,
            message: record.error.unwrap_or_else(|| "unknown error".to_string()),
        }),
    }
}

fn run_validate(args: ValidateArgs) -> CliResult<()> {
    let paths = WorkspacePaths::new(args.root);
    let settings = load_or_create_settings(&paths)?;
    let request = read_descriptor(&args.descriptor)?;
    let catalog = project_catalog(&paths, &settings)?;
    let schema = request_schema_value()?;

    let validated = validate_request(&request, &schema, &catalog, &settings.validation_options())
        .map_err(CliError::Rejected)?;
    for warning in &validated.warnings {
        println!("warning: {warning}");
    }
    println!("ok");
    Ok(())
}

fn run_schema() -> CliResult<()> {
    let schema = request_schema_value()?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_status(args: StatusArgs) -> CliResult<()> {
    let store = JobStore::new(WorkspacePaths::new(args.root));
    let record = store.load(&args.job_id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn read_descriptor(path: &Path) -> CliResult<serde_json::Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
