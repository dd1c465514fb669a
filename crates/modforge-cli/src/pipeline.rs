//! Post-generation commands: build, format, migrate, seed.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{CliError, CliResult};
use crate::workspace::{PipelineSettings, PipelineStep, StepOutcome};

const STDERR_TAIL: usize = 4_000;

/// Run every configured step in order inside `root`.
///
/// Each finished step is appended to `outcomes`. The first step that cannot
/// start or exits non-zero stops the pipeline.
pub async fn run_pipeline(
    root: &Path,
    pipeline: &PipelineSettings,
    outcomes: &mut Vec<StepOutcome>,
) -> CliResult<()> {
    for step in PipelineStep::ORDER {
        let argv = pipeline.command(step);
        let Some((program, args)) = argv.split_first() else {
            info!(event = "pipeline_step_skipped", step = %step);
            continue;
        };

        info!(event = "pipeline_step_started", step = %step, program = %program);
        let start = Instant::now();
        let output = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| CliError::Pipeline {
                step,
                message: format!("cannot start {program}: {err}"),
            })?;

        let outcome = StepOutcome {
            step,
            argv: argv.to_vec(),
            exit_code: output.status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
            stderr: (!output.status.success()).then(|| tail(&output.stderr)),
        };
        let succeeded = outcome.succeeded();
        let exit_code = outcome.exit_code;
        outcomes.push(outcome);

        if !succeeded {
            warn!(event = "pipeline_step_failed", step = %step, exit_code = ?exit_code);
            return Err(CliError::Pipeline {
                step,
                message: match exit_code {
                    Some(code) => format!("exited with status {code}"),
                    None => "terminated by a signal".to_string(),
                },
            });
        }
        info!(
            event = "pipeline_step_finished",
            step = %step,
            duration_ms = start.elapsed().as_millis() as u64
        );
    }
    Ok(())
}

fn tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_end();
    match trimmed.char_indices().rev().nth(STDERR_TAIL) {
        Some((idx, _)) => trimmed[idx..].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_steps_are_skipped() {
        let mut outcomes = Vec::new();
        run_pipeline(&std::env::temp_dir(), &PipelineSettings::disabled(), &mut outcomes)
            .await
            .unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn first_failing_step_stops_the_pipeline() {
        let pipeline = PipelineSettings {
            build: argv(&["sh", "-c", "exit 0"]),
            format: argv(&["sh", "-c", "echo broken >&2; exit 3"]),
            migrate: argv(&["sh", "-c", "exit 0"]),
            seed: Vec::new(),
        };
        let mut outcomes = Vec::new();
        let err = run_pipeline(&std::env::temp_dir(), &pipeline, &mut outcomes)
            .await
            .unwrap_err();

        assert!(matches!(err, CliError::Pipeline { step: PipelineStep::Format, .. }));
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].exit_code, Some(3));
        assert_eq!(outcomes[1].stderr.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn missing_program_fails_the_step() {
        let pipeline = PipelineSettings {
            build: argv(&["modforge-no-such-program"]),
            ..PipelineSettings::disabled()
        };
        let err = run_pipeline(&std::env::temp_dir(), &pipeline, &mut Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Pipeline { step: PipelineStep::Build, .. }));
    }
}
