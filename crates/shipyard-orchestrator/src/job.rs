//! Execution of a single job: a workspace, then its steps in order.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use shipyard_artifact::Store;
use shipyard_workflow::template::render;
use shipyard_workflow::{Job, Step, StepKind};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::actions::run_action;
use crate::error::JobError;
use crate::result::{JobResult, JobStatus, StepResult, StepStatus};

/// Everything a job needs, owned so it can move into a spawned task.
pub(crate) struct JobContext {
  pub job: Job,
  pub execution_id: String,
  pub workspace: PathBuf,
  pub store: Arc<dyn Store>,
  /// Template context (see [`crate::context`]).
  pub template: serde_json::Value,
  /// Rendered environment shared by all steps of the job.
  pub env: IndexMap<String, String>,
  /// Artifacts uploaded by upstream jobs, for pattern downloads.
  pub available: Vec<String>,
  pub timeout_ms: Option<u64>,
  /// Set when the job cannot start, e.g. its environment failed to render.
  pub setup_error: Option<JobError>,
}

/// Run a job to completion, bounded by its timeout.
pub(crate) async fn run_job(mut ctx: JobContext) -> JobResult {
  let started = Instant::now();
  let job_id = ctx.job.job_id.clone();

  if let Some(err) = ctx.setup_error.take() {
    warn!(%job_id, error = %err, "job could not start");
    return JobResult {
      job_id,
      status: JobStatus::Failed,
      error: Some(err.report()),
      steps: Vec::new(),
      duration_ms: 0,
    };
  }

  let mut steps = Vec::new();
  let outcome = match ctx.timeout_ms {
    Some(timeout_ms) => {
      let duration = std::time::Duration::from_millis(timeout_ms);
      match tokio::time::timeout(duration, run_steps(&ctx, &mut steps)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(JobError::Timeout { timeout_ms }),
      }
    }
    None => run_steps(&ctx, &mut steps).await,
  };

  let (status, error) = match outcome {
    Ok(()) => (JobStatus::Succeeded, None),
    Err(e) => (JobStatus::Failed, Some(e.report())),
  };

  JobResult {
    job_id,
    status,
    error,
    steps,
    duration_ms: started.elapsed().as_millis() as u64,
  }
}

async fn run_steps(ctx: &JobContext, results: &mut Vec<StepResult>) -> Result<(), JobError> {
  tokio::fs::create_dir_all(&ctx.workspace).await?;

  for step in &ctx.job.steps {
    let (result, failure) = run_step(ctx, step).await;
    results.push(result);
    if let Some(err) = failure {
      return Err(err);
    }
  }

  Ok(())
}

/// Run one step. The error is returned only when it should fail the job.
async fn run_step(ctx: &JobContext, step: &Step) -> (StepResult, Option<JobError>) {
  let mut result = StepResult {
    step_id: step.step_id.clone(),
    status: StepStatus::Succeeded,
    exit_code: None,
    output: String::new(),
    stderr: String::new(),
    error: None,
  };

  let failure = match &step.kind {
    StepKind::Run { command } => match run_command(ctx, step, command).await {
      Ok(output) => {
        let failure = (!output.success).then(|| JobError::CommandFailed {
          step_id: step.step_id.clone(),
          exit_code: output.exit_code,
        });
        result.exit_code = output.exit_code;
        result.output = output.stdout;
        result.stderr = output.stderr;
        failure
      }
      Err(e) => Some(e),
    },
    StepKind::Action(call) => match run_action(ctx, &step.step_id, call).await {
      Ok(summary) => {
        result.output = summary;
        None
      }
      Err(e) => Some(e),
    },
  };

  let Some(err) = failure else {
    return (result, None);
  };

  let report = err.report();
  warn!(job_id = %ctx.job.job_id, step_id = %step.step_id, error = %report, "step failed");
  result.error = Some(report);

  if step.continue_on_error {
    result.status = StepStatus::FailedIgnored;
    (result, None)
  } else {
    result.status = StepStatus::Failed;
    (result, Some(err))
  }
}

struct CommandOutput {
  success: bool,
  /// `None` when the process was killed by a signal.
  exit_code: Option<i32>,
  stdout: String,
  stderr: String,
}

async fn run_command(ctx: &JobContext, step: &Step, command: &str) -> Result<CommandOutput, JobError> {
  let template_err = |message: String| JobError::Template {
    step_id: step.step_id.clone(),
    message,
  };

  let command = render(command, &ctx.template).map_err(|e| template_err(e.to_string()))?;
  let mut env = ctx.env.clone();
  for (key, value) in &step.env {
    let rendered =
      render(value, &ctx.template).map_err(|e| template_err(format!("{}: {}", key, e)))?;
    env.insert(key.clone(), rendered);
  }

  debug!(job_id = %ctx.job.job_id, step_id = %step.step_id, %command, "running command");

  let mut cmd = shell(&command);
  cmd
    .current_dir(&ctx.workspace)
    .envs(&env)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  let output = cmd.output().await?;

  Ok(CommandOutput {
    success: output.status.success(),
    exit_code: output.status.code(),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  })
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
  let mut cmd = Command::new("sh");
  cmd.arg("-c").arg(command);
  cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
  let mut cmd = Command::new("cmd");
  cmd.arg("/C").arg(command);
  cmd
}
