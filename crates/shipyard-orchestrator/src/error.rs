//! Orchestrator errors.

use shipyard_config::TriggerEvent;
use shipyard_publish::PublishError;

/// Errors that stop an execution as a whole.
///
/// A failing job is not one of these: it is recorded in the
/// [`ExecutionResult`](crate::ExecutionResult) and the execution reports
/// [`ExecutionStatus::Failed`](crate::ExecutionStatus::Failed).
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
  /// The event does not start this workflow.
  #[error("{event} on branch '{branch}' does not match the workflow trigger")]
  TriggerMismatch { event: TriggerEvent, branch: String },

  /// Invalid workflow graph.
  #[error("invalid workflow graph: {message}")]
  InvalidGraph { message: String },

  /// Job not found in workflow.
  #[error("job '{job_id}' not found in workflow")]
  JobNotFound { job_id: String },

  /// Execution was cancelled.
  #[error("execution cancelled")]
  Cancelled,

  /// The runner's event queue is gone.
  #[error("workflow runner channel closed")]
  ChannelClosed,
}

/// Errors that fail a single job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
  #[error("step '{step_id}' exited with {}", describe_exit(.exit_code))]
  CommandFailed {
    step_id: String,
    exit_code: Option<i32>,
  },

  #[error("step '{step_id}': failed to render template: {message}")]
  Template { step_id: String, message: String },

  #[error("step '{step_id}': no artifact matches '{reference}'")]
  NoMatchingArtifacts { step_id: String, reference: String },

  #[error("step '{step_id}': artifact error")]
  Artifact {
    step_id: String,
    #[source]
    source: shipyard_artifact::Error,
  },

  #[error("step '{step_id}': publish failed")]
  Publish {
    step_id: String,
    #[source]
    source: PublishError,
  },

  #[error("failed to render env '{key}': {message}")]
  Environment { key: String, message: String },

  #[error("job timed out after {timeout_ms}ms")]
  Timeout { timeout_ms: u64 },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("code {}", code),
    None => "a signal".to_string(),
  }
}

impl JobError {
  /// Render the error with its source chain, for job results and logs.
  pub fn report(&self) -> String {
    let mut message = self.to_string();
    let mut source = std::error::Error::source(self);
    while let Some(err) = source {
      message.push_str(": ");
      message.push_str(&err.to_string());
      source = err.source();
    }
    message
  }
}
