//! Execution events and notifiers for observability.
//!
//! Events are emitted during workflow execution to allow consumers to observe
//! progress, persist state, stream to UIs, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::result::StepStatus;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// Workflow execution has started.
  WorkflowStarted {
    execution_id: String,
    workflow: String,
  },

  /// A job has started executing.
  JobStarted {
    execution_id: String,
    job_id: String,
  },

  /// A step of a job has finished.
  StepCompleted {
    execution_id: String,
    job_id: String,
    step_id: String,
    status: StepStatus,
  },

  /// A job has completed successfully.
  JobCompleted {
    execution_id: String,
    job_id: String,
  },

  /// A job has failed.
  JobFailed {
    execution_id: String,
    job_id: String,
    error: String,
  },

  /// A job was never started because a job it needs failed.
  JobSkipped {
    execution_id: String,
    job_id: String,
  },

  /// Workflow execution has completed successfully.
  WorkflowCompleted { execution_id: String },

  /// Workflow execution has failed.
  WorkflowFailed { execution_id: String, error: String },
}

/// Trait for receiving execution events.
///
/// Implement this trait to receive events during workflow execution.
/// The orchestrator calls `notify` for each event - implementations decide
/// what to do with them (persist, broadcast, log, ignore, etc.).
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
///
/// Useful for tests or when event observation is not needed.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this when you need to consume events asynchronously (e.g., persist
/// to a database, stream to a UI, etc.).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded: notify is called from synchronous code.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// A notifier that turns events into `tracing` log lines.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl ExecutionNotifier for TracingNotifier {
  fn notify(&self, event: ExecutionEvent) {
    match event {
      ExecutionEvent::WorkflowStarted {
        execution_id,
        workflow,
      } => info!(%execution_id, %workflow, "workflow started"),
      ExecutionEvent::JobStarted {
        execution_id,
        job_id,
      } => info!(%execution_id, %job_id, "job started"),
      ExecutionEvent::StepCompleted {
        execution_id,
        job_id,
        step_id,
        status,
      } => info!(%execution_id, %job_id, %step_id, ?status, "step finished"),
      ExecutionEvent::JobCompleted {
        execution_id,
        job_id,
      } => info!(%execution_id, %job_id, "job completed"),
      ExecutionEvent::JobFailed {
        execution_id,
        job_id,
        error,
      } => error!(%execution_id, %job_id, %error, "job failed"),
      ExecutionEvent::JobSkipped {
        execution_id,
        job_id,
      } => warn!(%execution_id, %job_id, "job skipped"),
      ExecutionEvent::WorkflowCompleted { execution_id } => {
        info!(%execution_id, "workflow completed")
      }
      ExecutionEvent::WorkflowFailed {
        execution_id,
        error,
      } => error!(%execution_id, %error, "workflow failed"),
    }
  }
}
