//! Workflow runner with channel-based triggering.
//!
//! The `WorkflowRunner` owns an mpsc channel for receiving release events
//! and executes the workflow once per event using the `Orchestrator`.

use std::sync::Arc;

use shipyard_workflow::Workflow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::ExecutionError;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::orchestrator::Orchestrator;
use crate::result::{ExecutionResult, ExecutionStatus};
use crate::trigger::ReleaseEvent;

/// A runner that executes a workflow in response to release events.
///
/// # Usage
///
/// ```ignore
/// let runner = WorkflowRunner::new(workflow, orchestrator);
///
/// // Get sender for external triggers (webhooks, CLI, etc.)
/// let sender = runner.sender();
///
/// // Start the execution loop
/// let cancel = CancellationToken::new();
/// runner.start(cancel).await?;
/// ```
pub struct WorkflowRunner<N: ExecutionNotifier = NoopNotifier> {
  sender: mpsc::Sender<ReleaseEvent>,
  receiver: mpsc::Receiver<ReleaseEvent>,
  workflow: Arc<Workflow>,
  orchestrator: Arc<Orchestrator<N>>,
}

impl<N: ExecutionNotifier> WorkflowRunner<N> {
  /// Create a new workflow runner.
  pub fn new(workflow: Arc<Workflow>, orchestrator: Arc<Orchestrator<N>>) -> Self {
    Self::with_buffer_size(workflow, orchestrator, 100)
  }

  /// Create a new workflow runner with a custom buffer size.
  pub fn with_buffer_size(
    workflow: Arc<Workflow>,
    orchestrator: Arc<Orchestrator<N>>,
    buffer_size: usize,
  ) -> Self {
    let (sender, receiver) = mpsc::channel(buffer_size);
    Self {
      sender,
      receiver,
      workflow,
      orchestrator,
    }
  }

  /// Get a sender handle for triggering workflow executions.
  pub fn sender(&self) -> mpsc::Sender<ReleaseEvent> {
    self.sender.clone()
  }

  /// Queue an execution for the given event.
  pub async fn run(&self, event: ReleaseEvent) -> Result<(), ExecutionError> {
    self
      .sender
      .send(event)
      .await
      .map_err(|_| ExecutionError::ChannelClosed)
  }

  /// Start the execution loop.
  ///
  /// This blocks until the cancellation token is triggered or every sender is
  /// dropped. Events are handled one at a time, in the order received.
  pub async fn start(mut self, cancel: CancellationToken) -> Result<(), ExecutionError> {
    // Keep only external senders alive, so the loop ends when they are dropped
    drop(self.sender);

    info!(workflow = %self.workflow.name, "starting workflow runner");

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!(workflow = %self.workflow.name, "workflow runner cancelled");
              break;
          }
          event = self.receiver.recv() => {
              let Some(event) = event else {
                  info!(workflow = %self.workflow.name, "workflow runner channel closed");
                  break;
              };

              let exec_cancel = cancel.child_token();
              let tag = event.tag.clone();
              match self.orchestrator.execute(&self.workflow, event, exec_cancel).await {
                  Ok(result) if result.status == ExecutionStatus::Succeeded => {
                      info!(
                          workflow = %self.workflow.name,
                          execution_id = %result.execution_id,
                          %tag,
                          jobs = result.jobs.len(),
                          "workflow execution completed"
                      );
                  }
                  Ok(result) => {
                      error!(
                          workflow = %self.workflow.name,
                          execution_id = %result.execution_id,
                          %tag,
                          "workflow execution failed"
                      );
                  }
                  Err(ExecutionError::TriggerMismatch { event, branch }) => {
                      info!(
                          workflow = %self.workflow.name,
                          %event,
                          %branch,
                          "event does not match trigger, skipping"
                      );
                  }
                  Err(ExecutionError::Cancelled) => {
                      warn!(workflow = %self.workflow.name, "workflow execution cancelled");
                  }
                  Err(e) => {
                      error!(workflow = %self.workflow.name, error = %e, "workflow execution failed");
                  }
              }
          }
      }
    }

    Ok(())
  }

  /// Execute a single run directly (without the loop).
  pub async fn execute_once(
    &self,
    event: ReleaseEvent,
    cancel: CancellationToken,
  ) -> Result<ExecutionResult, ExecutionError> {
    self.orchestrator.execute(&self.workflow, event, cancel).await
  }

  /// Get the workflow this runner executes.
  pub fn workflow(&self) -> &Workflow {
    &self.workflow
  }
}
