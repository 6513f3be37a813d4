//! Workflow execution engine.
//!
//! The `Orchestrator` handles graph traversal and job execution for workflows.
//! It runs jobs in parallel waves: every job whose upstream jobs have all
//! succeeded is started, and the next wave is computed once they finish. Jobs
//! downstream of a failed job are skipped; independent jobs keep running.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use shipyard_artifact::Store;
use shipyard_workflow::Workflow;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::context::{builtin_env, job_context, render_env};
use crate::error::{ExecutionError, JobError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::job::{JobContext, run_job};
use crate::result::{ExecutionResult, ExecutionStatus, JobResult, JobStatus};
use crate::trigger::ReleaseEvent;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
  /// Job workspaces are created at `{work_dir}/{execution_id}/{job_id}`.
  pub work_dir: PathBuf,
  /// Values for `{{ secrets.* }}`.
  pub secrets: BTreeMap<String, String>,
}

impl OrchestratorConfig {
  pub fn new(work_dir: impl Into<PathBuf>) -> Self {
    Self {
      work_dir: work_dir.into(),
      secrets: BTreeMap::new(),
    }
  }

  pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.secrets.insert(name.into(), value.into());
    self
  }
}

/// The workflow orchestrator.
///
/// Generic over `N: ExecutionNotifier` to allow different notification strategies.
/// Use `Orchestrator::new()` for an orchestrator with no-op notifications,
/// or `Orchestrator::with_notifier()` to provide a custom notifier.
pub struct Orchestrator<N: ExecutionNotifier = NoopNotifier> {
  config: OrchestratorConfig,
  store: Arc<dyn Store>,
  notifier: N,
}

impl Orchestrator<NoopNotifier> {
  /// Create a new orchestrator with no-op notifications.
  pub fn new(config: OrchestratorConfig, store: Arc<dyn Store>) -> Self {
    Self::with_notifier(config, store, NoopNotifier)
  }
}

impl<N: ExecutionNotifier> Orchestrator<N> {
  /// Create a new orchestrator with a custom notifier.
  pub fn with_notifier(config: OrchestratorConfig, store: Arc<dyn Store>, notifier: N) -> Self {
    Self {
      config,
      store,
      notifier,
    }
  }

  /// Execute a workflow for the given event.
  ///
  /// Returns `Err` only when the execution could not run at all (trigger
  /// mismatch, invalid graph, cancellation). Failed jobs are reported in the
  /// result with [`ExecutionStatus::Failed`].
  pub async fn execute(
    &self,
    workflow: &Workflow,
    event: ReleaseEvent,
    cancel: CancellationToken,
  ) -> Result<ExecutionResult, ExecutionError> {
    if !workflow.trigger.matches(event.event, &event.branch) {
      return Err(ExecutionError::TriggerMismatch {
        event: event.event,
        branch: event.branch,
      });
    }

    self.validate_workflow(workflow)?;

    let execution_id = uuid::Uuid::new_v4().to_string();
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: execution_id.clone(),
      workflow: workflow.name.clone(),
    });

    let result = self
      .run_execution_loop(workflow, &event, &execution_id, &cancel)
      .await;

    match &result {
      Ok(result) if result.status == ExecutionStatus::Succeeded => {
        self.notifier.notify(ExecutionEvent::WorkflowCompleted {
          execution_id: execution_id.clone(),
        });
      }
      Ok(result) => {
        self.notifier.notify(ExecutionEvent::WorkflowFailed {
          execution_id: execution_id.clone(),
          error: format!("failed jobs: {}", result.jobs_with(JobStatus::Failed).join(", ")),
        });
      }
      Err(e) => {
        self.notifier.notify(ExecutionEvent::WorkflowFailed {
          execution_id: execution_id.clone(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  /// Run the main execution loop.
  async fn run_execution_loop(
    &self,
    workflow: &Workflow,
    event: &ReleaseEvent,
    execution_id: &str,
    cancel: &CancellationToken,
  ) -> Result<ExecutionResult, ExecutionError> {
    let mut finished: IndexMap<String, JobResult> = IndexMap::new();

    // Jobs downstream of a failure are never ready, so this ends once nothing else can run
    loop {
      if cancel.is_cancelled() {
        return Err(ExecutionError::Cancelled);
      }

      let ready = self.find_ready_jobs(workflow, &finished);
      if ready.is_empty() {
        break;
      }

      for job_id in &ready {
        self.notifier.notify(ExecutionEvent::JobStarted {
          execution_id: execution_id.to_string(),
          job_id: job_id.clone(),
        });
      }

      let handles = self.spawn_ready_jobs(workflow, &ready, event, execution_id)?;
      let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();

      // Wait for the whole wave
      let results = tokio::select! {
          results = futures::future::join_all(handles) => results,
          _ = cancel.cancelled() => {
              for abort in aborts {
                  abort.abort();
              }
              return Err(ExecutionError::Cancelled);
          }
      };

      for (job_id, joined) in ready.iter().zip(results) {
        let result = joined.unwrap_or_else(|e| {
          error!(%job_id, error = %e, "job task failed to complete");
          JobResult {
            job_id: job_id.clone(),
            status: JobStatus::Failed,
            error: Some(format!("job task failed: {}", e)),
            steps: Vec::new(),
            duration_ms: 0,
          }
        });

        self.notify_job_finished(execution_id, &result);
        finished.insert(job_id.clone(), result);
      }
    }

    // Whatever has not run by now is downstream of a failure
    let mut jobs = IndexMap::with_capacity(workflow.jobs.len());
    for job_id in workflow.jobs.keys() {
      let result = match finished.shift_remove(job_id) {
        Some(result) => result,
        None => {
          self.notifier.notify(ExecutionEvent::JobSkipped {
            execution_id: execution_id.to_string(),
            job_id: job_id.clone(),
          });
          JobResult::skipped(job_id.clone())
        }
      };
      jobs.insert(job_id.clone(), result);
    }

    let status = if jobs.values().all(JobResult::is_success) {
      ExecutionStatus::Succeeded
    } else {
      ExecutionStatus::Failed
    };

    info!(
      %execution_id,
      workflow = %workflow.name,
      ?status,
      jobs = jobs.len(),
      "execution finished"
    );

    Ok(ExecutionResult {
      execution_id: execution_id.to_string(),
      workflow: workflow.name.clone(),
      status,
      jobs,
    })
  }

  fn notify_job_finished(&self, execution_id: &str, result: &JobResult) {
    for step in &result.steps {
      self.notifier.notify(ExecutionEvent::StepCompleted {
        execution_id: execution_id.to_string(),
        job_id: result.job_id.clone(),
        step_id: step.step_id.clone(),
        status: step.status,
      });
    }

    if result.is_success() {
      self.notifier.notify(ExecutionEvent::JobCompleted {
        execution_id: execution_id.to_string(),
        job_id: result.job_id.clone(),
      });
    } else {
      self.notifier.notify(ExecutionEvent::JobFailed {
        execution_id: execution_id.to_string(),
        job_id: result.job_id.clone(),
        error: result.error.clone().unwrap_or_default(),
      });
    }
  }

  /// Find jobs that are ready to execute (all upstream jobs succeeded).
  fn find_ready_jobs(
    &self,
    workflow: &Workflow,
    finished: &IndexMap<String, JobResult>,
  ) -> Vec<String> {
    let graph = workflow.graph();

    workflow
      .jobs
      .keys()
      .filter(|id| !finished.contains_key(*id))
      .filter(|id| {
        graph
          .upstream(id)
          .iter()
          .all(|up| finished.get(up).is_some_and(JobResult::is_success))
      })
      .cloned()
      .collect()
  }

  /// Spawn tasks to execute all ready jobs in parallel.
  fn spawn_ready_jobs(
    &self,
    workflow: &Workflow,
    ready: &[String],
    event: &ReleaseEvent,
    execution_id: &str,
  ) -> Result<Vec<JoinHandle<JobResult>>, ExecutionError> {
    let graph = workflow.graph();
    let mut handles = Vec::with_capacity(ready.len());

    for job_id in ready {
      let ancestors = graph.ancestors(job_id);
      let available = workflow
        .artifacts
        .iter()
        .filter(|a| ancestors.contains(&a.producer))
        .map(|a| a.name.clone())
        .collect();

      let ctx = self.prepare_job(workflow, job_id, event, execution_id, available)?;
      handles.push(tokio::spawn(run_job(ctx)));
    }

    Ok(handles)
  }

  /// Prepare everything needed to run a job (without actually running it).
  fn prepare_job(
    &self,
    workflow: &Workflow,
    job_id: &str,
    event: &ReleaseEvent,
    execution_id: &str,
    available: Vec<String>,
  ) -> Result<JobContext, ExecutionError> {
    let job = workflow
      .get_job(job_id)
      .ok_or_else(|| ExecutionError::JobNotFound {
        job_id: job_id.to_string(),
      })?
      .clone();

    let workspace = self.config.work_dir.join(execution_id).join(&job.job_id);
    let template = job_context(workflow, &job, event, &self.config.secrets);

    // A broken env template fails the job, not the execution
    let mut env = builtin_env(execution_id, &job, event, &workspace);
    let setup_error = match render_env([&workflow.env, &job.env], &template) {
      Ok(rendered) => {
        env.extend(rendered);
        None
      }
      Err((key, e)) => Some(JobError::Environment {
        key,
        message: e.to_string(),
      }),
    };

    Ok(JobContext {
      timeout_ms: job.timeout_ms.or(workflow.timeout_ms),
      job,
      execution_id: execution_id.to_string(),
      workspace,
      store: self.store.clone(),
      template,
      env,
      available,
      setup_error,
    })
  }

  /// Execute a single job, ignoring its dependencies.
  ///
  /// Useful to iterate on one matrix cell. Downloads only see artifacts
  /// already stored under the returned execution id, so jobs that consume
  /// artifacts will usually fail when run this way.
  pub async fn execute_job(
    &self,
    workflow: &Workflow,
    job_id: &str,
    event: ReleaseEvent,
    cancel: CancellationToken,
  ) -> Result<JobResult, ExecutionError> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let ctx = self.prepare_job(workflow, job_id, &event, &execution_id, Vec::new())?;

    tokio::select! {
        result = run_job(ctx) => Ok(result),
        _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
    }
  }

  /// Validate the workflow graph.
  fn validate_workflow(&self, workflow: &Workflow) -> Result<(), ExecutionError> {
    if workflow.jobs.is_empty() {
      return Err(ExecutionError::InvalidGraph {
        message: "workflow has no jobs".to_string(),
      });
    }

    let graph = workflow.graph();
    graph.validate().map_err(|e| ExecutionError::InvalidGraph {
      message: e.to_string(),
    })?;

    let known: HashSet<&String> = workflow.jobs.keys().collect();
    for job in workflow.jobs.values() {
      if let Some(need) = job.needs.iter().find(|n| !known.contains(n)) {
        return Err(ExecutionError::InvalidGraph {
          message: format!("job '{}' needs unknown job '{}'", job.job_id, need),
        });
      }
    }

    graph
      .topological_order()
      .map_err(|e| ExecutionError::InvalidGraph {
        message: e.to_string(),
      })?;

    Ok(())
  }
}
