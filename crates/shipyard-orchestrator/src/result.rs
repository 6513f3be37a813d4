use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Succeeded,
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Succeeded,
  Failed,
  Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
  Succeeded,
  Failed,
  /// Failed, but the step has `continue_on_error`.
  FailedIgnored,
}

/// Result of a complete workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
  pub execution_id: String,
  pub workflow: String,
  pub status: ExecutionStatus,
  /// Every job of the workflow, in workflow order.
  pub jobs: IndexMap<String, JobResult>,
}

impl ExecutionResult {
  /// Ids of jobs with the given status.
  pub fn jobs_with(&self, status: JobStatus) -> Vec<&str> {
    self
      .jobs
      .values()
      .filter(|job| job.status == status)
      .map(|job| job.job_id.as_str())
      .collect()
  }
}

/// Result of a single job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
  pub job_id: String,
  pub status: JobStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub steps: Vec<StepResult>,
  pub duration_ms: u64,
}

impl JobResult {
  pub fn skipped(job_id: impl Into<String>) -> Self {
    Self {
      job_id: job_id.into(),
      status: JobStatus::Skipped,
      error: None,
      steps: Vec::new(),
      duration_ms: 0,
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == JobStatus::Succeeded
  }
}

/// Result of a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
  pub step_id: String,
  pub status: StepStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exit_code: Option<i32>,
  /// Captured stdout, or a summary line for actions.
  pub output: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub stderr: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}
