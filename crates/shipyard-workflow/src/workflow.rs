use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use shipyard_config::TriggerDef;

use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::job::Job;

/// A locked workflow ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub name: String,
  pub trigger: TriggerDef,
  pub env: IndexMap<String, String>,
  /// Jobs keyed by id, in expansion order.
  pub jobs: IndexMap<String, Job>,
  pub edges: Vec<(String, String)>,
  /// Every artifact uploaded by the workflow.
  pub artifacts: Vec<ArtifactRef>,
  pub timeout_ms: Option<u64>,
}

/// An artifact and the job that uploads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
  pub name: String,
  pub producer: String,
}

impl Workflow {
  /// Build the graph structure for traversal.
  pub fn graph(&self) -> Graph {
    Graph::new(self.jobs.keys(), &self.edges)
  }

  /// Get a job by ID.
  pub fn get_job(&self, job_id: &str) -> Option<&Job> {
    self.jobs.get(job_id)
  }

  /// Get a job by ID, failing if it does not exist.
  pub fn require_job(&self, job_id: &str) -> Result<&Job, WorkflowError> {
    self
      .jobs
      .get(job_id)
      .ok_or_else(|| WorkflowError::JobNotFound(job_id.to_string()))
  }
}
