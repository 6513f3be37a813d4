use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::enums::TriggerEvent;
use crate::job::JobDef;
use crate::template::TemplateValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub name: String,
  pub trigger: TriggerDef,
  /// Environment shared by every step of every job.
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub env: IndexMap<String, TemplateValue>,
  /// Default timeout for jobs that do not set their own.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  pub jobs: Vec<JobDef>,
}

/// When a workflow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDef {
  pub event: TriggerEvent,
  /// Branches the event must come from. Empty means any branch.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub branches: Vec<String>,
}

impl TriggerDef {
  /// Check whether an event from `branch` starts this workflow.
  pub fn matches(&self, event: TriggerEvent, branch: &str) -> bool {
    self.event == event && (self.branches.is_empty() || self.branches.iter().any(|b| b == branch))
  }
}
