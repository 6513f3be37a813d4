use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single, fully expanded job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub job_id: String,
  /// The `job_id` of the definition this job was expanded from.
  pub group: String,
  pub runs_on: Option<String>,
  /// Matrix values for this cell, in axis order. Empty for non-matrix jobs.
  pub matrix: IndexMap<String, String>,
  /// Expanded upstream job ids.
  pub needs: Vec<String>,
  pub steps: Vec<Step>,
  pub env: IndexMap<String, String>,
  pub timeout_ms: Option<u64>,
}

impl Job {
  /// Action steps of the given kind, in order.
  pub fn actions(&self, action: BuiltinAction) -> impl Iterator<Item = &ActionCall> {
    self.steps.iter().filter_map(move |step| match &step.kind {
      StepKind::Action(call) if call.action == action => Some(call),
      _ => None,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
  pub step_id: String,
  pub kind: StepKind,
  pub env: IndexMap<String, String>,
  pub continue_on_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
  /// A shell command (template, rendered at run time).
  Run { command: String },
  Action(ActionCall),
}

/// Invocation of a built-in action with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
  pub action: BuiltinAction,
  pub with: IndexMap<String, String>,
}

impl ActionCall {
  pub fn param(&self, key: &str) -> Option<&str> {
    self.with.get(key).map(String::as_str)
  }
}

/// Actions the orchestrator provides itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuiltinAction {
  /// Store files from the job workspace as a named artifact.
  UploadArtifact,
  /// Fetch one or more artifacts into the job workspace.
  DownloadArtifact,
  /// Hand staged files to a package index.
  Publish,
}

impl BuiltinAction {
  pub const ALL: [BuiltinAction; 3] = [
    BuiltinAction::UploadArtifact,
    BuiltinAction::DownloadArtifact,
    BuiltinAction::Publish,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      BuiltinAction::UploadArtifact => "upload-artifact",
      BuiltinAction::DownloadArtifact => "download-artifact",
      BuiltinAction::Publish => "publish",
    }
  }
}

impl fmt::Display for BuiltinAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for BuiltinAction {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    BuiltinAction::ALL
      .into_iter()
      .find(|action| action.name() == s)
      .ok_or_else(|| s.to_string())
  }
}
