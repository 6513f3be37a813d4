//! Artifact-flow checks that do not block execution.
//!
//! A resolved workflow already guarantees that every download is satisfied by
//! an upstream upload. These checks look at the other direction: artifacts that
//! are produced but never consumed, consumed more than once, or join jobs that
//! wait on only part of a matrix.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use globset::Glob;
use serde::Serialize;

use shipyard_workflow::{BuiltinAction, Workflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
  pub severity: Severity,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub job_id: Option<String>,
  pub message: String,
}

impl Diagnostic {
  fn warning(job_id: Option<&str>, message: String) -> Self {
    Self {
      severity: Severity::Warning,
      job_id: job_id.map(str::to_string),
      message,
    }
  }

  fn error(job_id: Option<&str>, message: String) -> Self {
    Self {
      severity: Severity::Error,
      job_id: job_id.map(str::to_string),
      message,
    }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let level = match self.severity {
      Severity::Warning => "warning",
      Severity::Error => "error",
    };
    match &self.job_id {
      Some(job_id) => write!(f, "{}: [{}] {}", level, job_id, self.message),
      None => write!(f, "{}: {}", level, self.message),
    }
  }
}

/// Check how artifacts move through the workflow.
///
/// Every artifact should be downloaded exactly once, by a job that depends on
/// its producer, and a job that needs part of a matrix should need all of it.
pub fn check_artifact_flow(workflow: &Workflow) -> Vec<Diagnostic> {
  let mut diagnostics = Vec::new();
  let graph = workflow.graph();

  let mut consumers: BTreeMap<&str, Vec<&str>> = workflow
    .artifacts
    .iter()
    .map(|a| (a.name.as_str(), Vec::new()))
    .collect();

  for job in workflow.jobs.values() {
    let ancestors = graph.ancestors(&job.job_id);

    for call in job.actions(BuiltinAction::DownloadArtifact) {
      let matched: Vec<&str> = if let Some(name) = call.param("name") {
        workflow
          .artifacts
          .iter()
          .filter(|a| a.name == name)
          .map(|a| a.name.as_str())
          .collect()
      } else if let Some(pattern) = call.param("pattern") {
        match Glob::new(pattern) {
          Ok(glob) => {
            // Patterns only ever see upstream artifacts, as at run time
            let matcher = glob.compile_matcher();
            workflow
              .artifacts
              .iter()
              .filter(|a| ancestors.contains(&a.producer) && matcher.is_match(&a.name))
              .map(|a| a.name.as_str())
              .collect()
          }
          Err(e) => {
            diagnostics.push(Diagnostic::error(
              Some(&job.job_id),
              format!("invalid artifact pattern '{}': {}", pattern, e),
            ));
            continue;
          }
        }
      } else {
        Vec::new()
      };

      if matched.is_empty() {
        diagnostics.push(Diagnostic::error(
          Some(&job.job_id),
          "download matches no artifact".to_string(),
        ));
      }

      for name in matched {
        if let Some(artifact) = workflow.artifacts.iter().find(|a| a.name == name) {
          if !ancestors.contains(&artifact.producer) {
            diagnostics.push(Diagnostic::error(
              Some(&job.job_id),
              format!(
                "downloads '{}' but does not depend on its producer '{}'",
                name, artifact.producer
              ),
            ));
          }
        }
        if let Some(list) = consumers.get_mut(name) {
          list.push(job.job_id.as_str());
        }
      }
    }
  }

  for artifact in &workflow.artifacts {
    let list = &consumers[artifact.name.as_str()];
    match list.len() {
      0 => diagnostics.push(Diagnostic::warning(
        Some(&artifact.producer),
        format!("artifact '{}' is never downloaded", artifact.name),
      )),
      1 => {}
      n => diagnostics.push(Diagnostic::warning(
        Some(&artifact.producer),
        format!(
          "artifact '{}' is downloaded {} times (by {})",
          artifact.name,
          n,
          list.join(", ")
        ),
      )),
    }
  }

  // A job waiting on some cells of a matrix should wait on all of them
  let mut group_sizes: HashMap<&str, usize> = HashMap::new();
  for job in workflow.jobs.values() {
    *group_sizes.entry(job.group.as_str()).or_default() += 1;
  }
  for job in workflow.jobs.values() {
    let mut needed: BTreeMap<&str, usize> = BTreeMap::new();
    for up in graph.upstream(&job.job_id) {
      if let Some(upstream) = workflow.get_job(up) {
        *needed.entry(upstream.group.as_str()).or_default() += 1;
      }
    }
    for (group, count) in needed {
      let total = group_sizes.get(group).copied().unwrap_or_default();
      if count < total {
        diagnostics.push(Diagnostic::warning(
          Some(&job.job_id),
          format!("needs {} of {} jobs in '{}'", count, total, group),
        ));
      }
    }
  }

  diagnostics
}

#[cfg(test)]
mod tests {
  use super::*;
  use indexmap::IndexMap;
  use shipyard_config::{TriggerDef, TriggerEvent};
  use shipyard_workflow::{ActionCall, ArtifactRef, Job, Step, StepKind};

  fn action(action: BuiltinAction, params: &[(&str, &str)]) -> Step {
    Step {
      step_id: action.name().to_string(),
      kind: StepKind::Action(ActionCall {
        action,
        with: params
          .iter()
          .map(|(k, v)| (k.to_string(), v.to_string()))
          .collect(),
      }),
      env: IndexMap::new(),
      continue_on_error: false,
    }
  }

  fn job(id: &str, group: &str, needs: &[&str], steps: Vec<Step>) -> Job {
    Job {
      job_id: id.to_string(),
      group: group.to_string(),
      runs_on: None,
      matrix: IndexMap::new(),
      needs: needs.iter().map(|s| s.to_string()).collect(),
      steps,
      env: IndexMap::new(),
      timeout_ms: None,
    }
  }

  fn upload(name: &str) -> Step {
    action(BuiltinAction::UploadArtifact, &[("name", name), ("path", "dist")])
  }

  fn workflow(jobs: Vec<Job>) -> Workflow {
    let mut edges = Vec::new();
    let mut artifacts = Vec::new();
    for job in &jobs {
      for up in &job.needs {
        edges.push((up.clone(), job.job_id.clone()));
      }
      for call in job.actions(BuiltinAction::UploadArtifact) {
        artifacts.push(ArtifactRef {
          name: call.param("name").unwrap().to_string(),
          producer: job.job_id.clone(),
        });
      }
    }
    Workflow {
      name: "release".to_string(),
      trigger: TriggerDef {
        event: TriggerEvent::Manual,
        branches: vec![],
      },
      env: IndexMap::new(),
      jobs: jobs.into_iter().map(|j| (j.job_id.clone(), j)).collect(),
      edges,
      artifacts,
      timeout_ms: None,
    }
  }

  #[test]
  fn test_clean_fan_in_has_no_diagnostics() {
    let wf = workflow(vec![
      job("build-a", "build", &[], vec![upload("dist-a")]),
      job("build-b", "build", &[], vec![upload("dist-b")]),
      job(
        "publish",
        "publish",
        &["build-a", "build-b"],
        vec![action(
          BuiltinAction::DownloadArtifact,
          &[("pattern", "dist-*"), ("path", "dist")],
        )],
      ),
    ]);

    assert!(check_artifact_flow(&wf).is_empty());
  }

  #[test]
  fn test_unused_and_double_consumed_artifacts() {
    let wf = workflow(vec![
      job("build-a", "build", &[], vec![upload("dist-a")]),
      job("build-b", "build", &[], vec![upload("dist-b")]),
      job(
        "publish",
        "publish",
        &["build-a", "build-b"],
        vec![
          action(
            BuiltinAction::DownloadArtifact,
            &[("name", "dist-a"), ("path", "one")],
          ),
          action(
            BuiltinAction::DownloadArtifact,
            &[("name", "dist-a"), ("path", "two")],
          ),
        ],
      ),
    ]);

    let diagnostics = check_artifact_flow(&wf);
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.severity == Severity::Warning));
    assert!(diagnostics[0].message.contains("downloaded 2 times"));
    assert!(diagnostics[1].message.contains("'dist-b' is never downloaded"));
  }

  #[test]
  fn test_missing_dependency_is_an_error() {
    let wf = workflow(vec![
      job("build-a", "build", &[], vec![upload("dist-a")]),
      job(
        "publish",
        "publish",
        &[],
        vec![action(
          BuiltinAction::DownloadArtifact,
          &[("name", "dist-a"), ("path", "dist")],
        )],
      ),
    ]);

    let diagnostics = check_artifact_flow(&wf);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].job_id.as_deref(), Some("publish"));
  }

  #[test]
  fn test_pattern_ignores_artifacts_of_unrelated_jobs() {
    let wf = workflow(vec![
      job("build", "build", &[], vec![upload("dist-wheel")]),
      job("docs", "docs", &[], vec![upload("dist-docs")]),
      job(
        "publish",
        "publish",
        &["build"],
        vec![action(
          BuiltinAction::DownloadArtifact,
          &[("pattern", "dist-*"), ("path", "dist")],
        )],
      ),
    ]);

    let diagnostics = check_artifact_flow(&wf);
    assert!(diagnostics.iter().all(|d| d.severity == Severity::Warning));
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].message.contains("'dist-docs' is never downloaded"));
  }

  #[test]
  fn test_pattern_without_upstream_match_is_an_error() {
    let wf = workflow(vec![
      job("docs", "docs", &[], vec![upload("dist-docs")]),
      job(
        "publish",
        "publish",
        &[],
        vec![action(
          BuiltinAction::DownloadArtifact,
          &[("pattern", "dist-*"), ("path", "dist")],
        )],
      ),
    ]);

    let diagnostics = check_artifact_flow(&wf);
    assert!(
      diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error && d.message == "download matches no artifact")
    );
  }

  #[test]
  fn test_partial_matrix_dependency_warns() {
    let wf = workflow(vec![
      job("build-a", "build", &[], vec![upload("dist-a")]),
      job("build-b", "build", &[], vec![upload("dist-b")]),
      job(
        "publish",
        "publish",
        &["build-a"],
        vec![action(
          BuiltinAction::DownloadArtifact,
          &[("name", "dist-a"), ("path", "dist")],
        )],
      ),
    ]);

    let diagnostics = check_artifact_flow(&wf);
    assert!(
      diagnostics
        .iter()
        .any(|d| d.message == "needs 1 of 2 jobs in 'build'")
    );
  }

  #[test]
  fn test_diagnostic_display() {
    let d = Diagnostic::warning(Some("publish"), "something".to_string());
    assert_eq!(d.to_string(), "warning: [publish] something");
  }
}
