//! Template context and environment for a job.
//!
//! Every template in a job is rendered against the same context:
//!
//! ```json
//! {
//!   "matrix":   { "os": "ubuntu-latest", "version": "3.12" },
//!   "job":      { "id": "build-ubuntu-latest-3.12", "group": "build", "runs_on": "ubuntu-latest" },
//!   "workflow": { "name": "release" },
//!   "release":  { "event": "release_published", "branch": "main", "tag": "v1.2.0" },
//!   "secrets":  { "PYPI_TOKEN": "..." }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::{Value, json};

use shipyard_workflow::template::render;
use shipyard_workflow::{Job, Workflow};

use crate::trigger::ReleaseEvent;

/// Build the template context for a job.
pub(crate) fn job_context(
  workflow: &Workflow,
  job: &Job,
  event: &ReleaseEvent,
  secrets: &BTreeMap<String, String>,
) -> Value {
  json!({
    "matrix": job.matrix,
    "job": {
      "id": job.job_id,
      "group": job.group,
      "runs_on": job.runs_on,
    },
    "workflow": { "name": workflow.name },
    "release": event,
    "secrets": secrets,
  })
}

/// Render an environment map. Later layers override earlier ones.
pub(crate) fn render_env<'a>(
  layers: impl IntoIterator<Item = &'a IndexMap<String, String>>,
  ctx: &Value,
) -> Result<IndexMap<String, String>, (String, minijinja::Error)> {
  let mut env = IndexMap::new();
  for layer in layers {
    for (key, value) in layer {
      let rendered = render(value, ctx).map_err(|e| (key.clone(), e))?;
      env.insert(key.clone(), rendered);
    }
  }
  Ok(env)
}

/// Variables every step sees, describing where it runs.
pub(crate) fn builtin_env(
  execution_id: &str,
  job: &Job,
  event: &ReleaseEvent,
  workspace: &Path,
) -> IndexMap<String, String> {
  let mut env = IndexMap::new();
  env.insert("SHIPYARD_EXECUTION_ID".to_string(), execution_id.to_string());
  env.insert("SHIPYARD_JOB_ID".to_string(), job.job_id.clone());
  env.insert(
    "SHIPYARD_RUNS_ON".to_string(),
    job.runs_on.clone().unwrap_or_default(),
  );
  env.insert(
    "SHIPYARD_WORKSPACE".to_string(),
    workspace.display().to_string(),
  );
  env.insert("SHIPYARD_RELEASE_BRANCH".to_string(), event.branch.clone());
  env.insert("SHIPYARD_RELEASE_TAG".to_string(), event.tag.clone());
  for (axis, value) in &job.matrix {
    let name = axis
      .chars()
      .map(|c| {
        if c.is_ascii_alphanumeric() {
          c.to_ascii_uppercase()
        } else {
          '_'
        }
      })
      .collect::<String>();
    env.insert(format!("SHIPYARD_MATRIX_{}", name), value.clone());
  }
  env
}

#[cfg(test)]
mod tests {
  use super::*;
  use shipyard_config::{TriggerDef, TriggerEvent};

  fn job() -> Job {
    let mut matrix = IndexMap::new();
    matrix.insert("os".to_string(), "linux".to_string());
    matrix.insert("python-version".to_string(), "3.12".to_string());
    Job {
      job_id: "build-linux-3.12".to_string(),
      group: "build".to_string(),
      runs_on: Some("linux".to_string()),
      matrix,
      needs: vec![],
      steps: vec![],
      env: IndexMap::new(),
      timeout_ms: None,
    }
  }

  fn workflow() -> Workflow {
    Workflow {
      name: "release".to_string(),
      trigger: TriggerDef {
        event: TriggerEvent::ReleasePublished,
        branches: vec![],
      },
      env: IndexMap::new(),
      jobs: IndexMap::new(),
      edges: vec![],
      artifacts: vec![],
      timeout_ms: None,
    }
  }

  #[test]
  fn test_job_context_renders_all_scopes() {
    let mut secrets = BTreeMap::new();
    secrets.insert("TOKEN".to_string(), "s3cret".to_string());
    let event = ReleaseEvent::published("main", "v1.0.0");

    let ctx = job_context(&workflow(), &job(), &event, &secrets);
    let out = render(
      "{{ workflow.name }}:{{ job.group }}:{{ matrix.os }}:{{ release.tag }}:{{ release.event }}:{{ secrets.TOKEN }}",
      &ctx,
    )
    .unwrap();

    assert_eq!(out, "release:build:linux:v1.0.0:release_published:s3cret");
  }

  #[test]
  fn test_render_env_layers_override() {
    let ctx = json!({ "matrix": { "os": "linux" } });
    let mut base = IndexMap::new();
    base.insert("TARGET".to_string(), "any".to_string());
    base.insert("KEEP".to_string(), "yes".to_string());
    let mut step = IndexMap::new();
    step.insert("TARGET".to_string(), "{{ matrix.os }}".to_string());

    let env = render_env([&base, &step], &ctx).unwrap();
    assert_eq!(env["TARGET"], "linux");
    assert_eq!(env["KEEP"], "yes");

    let mut broken = IndexMap::new();
    broken.insert("BAD".to_string(), "{{ nope.value }}".to_string());
    let (key, _) = render_env([&broken], &ctx).unwrap_err();
    assert_eq!(key, "BAD");
  }

  #[test]
  fn test_builtin_env_exposes_matrix() {
    let event = ReleaseEvent::published("main", "v1.0.0");
    let env = builtin_env("exec", &job(), &event, Path::new("/work"));

    assert_eq!(env["SHIPYARD_MATRIX_OS"], "linux");
    assert_eq!(env["SHIPYARD_MATRIX_PYTHON_VERSION"], "3.12");
    assert_eq!(env["SHIPYARD_RELEASE_TAG"], "v1.0.0");
    assert_eq!(env["SHIPYARD_WORKSPACE"], "/work");
  }
}
