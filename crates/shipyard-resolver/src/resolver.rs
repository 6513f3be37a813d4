use std::collections::{HashMap, HashSet};

use globset::Glob;
use indexmap::IndexMap;
use serde_json::json;
use tracing::debug;

use shipyard_config::{JobDef, StepDef, StepKindDef, WorkflowDef};
use shipyard_workflow::template::render;
use shipyard_workflow::{ActionCall, ArtifactRef, BuiltinAction, Job, Step, StepKind, Workflow};

use crate::error::ResolveError;
use crate::matrix::{cell_job_id, expand_matrix, is_valid_artifact_name, is_valid_job_id};

/// Resolver transforms a WorkflowDef into a locked Workflow.
pub trait Resolver: Send + Sync {
  /// Resolve a workflow definition into a locked workflow.
  ///
  /// This process:
  /// 1. Expands matrix jobs into one job per cell
  /// 2. Validates the graph structure (no cycles, known dependencies)
  /// 3. Validates action calls and the artifact flow between jobs
  fn resolve(&self, def: WorkflowDef) -> Result<Workflow, ResolveError>;
}

/// Standard resolver for the built-in action set.
#[derive(Debug, Clone, Default)]
pub struct StandardResolver;

impl StandardResolver {
  pub fn new() -> Self {
    Self
  }

  /// Expand one job definition into its matrix cells.
  fn expand_job(&self, workflow_name: &str, def: &JobDef) -> Result<Vec<Job>, ResolveError> {
    let cells = match &def.matrix {
      Some(matrix) => expand_matrix(&def.job_id, matrix)?,
      None => vec![IndexMap::new()],
    };

    cells
      .into_iter()
      .map(|cell| {
        let job_id = cell_job_id(&def.job_id, &cell);
        let ctx = json!({
          "matrix": cell,
          "job": { "id": job_id, "group": def.job_id },
          "workflow": { "name": workflow_name },
        });
        let template_err = |e: minijinja::Error| ResolveError::Template {
          job_id: job_id.clone(),
          message: e.to_string(),
        };

        let runs_on = def
          .runs_on
          .as_deref()
          .map(|label| render(label, &ctx))
          .transpose()
          .map_err(template_err)?;

        let steps = self.resolve_steps(&job_id, &def.steps, &ctx)?;

        Ok(Job {
          job_id: job_id.clone(),
          group: def.job_id.clone(),
          runs_on,
          matrix: cell,
          needs: Vec::new(),
          steps,
          env: def.env.clone(),
          timeout_ms: def.timeout_ms,
        })
      })
      .collect()
  }

  fn resolve_steps(
    &self,
    job_id: &str,
    defs: &[StepDef],
    ctx: &serde_json::Value,
  ) -> Result<Vec<Step>, ResolveError> {
    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(defs.len());

    for (index, def) in defs.iter().enumerate() {
      let step_id = def
        .step_id
        .clone()
        .unwrap_or_else(|| format!("step-{}", index + 1));
      if !seen.insert(step_id.clone()) {
        return Err(ResolveError::DuplicateStep {
          job_id: job_id.to_string(),
          step_id,
        });
      }

      let kind = match &def.kind {
        StepKindDef::Run { run } => StepKind::Run {
          command: run.clone(),
        },
        StepKindDef::Uses { uses, with } => {
          let action = uses
            .parse::<BuiltinAction>()
            .map_err(|action| ResolveError::UnknownAction {
              job_id: job_id.to_string(),
              step_id: step_id.clone(),
              action,
            })?;
          StepKind::Action(self.resolve_action(job_id, &step_id, action, with, ctx)?)
        }
      };

      steps.push(Step {
        step_id,
        kind,
        env: def.env.clone(),
        continue_on_error: def.continue_on_error,
      });
    }

    Ok(steps)
  }

  /// Check required parameters and render the artifact name/pattern.
  fn resolve_action(
    &self,
    job_id: &str,
    step_id: &str,
    action: BuiltinAction,
    with: &IndexMap<String, String>,
    ctx: &serde_json::Value,
  ) -> Result<ActionCall, ResolveError> {
    let invalid = |message: String| ResolveError::InvalidAction {
      job_id: job_id.to_string(),
      step_id: step_id.to_string(),
      message,
    };
    let require = |key: &str| {
      if with.contains_key(key) {
        Ok(())
      } else {
        Err(invalid(format!("{} requires '{}'", action, key)))
      }
    };

    match action {
      BuiltinAction::UploadArtifact => {
        require("name")?;
        require("path")?;
      }
      BuiltinAction::DownloadArtifact => {
        require("path")?;
        match (with.contains_key("name"), with.contains_key("pattern")) {
          (true, false) | (false, true) => {}
          _ => {
            return Err(invalid(format!(
              "{} requires exactly one of 'name' or 'pattern'",
              action
            )));
          }
        }
      }
      BuiltinAction::Publish => {
        require("path")?;
        require("repository_url")?;
      }
    }

    // Artifact names are fixed at resolve time so the flow can be checked
    let mut with = with.clone();
    if action != BuiltinAction::Publish {
      for key in ["name", "pattern"] {
        if let Some(value) = with.get_mut(key) {
          *value = render(value, ctx).map_err(|e| ResolveError::Template {
            job_id: job_id.to_string(),
            message: e.to_string(),
          })?;
        }
      }
    }

    if let Some(pattern) = with.get("pattern") {
      Glob::new(pattern).map_err(|e| invalid(format!("invalid pattern '{}': {}", pattern, e)))?;
    }

    Ok(ActionCall { action, with })
  }

  /// Check for cycles using DFS.
  fn detect_cycle(
    &self,
    job_ids: &[String],
    edges: &[(String, String)],
  ) -> Result<(), ResolveError> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for job_id in job_ids {
      adjacency.insert(job_id.as_str(), Vec::new());
    }
    for (from, to) in edges {
      if let Some(neighbors) = adjacency.get_mut(from.as_str()) {
        neighbors.push(to.as_str());
      }
    }

    // DFS with coloring: 0 = white (unvisited), 1 = gray (in progress), 2 = black (done)
    let mut color: HashMap<&str, u8> = job_ids.iter().map(|id| (id.as_str(), 0u8)).collect();

    fn dfs<'a>(
      job: &'a str,
      adjacency: &HashMap<&str, Vec<&'a str>>,
      color: &mut HashMap<&'a str, u8>,
    ) -> Option<&'a str> {
      color.insert(job, 1);

      if let Some(neighbors) = adjacency.get(job) {
        for &neighbor in neighbors {
          match color.get(neighbor) {
            Some(1) => return Some(neighbor),
            Some(0) => {
              if let Some(found) = dfs(neighbor, adjacency, color) {
                return Some(found);
              }
            }
            _ => {}
          }
        }
      }

      color.insert(job, 2);
      None
    }

    for job_id in job_ids {
      if color.get(job_id.as_str()) == Some(&0) {
        if let Some(found) = dfs(job_id.as_str(), &adjacency, &mut color) {
          return Err(ResolveError::CycleDetected {
            job_id: found.to_string(),
          });
        }
      }
    }

    Ok(())
  }

  /// Record uploads and check every download against upstream uploads.
  fn resolve_artifacts(&self, workflow: &Workflow) -> Result<Vec<ArtifactRef>, ResolveError> {
    let mut artifacts: Vec<ArtifactRef> = Vec::new();
    for job in workflow.jobs.values() {
      for call in job.actions(BuiltinAction::UploadArtifact) {
        let name = call.param("name").unwrap_or_default();
        if !is_valid_artifact_name(name) {
          return Err(ResolveError::InvalidArtifactName {
            job_id: job.job_id.clone(),
            name: name.to_string(),
          });
        }
        if let Some(existing) = artifacts.iter().find(|a| a.name == name) {
          return Err(ResolveError::DuplicateArtifact {
            name: name.to_string(),
            first: existing.producer.clone(),
            second: job.job_id.clone(),
          });
        }
        artifacts.push(ArtifactRef {
          name: name.to_string(),
          producer: job.job_id.clone(),
        });
      }
    }

    let graph = workflow.graph();
    for job in workflow.jobs.values() {
      let ancestors = graph.ancestors(&job.job_id);

      for call in job.actions(BuiltinAction::DownloadArtifact) {
        if let Some(name) = call.param("name") {
          let artifact = artifacts.iter().find(|a| a.name == name).ok_or_else(|| {
            ResolveError::UnknownArtifact {
              job_id: job.job_id.clone(),
              reference: name.to_string(),
            }
          })?;
          if !ancestors.contains(&artifact.producer) {
            return Err(ResolveError::ArtifactNotUpstream {
              job_id: job.job_id.clone(),
              name: name.to_string(),
              producer: artifact.producer.clone(),
            });
          }
        } else if let Some(pattern) = call.param("pattern") {
          let matcher = Glob::new(pattern)
            .map(|g| g.compile_matcher())
            .map_err(|e| ResolveError::InvalidAction {
              job_id: job.job_id.clone(),
              step_id: String::new(),
              message: e.to_string(),
            })?;
          let matched = artifacts
            .iter()
            .any(|a| ancestors.contains(&a.producer) && matcher.is_match(&a.name));
          if !matched {
            return Err(ResolveError::UnknownArtifact {
              job_id: job.job_id.clone(),
              reference: pattern.to_string(),
            });
          }
        }
      }
    }

    Ok(artifacts)
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, def: WorkflowDef) -> Result<Workflow, ResolveError> {
    if def.jobs.is_empty() {
      return Err(ResolveError::EmptyWorkflow);
    }

    let mut group_ids: HashSet<&str> = HashSet::new();
    for job in &def.jobs {
      if !is_valid_job_id(&job.job_id) {
        return Err(ResolveError::InvalidJobId {
          job_id: job.job_id.clone(),
        });
      }
      if !group_ids.insert(job.job_id.as_str()) {
        return Err(ResolveError::DuplicateJob {
          job_id: job.job_id.clone(),
        });
      }
    }

    // Expand matrices, remembering which cells belong to which group
    let mut jobs: IndexMap<String, Job> = IndexMap::new();
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for job_def in &def.jobs {
      for job in self.expand_job(&def.name, job_def)? {
        groups
          .entry(job_def.job_id.clone())
          .or_default()
          .push(job.job_id.clone());
        if jobs.contains_key(&job.job_id) {
          return Err(ResolveError::DuplicateJob { job_id: job.job_id });
        }
        jobs.insert(job.job_id.clone(), job);
      }
    }

    // Turn group-level needs into cell-to-cell edges
    let mut edges = Vec::new();
    for job_def in &def.jobs {
      let mut upstream = Vec::new();
      for need in &job_def.needs {
        if *need == job_def.job_id {
          return Err(ResolveError::CycleDetected {
            job_id: need.clone(),
          });
        }
        let cells = groups
          .get(need)
          .ok_or_else(|| ResolveError::UnknownDependency {
            job_id: job_def.job_id.clone(),
            need: need.clone(),
          })?;
        upstream.extend(cells.iter().cloned());
      }

      for cell in &groups[&job_def.job_id] {
        for up in &upstream {
          edges.push((up.clone(), cell.clone()));
        }
        if let Some(job) = jobs.get_mut(cell) {
          job.needs = upstream.clone();
        }
      }
    }

    let job_ids: Vec<String> = jobs.keys().cloned().collect();
    self.detect_cycle(&job_ids, &edges)?;

    let mut workflow = Workflow {
      name: def.name,
      trigger: def.trigger,
      env: def.env,
      jobs,
      edges,
      artifacts: Vec::new(),
      timeout_ms: def.timeout_ms,
    };
    workflow.graph().validate()?;
    workflow.artifacts = self.resolve_artifacts(&workflow)?;

    debug!(
      workflow = %workflow.name,
      jobs = workflow.jobs.len(),
      artifacts = workflow.artifacts.len(),
      "resolved workflow"
    );

    Ok(workflow)
  }
}
