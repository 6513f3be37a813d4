//! Built-in actions: upload-artifact, download-artifact and publish.

use std::path::{Path, PathBuf};

use globset::Glob;
use tracing::info;

use shipyard_artifact::bundle::{collect_files, download_bundle, upload_bundle};
use shipyard_publish::publisher_for;
use shipyard_workflow::template::render;
use shipyard_workflow::{ActionCall, BuiltinAction};

use crate::error::JobError;
use crate::job::JobContext;

/// Run an action and return a one-line summary of what it did.
pub(crate) async fn run_action(
  ctx: &JobContext,
  step_id: &str,
  call: &ActionCall,
) -> Result<String, JobError> {
  match call.action {
    BuiltinAction::UploadArtifact => upload(ctx, step_id, call).await,
    BuiltinAction::DownloadArtifact => download(ctx, step_id, call).await,
    BuiltinAction::Publish => publish(ctx, step_id, call).await,
  }
}

/// Render a parameter. Missing optional parameters are `None`.
fn param(ctx: &JobContext, step_id: &str, call: &ActionCall, key: &str) -> Result<Option<String>, JobError> {
  call
    .param(key)
    .map(|value| render(value, &ctx.template))
    .transpose()
    .map_err(|e| JobError::Template {
      step_id: step_id.to_string(),
      message: format!("{}: {}", key, e),
    })
}

/// Like [`param`] but for parameters the resolver already checked for.
fn required(ctx: &JobContext, step_id: &str, call: &ActionCall, key: &str) -> Result<String, JobError> {
  param(ctx, step_id, call, key)?.ok_or_else(|| JobError::Template {
    step_id: step_id.to_string(),
    message: format!("missing parameter '{}'", key),
  })
}

/// Resolve a workspace-relative path. Absolute paths are used as given.
fn workspace_path(ctx: &JobContext, path: &str) -> PathBuf {
  let path = Path::new(path);
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    ctx.workspace.join(path)
  }
}

async fn upload(ctx: &JobContext, step_id: &str, call: &ActionCall) -> Result<String, JobError> {
  let name = required(ctx, step_id, call, "name")?;
  let source = workspace_path(ctx, &required(ctx, step_id, call, "path")?);

  let keys = upload_bundle(ctx.store.as_ref(), &ctx.execution_id, &name, &source)
    .await
    .map_err(|source| JobError::Artifact {
      step_id: step_id.to_string(),
      source,
    })?;

  info!(job_id = %ctx.job.job_id, artifact = %name, files = keys.len(), "uploaded artifact");
  Ok(format!("uploaded {} file(s) as '{}'", keys.len(), name))
}

async fn download(ctx: &JobContext, step_id: &str, call: &ActionCall) -> Result<String, JobError> {
  let dest = workspace_path(ctx, &required(ctx, step_id, call, "path")?);
  let merge = param(ctx, step_id, call, "merge_multiple")?.is_some_and(|v| v == "true");

  // (artifact name, destination directory)
  let targets: Vec<(String, PathBuf)> = match param(ctx, step_id, call, "name")? {
    Some(name) => vec![(name, dest.clone())],
    None => {
      let pattern = required(ctx, step_id, call, "pattern")?;
      let matcher = Glob::new(&pattern)
        .map_err(|e| JobError::Template {
          step_id: step_id.to_string(),
          message: format!("invalid pattern '{}': {}", pattern, e),
        })?
        .compile_matcher();

      let names: Vec<String> = ctx
        .available
        .iter()
        .filter(|name| matcher.is_match(name.as_str()))
        .cloned()
        .collect();
      if names.is_empty() {
        return Err(JobError::NoMatchingArtifacts {
          step_id: step_id.to_string(),
          reference: pattern,
        });
      }

      names
        .into_iter()
        .map(|name| {
          let dir = if merge { dest.clone() } else { dest.join(&name) };
          (name, dir)
        })
        .collect()
    }
  };

  let mut files = 0;
  for (name, dir) in &targets {
    let written = download_bundle(ctx.store.as_ref(), &ctx.execution_id, name, dir)
      .await
      .map_err(|source| JobError::Artifact {
        step_id: step_id.to_string(),
        source,
      })?;
    files += written.len();
  }

  info!(job_id = %ctx.job.job_id, artifacts = targets.len(), files, "downloaded artifacts");
  Ok(format!(
    "downloaded {} artifact(s), {} file(s) into {}",
    targets.len(),
    files,
    dest.display()
  ))
}

async fn publish(ctx: &JobContext, step_id: &str, call: &ActionCall) -> Result<String, JobError> {
  let source = workspace_path(ctx, &required(ctx, step_id, call, "path")?);
  let repository_url = required(ctx, step_id, call, "repository_url")?;
  let token = param(ctx, step_id, call, "token")?;

  let files: Vec<PathBuf> = collect_files(&source)
    .await
    .map_err(|source| JobError::Artifact {
      step_id: step_id.to_string(),
      source,
    })?
    .into_iter()
    .map(|(_, path)| path)
    .collect();
  if files.is_empty() {
    return Err(JobError::Artifact {
      step_id: step_id.to_string(),
      source: shipyard_artifact::Error::Empty(source.display().to_string()),
    });
  }

  let publish_err = |source| JobError::Publish {
    step_id: step_id.to_string(),
    source,
  };
  let publisher = publisher_for(&repository_url, token).map_err(publish_err)?;
  let report = publisher.publish(&files).await.map_err(publish_err)?;

  info!(
    job_id = %ctx.job.job_id,
    repository = %report.repository,
    files = report.published.len(),
    "published release"
  );
  Ok(format!(
    "published {} file(s) to {}",
    report.published.len(),
    report.repository
  ))
}
