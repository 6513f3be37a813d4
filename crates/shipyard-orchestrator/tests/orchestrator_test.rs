//! Integration tests for Orchestrator::execute using real shell commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use shipyard_artifact::FsStore;
use shipyard_config::WorkflowDef;
use shipyard_orchestrator::{
  ChannelNotifier, ExecutionError, ExecutionEvent, ExecutionStatus, JobStatus, Orchestrator,
  OrchestratorConfig, ReleaseEvent, StepStatus,
};
use shipyard_resolver::{Resolver, StandardResolver, check_artifact_flow};
use shipyard_workflow::Workflow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn resolve(def: Value) -> Workflow {
  let def: WorkflowDef = serde_json::from_value(def).expect("invalid workflow definition");
  StandardResolver::new()
    .resolve(def)
    .expect("failed to resolve workflow")
}

fn create_orchestrator(root: &Path) -> Orchestrator {
  let config = OrchestratorConfig::new(root.join("work")).with_secret("TOKEN", "s3cret");
  let store = Arc::new(FsStore::new(root.join("artifacts")));
  Orchestrator::new(config, store)
}

/// The release shape: a build matrix fanning in to one publish job.
fn release_workflow(index: &Path, build_command: &str) -> Value {
  json!({
    "name": "release",
    "trigger": { "event": "release_published", "branches": ["main"] },
    "jobs": [
      {
        "job_id": "build",
        "runs_on": "{{ matrix.os }}",
        "matrix": {
          "os": ["linux", "macos"],
          "version": ["3.11", "3.12"]
        },
        "steps": [
          { "step_id": "wheel", "run": build_command },
          {
            "step_id": "upload",
            "uses": "upload-artifact",
            "with": { "name": "dist-{{ matrix.os }}-{{ matrix.version }}", "path": "dist" }
          }
        ]
      },
      {
        "job_id": "publish",
        "needs": ["build"],
        "steps": [
          {
            "uses": "download-artifact",
            "with": { "pattern": "dist-*", "path": "dist", "merge_multiple": "true" }
          },
          { "step_id": "sdist", "run": "echo sdist > dist/pkg-{{ release.tag }}.tar.gz" },
          {
            "uses": "publish",
            "with": {
              "path": "dist",
              "repository_url": format!("file://{}", index.display()),
              "token": "{{ secrets.TOKEN }}"
            }
          }
        ]
      }
    ]
  })
}

const BUILD_WHEEL: &str =
  "mkdir -p dist && echo \"$SHIPYARD_RUNS_ON\" > dist/pkg-{{ matrix.version }}-{{ matrix.os }}.whl";

fn sorted_dir(path: &Path) -> Vec<String> {
  let mut names: Vec<String> = std::fs::read_dir(path)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  names
}

#[tokio::test]
async fn test_fan_out_fan_in_publishes_every_artifact() {
  let root = tempfile::tempdir().unwrap();
  let index = root.path().join("index");
  let workflow = resolve(release_workflow(&index, BUILD_WHEEL));
  assert!(check_artifact_flow(&workflow).is_empty());

  let (tx, mut rx) = mpsc::unbounded_channel();
  let config = OrchestratorConfig::new(root.path().join("work")).with_secret("TOKEN", "s3cret");
  let store = Arc::new(FsStore::new(root.path().join("artifacts")));
  let orchestrator = Orchestrator::with_notifier(config, store, ChannelNotifier::new(tx));

  let result = orchestrator
    .execute(
      &workflow,
      ReleaseEvent::published("main", "1.0.0"),
      CancellationToken::new(),
    )
    .await
    .unwrap();

  assert_eq!(result.status, ExecutionStatus::Succeeded);
  assert_eq!(result.jobs.len(), 5);
  assert!(result.jobs.values().all(|j| j.status == JobStatus::Succeeded));

  assert_eq!(
    sorted_dir(&index),
    vec![
      "pkg-1.0.0.tar.gz",
      "pkg-3.11-linux.whl",
      "pkg-3.11-macos.whl",
      "pkg-3.12-linux.whl",
      "pkg-3.12-macos.whl",
    ]
  );
  let contents = std::fs::read_to_string(index.join("pkg-3.12-macos.whl")).unwrap();
  assert_eq!(contents.trim(), "macos");

  // The join job starts only after every build job completed
  let mut events = Vec::new();
  while let Ok(event) = rx.try_recv() {
    events.push(event);
  }
  let publish_started = events
    .iter()
    .position(|e| matches!(e, ExecutionEvent::JobStarted { job_id, .. } if job_id == "publish"))
    .unwrap();
  let builds_completed: Vec<usize> = events
    .iter()
    .enumerate()
    .filter(|(_, e)| {
      matches!(e, ExecutionEvent::JobCompleted { job_id, .. } if job_id.starts_with("build-"))
    })
    .map(|(i, _)| i)
    .collect();
  assert_eq!(builds_completed.len(), 4);
  assert!(builds_completed.iter().all(|i| *i < publish_started));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::WorkflowCompleted { .. })
  ));
}

#[tokio::test]
async fn test_failed_build_skips_join_job() {
  let root = tempfile::tempdir().unwrap();
  let index = root.path().join("index");
  let build = format!(
    "{{% if matrix.os == 'macos' and matrix.version == '3.11' %}}exit 3; {{% endif %}}{}",
    BUILD_WHEEL
  );
  let workflow = resolve(release_workflow(&index, &build));
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(
      &workflow,
      ReleaseEvent::published("main", "1.0.0"),
      CancellationToken::new(),
    )
    .await
    .unwrap();

  assert_eq!(result.status, ExecutionStatus::Failed);
  assert_eq!(result.jobs_with(JobStatus::Failed), vec!["build-macos-3.11"]);
  assert_eq!(result.jobs_with(JobStatus::Skipped), vec!["publish"]);
  assert_eq!(result.jobs_with(JobStatus::Succeeded).len(), 3);

  let failed = &result.jobs["build-macos-3.11"];
  assert_eq!(failed.steps.len(), 1);
  assert_eq!(failed.steps[0].status, StepStatus::Failed);
  assert_eq!(failed.steps[0].exit_code, Some(3));
  assert!(failed.error.as_deref().unwrap().contains("code 3"));

  assert!(!index.exists());
}

#[tokio::test]
async fn test_trigger_mismatch_runs_nothing() {
  let root = tempfile::tempdir().unwrap();
  let workflow = resolve(release_workflow(&root.path().join("index"), BUILD_WHEEL));
  let orchestrator = create_orchestrator(root.path());

  let err = orchestrator
    .execute(
      &workflow,
      ReleaseEvent::published("feature/x", "1.0.0"),
      CancellationToken::new(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, ExecutionError::TriggerMismatch { .. }));

  let err = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap_err();
  assert!(matches!(err, ExecutionError::TriggerMismatch { .. }));

  assert!(!root.path().join("work").exists());
}

fn single_job(steps: Value, timeout_ms: Option<u64>) -> Workflow {
  let mut job = json!({ "job_id": "only", "steps": steps });
  if let Some(ms) = timeout_ms {
    job["timeout_ms"] = json!(ms);
  }
  resolve(json!({
    "name": "release",
    "trigger": { "event": "manual" },
    "env": { "GREETING": "hello from {{ workflow.name }}" },
    "jobs": [job]
  }))
}

#[tokio::test]
async fn test_env_and_secrets_reach_commands() {
  let root = tempfile::tempdir().unwrap();
  let workflow = single_job(
    json!([
      {
        "run": "echo \"$GREETING $TARGET {{ secrets.TOKEN }} $SHIPYARD_JOB_ID\"",
        "env": { "TARGET": "{{ release.branch }}" }
      }
    ]),
    None,
  );
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  let job = &result.jobs["only"];
  assert_eq!(job.status, JobStatus::Succeeded);
  assert_eq!(
    job.steps[0].output.trim(),
    "hello from release main s3cret only"
  );
}

#[tokio::test]
async fn test_continue_on_error() {
  let root = tempfile::tempdir().unwrap();
  let workflow = single_job(
    json!([
      { "run": "echo oops >&2; exit 1", "continue_on_error": true },
      { "run": "echo still running" }
    ]),
    None,
  );
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  let job = &result.jobs["only"];
  assert_eq!(job.status, JobStatus::Succeeded);
  assert_eq!(job.steps[0].status, StepStatus::FailedIgnored);
  assert_eq!(job.steps[0].stderr.trim(), "oops");
  assert_eq!(job.steps[1].output.trim(), "still running");
}

#[tokio::test]
async fn test_template_error_fails_step() {
  let root = tempfile::tempdir().unwrap();
  let workflow = single_job(json!([{ "run": "echo {{ secrets.MISSING }}" }]), None);
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  let job = &result.jobs["only"];
  assert_eq!(job.status, JobStatus::Failed);
  assert!(job.error.as_deref().unwrap().contains("failed to render template"));
}

#[tokio::test]
async fn test_job_timeout() {
  let root = tempfile::tempdir().unwrap();
  let workflow = single_job(json!([{ "run": "sleep 5" }]), Some(200));
  let orchestrator = create_orchestrator(root.path());

  let result = tokio::time::timeout(
    Duration::from_secs(3),
    orchestrator.execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new()),
  )
  .await
  .expect("timeout should stop the job")
  .unwrap();

  let job = &result.jobs["only"];
  assert_eq!(job.status, JobStatus::Failed);
  assert!(job.error.as_deref().unwrap().contains("timed out after 200ms"));
}

#[tokio::test]
async fn test_cancellation() {
  let root = tempfile::tempdir().unwrap();
  let workflow = single_job(json!([{ "run": "sleep 5" }]), None);
  let orchestrator = create_orchestrator(root.path());

  let cancel = CancellationToken::new();
  let cancel_clone = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel_clone.cancel();
  });

  let err = tokio::time::timeout(
    Duration::from_secs(3),
    orchestrator.execute(&workflow, ReleaseEvent::manual("main"), cancel),
  )
  .await
  .expect("cancellation should stop the execution")
  .unwrap_err();
  assert!(matches!(err, ExecutionError::Cancelled));
}

#[tokio::test]
async fn test_download_keeps_artifacts_apart_without_merge() {
  let root = tempfile::tempdir().unwrap();
  let workflow = resolve(json!({
    "name": "release",
    "trigger": { "event": "manual" },
    "jobs": [
      {
        "job_id": "build",
        "matrix": { "os": ["linux", "macos"] },
        "steps": [
          { "run": "mkdir -p out && echo {{ matrix.os }} > out/pkg.whl" },
          { "uses": "upload-artifact", "with": { "name": "dist-{{ matrix.os }}", "path": "out" } }
        ]
      },
      {
        "job_id": "stage",
        "needs": ["build"],
        "steps": [
          { "uses": "download-artifact", "with": { "pattern": "dist-*", "path": "staging" } },
          { "run": "cat staging/dist-linux/pkg.whl staging/dist-macos/pkg.whl" }
        ]
      }
    ]
  }));
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, ExecutionStatus::Succeeded);
  let stage = &result.jobs["stage"];
  assert_eq!(stage.steps[1].output, "linux\nmacos\n");
}

/// Two build cells that both produce `pkg-1.0.tar.gz`.
fn colliding_release(index: &Path, download: Value) -> Workflow {
  resolve(json!({
    "name": "release",
    "trigger": { "event": "manual" },
    "jobs": [
      {
        "job_id": "build",
        "matrix": { "os": ["linux", "macos"] },
        "steps": [
          { "run": "mkdir -p out && echo {{ matrix.os }} > out/pkg-1.0.tar.gz" },
          { "uses": "upload-artifact", "with": { "name": "dist-{{ matrix.os }}", "path": "out" } }
        ]
      },
      {
        "job_id": "publish",
        "needs": ["build"],
        "steps": [
          { "step_id": "stage", "uses": "download-artifact", "with": download },
          {
            "step_id": "publish",
            "uses": "publish",
            "with": {
              "path": "dist",
              "repository_url": format!("file://{}", index.display())
            }
          }
        ]
      }
    ]
  }))
}

#[tokio::test]
async fn test_colliding_file_names_publish_nothing() {
  let root = tempfile::tempdir().unwrap();
  let index = root.path().join("index");
  let workflow = colliding_release(&index, json!({ "pattern": "dist-*", "path": "dist" }));
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  let publish = &result.jobs["publish"];
  assert_eq!(publish.status, JobStatus::Failed);
  assert_eq!(publish.steps[1].step_id, "publish");
  assert!(
    publish
      .error
      .as_deref()
      .unwrap()
      .contains("more than one file is named 'pkg-1.0.tar.gz'")
  );
  assert!(!index.exists());
}

#[tokio::test]
async fn test_merged_download_refuses_to_overwrite() {
  let root = tempfile::tempdir().unwrap();
  let index = root.path().join("index");
  let workflow = colliding_release(
    &index,
    json!({ "pattern": "dist-*", "path": "dist", "merge_multiple": "true" }),
  );
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  let publish = &result.jobs["publish"];
  assert_eq!(publish.status, JobStatus::Failed);
  assert_eq!(publish.steps.len(), 1);
  assert_eq!(publish.steps[0].step_id, "stage");
  assert!(
    publish
      .error
      .as_deref()
      .unwrap()
      .contains("refusing to overwrite")
  );
  assert!(!index.exists());
}

#[tokio::test]
async fn test_failure_only_skips_dependent_jobs() {
  let root = tempfile::tempdir().unwrap();
  let workflow = resolve(json!({
    "name": "release",
    "trigger": { "event": "manual" },
    "jobs": [
      { "job_id": "broken", "steps": [{ "run": "exit 1" }] },
      { "job_id": "after-broken", "needs": ["broken"], "steps": [{ "run": "true" }] },
      { "job_id": "docs", "steps": [{ "run": "true" }] },
      { "job_id": "after-docs", "needs": ["docs"], "steps": [{ "run": "echo ran" }] }
    ]
  }));
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(result.status, ExecutionStatus::Failed);
  assert_eq!(result.jobs_with(JobStatus::Failed), vec!["broken"]);
  assert_eq!(result.jobs_with(JobStatus::Skipped), vec!["after-broken"]);
  assert_eq!(
    result.jobs_with(JobStatus::Succeeded),
    vec!["docs", "after-docs"]
  );
  assert_eq!(result.jobs["after-docs"].steps[0].output, "ran\n");
}

#[tokio::test]
async fn test_empty_upload_fails_job() {
  let root = tempfile::tempdir().unwrap();
  let workflow = single_job(
    json!([
      { "run": "mkdir -p dist" },
      { "uses": "upload-artifact", "with": { "name": "dist", "path": "dist" } }
    ]),
    None,
  );
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute(&workflow, ReleaseEvent::manual("main"), CancellationToken::new())
    .await
    .unwrap();

  let job = &result.jobs["only"];
  assert_eq!(job.status, JobStatus::Failed);
  assert!(job.error.as_deref().unwrap().contains("no files found"));
}

#[tokio::test]
async fn test_execute_single_job() {
  let root = tempfile::tempdir().unwrap();
  let workflow = resolve(release_workflow(&root.path().join("index"), BUILD_WHEEL));
  let orchestrator = create_orchestrator(root.path());

  let result = orchestrator
    .execute_job(
      &workflow,
      "build-linux-3.12",
      ReleaseEvent::published("main", "1.0.0"),
      CancellationToken::new(),
    )
    .await
    .unwrap();
  assert_eq!(result.status, JobStatus::Succeeded);
  assert_eq!(result.steps.len(), 2);

  let err = orchestrator
    .execute_job(
      &workflow,
      "build-windows-3.12",
      ReleaseEvent::published("main", "1.0.0"),
      CancellationToken::new(),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, ExecutionError::JobNotFound { .. }));
}
