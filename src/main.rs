use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use shipyard_artifact::FsStore;
use shipyard_config::{TriggerEvent, load_workflow};
use shipyard_orchestrator::{
  ExecutionError, ExecutionStatus, Orchestrator, OrchestratorConfig, ReleaseEvent,
  TracingNotifier,
};
use shipyard_resolver::{Resolver, Severity, StandardResolver, check_artifact_flow};
use shipyard_workflow::Workflow;

/// Shipyard - build a release matrix, then publish it
#[derive(Parser)]
#[command(name = "shipyard")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.shipyard)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Increase log verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve a workflow and report problems with its artifact flow
  Validate {
    /// Path to the workflow file (JSON or TOML)
    workflow_file: PathBuf,
  },

  /// Print the resolved workflow with jobs in execution order
  Plan {
    /// Path to the workflow file (JSON or TOML)
    workflow_file: PathBuf,
  },

  /// Run a workflow for a release event
  ///
  /// Without --branch the event is read as JSON from stdin, e.g.
  /// {"event": "release_published", "branch": "main", "tag": "v1.0.0"}
  Run {
    /// Path to the workflow file (JSON or TOML)
    workflow_file: PathBuf,

    /// Event kind
    #[arg(long, value_enum, default_value_t = EventArg::ReleasePublished, requires = "branch")]
    event: EventArg,

    /// Branch the release was published from
    #[arg(long)]
    branch: Option<String>,

    /// Release tag
    #[arg(long, default_value = "", requires = "branch")]
    tag: String,

    /// Secret to expose as `secrets.NAME`, read from the environment variable NAME
    #[arg(long = "secret", value_name = "NAME")]
    secrets: Vec<String>,

    /// Run only this job, ignoring its dependencies
    #[arg(long)]
    job: Option<String>,
  },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EventArg {
  ReleasePublished,
  Manual,
}

impl From<EventArg> for TriggerEvent {
  fn from(arg: EventArg) -> Self {
    match arg {
      EventArg::ReleasePublished => TriggerEvent::ReleasePublished,
      EventArg::Manual => TriggerEvent::Manual,
    }
  }
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".shipyard"),
  };

  match cli.command {
    Some(Commands::Validate { workflow_file }) => validate(&workflow_file),
    Some(Commands::Plan { workflow_file }) => plan(&workflow_file),
    Some(Commands::Run {
      workflow_file,
      event,
      branch,
      tag,
      secrets,
      job,
    }) => {
      let event = match branch {
        Some(branch) => ReleaseEvent {
          event: event.into(),
          branch,
          tag,
        },
        None => read_event_from_stdin()?,
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run(workflow_file, data_dir, event, secrets, job))
    }
    None => {
      println!("shipyard - use --help to see available commands");
      Ok(ExitCode::SUCCESS)
    }
  }
}

fn init_tracing(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .init();
}

fn resolve_workflow(workflow_file: &Path) -> Result<Workflow> {
  let workflow_def = load_workflow(workflow_file)
    .with_context(|| format!("failed to load workflow file: {}", workflow_file.display()))?;

  StandardResolver::new()
    .resolve(workflow_def)
    .with_context(|| format!("failed to resolve workflow: {}", workflow_file.display()))
}

fn validate(workflow_file: &Path) -> Result<ExitCode> {
  let workflow = match resolve_workflow(workflow_file) {
    Ok(workflow) => workflow,
    Err(e) => {
      eprintln!("error: {:#}", e);
      return Ok(ExitCode::FAILURE);
    }
  };

  let diagnostics = check_artifact_flow(&workflow);
  for diagnostic in &diagnostics {
    eprintln!("{}", diagnostic);
  }

  if diagnostics.iter().any(|d| d.severity == Severity::Error) {
    return Ok(ExitCode::FAILURE);
  }

  println!(
    "workflow '{}' is valid: {} jobs, {} artifacts",
    workflow.name,
    workflow.jobs.len(),
    workflow.artifacts.len()
  );
  Ok(ExitCode::SUCCESS)
}

fn plan(workflow_file: &Path) -> Result<ExitCode> {
  let workflow = resolve_workflow(workflow_file)?;
  let order = workflow
    .graph()
    .topological_order()
    .context("failed to order jobs")?;

  let jobs = order
    .iter()
    .map(|job_id| workflow.require_job(job_id))
    .collect::<Result<Vec<_>, _>>()?;

  let output = serde_json::json!({
    "name": workflow.name,
    "trigger": workflow.trigger,
    "jobs": jobs,
    "artifacts": workflow.artifacts,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(ExitCode::SUCCESS)
}

async fn run(
  workflow_file: PathBuf,
  data_dir: PathBuf,
  event: ReleaseEvent,
  secret_names: Vec<String>,
  job: Option<String>,
) -> Result<ExitCode> {
  let workflow = resolve_workflow(&workflow_file)?;
  eprintln!(
    "Resolved workflow '{}' with {} jobs",
    workflow.name,
    workflow.jobs.len()
  );

  let secrets = read_secrets(&secret_names)?;

  let mut config = OrchestratorConfig::new(data_dir.join("work"));
  config.secrets = secrets;
  let store = Arc::new(FsStore::new(data_dir.join("artifacts")));
  let orchestrator = Orchestrator::with_notifier(config, store, TracingNotifier);

  let cancel = CancellationToken::new();
  let ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      ctrl_c.cancel();
    }
  });

  if let Some(job_id) = job {
    let result = orchestrator
      .execute_job(&workflow, &job_id, event, cancel)
      .await
      .with_context(|| format!("job '{}' could not run", job_id))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    return Ok(if result.is_success() {
      ExitCode::SUCCESS
    } else {
      ExitCode::FAILURE
    });
  }

  let result = match orchestrator.execute(&workflow, event, cancel).await {
    Ok(result) => result,
    Err(e @ ExecutionError::TriggerMismatch { .. }) => {
      eprintln!("Skipping: {}", e);
      return Ok(ExitCode::SUCCESS);
    }
    Err(e) => return Err(anyhow::Error::new(e).context("workflow execution failed")),
  };

  eprintln!(
    "Execution {} {:?}: {} jobs",
    result.execution_id,
    result.status,
    result.jobs.len()
  );
  println!("{}", serde_json::to_string_pretty(&result)?);

  Ok(match result.status {
    ExecutionStatus::Succeeded => ExitCode::SUCCESS,
    ExecutionStatus::Failed => ExitCode::FAILURE,
  })
}

fn read_secrets(names: &[String]) -> Result<BTreeMap<String, String>> {
  names
    .iter()
    .map(|name| {
      let value = std::env::var(name)
        .with_context(|| format!("secret '{}' is not set in the environment", name))?;
      Ok((name.clone(), value))
    })
    .collect()
}

fn read_event_from_stdin() -> Result<ReleaseEvent> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    bail!("no release event given: pass --branch or pipe the event JSON on stdin");
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read event from stdin")?;

  if input.trim().is_empty() {
    bail!("no release event given: stdin was empty");
  }
  serde_json::from_str(&input).context("failed to parse event JSON from stdin")
}
