//! Shipyard Orchestrator
//!
//! Runs a locked [`Workflow`](shipyard_workflow::Workflow) on the local host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowRunner                         │
//! │  - owns mpsc channel of ReleaseEvents                       │
//! │  - start(cancel) runs one execution per event               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Orchestrator                          │
//! │  - execute(workflow, event, cancel) → ExecutionResult       │
//! │  - trigger check, wave scheduling of ready jobs             │
//! │  - failed job ⇒ remaining jobs skipped                      │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         run_job                             │
//! │  - workspace per job, steps in order                        │
//! │  - shell commands, upload/download-artifact, publish        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use shipyard_orchestrator::{Orchestrator, OrchestratorConfig, ReleaseEvent};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = Arc::new(FsStore::new("/var/lib/shipyard/artifacts"));
//! let config = OrchestratorConfig::new("/var/lib/shipyard/work");
//! let orchestrator = Orchestrator::new(config, store);
//!
//! let event = ReleaseEvent::published("main", "v1.2.0");
//! let result = orchestrator.execute(&workflow, event, CancellationToken::new()).await?;
//! ```

mod actions;
mod context;
mod error;
mod events;
mod job;
mod orchestrator;
mod result;
mod runner;
mod trigger;

pub use error::{ExecutionError, JobError};
pub use events::{
  ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier, TracingNotifier,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use result::{ExecutionResult, ExecutionStatus, JobResult, JobStatus, StepResult, StepStatus};
pub use runner::WorkflowRunner;
pub use trigger::ReleaseEvent;
