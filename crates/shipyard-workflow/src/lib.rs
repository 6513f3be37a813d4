//! Shipyard Workflow
//!
//! This crate provides the "locked" workflow representation for shipyard.
//! A locked workflow is a validated, resolved form of a workflow configuration
//! that is ready for execution.
//!
//! Key differences from `shipyard-config`:
//! - Matrix jobs are expanded into one job per cell
//! - `needs` are turned into job-to-job edges, and the graph is acyclic
//! - Steps reference built-in actions by kind, with required parameters present
//! - Every uploaded artifact is recorded with the job that produces it

mod error;
mod graph;
mod job;
pub mod template;
mod workflow;

pub use error::WorkflowError;
pub use graph::Graph;
pub use job::{ActionCall, BuiltinAction, Job, Step, StepKind};
pub use workflow::{ArtifactRef, Workflow};
