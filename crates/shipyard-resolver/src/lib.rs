//! Shipyard Resolver
//!
//! Turns a [`WorkflowDef`](shipyard_config::WorkflowDef) into a locked
//! [`Workflow`](shipyard_workflow::Workflow):
//!
//! 1. expands every matrix job into one job per cell
//! 2. turns `needs` into job-to-job edges and rejects cycles
//! 3. checks built-in action calls and their required parameters
//! 4. checks that every downloaded artifact is uploaded by an upstream job
//!
//! [`check_artifact_flow`] runs the softer checks (unused artifacts, artifacts
//! consumed twice) and reports them as diagnostics instead of failing.

mod error;
mod lint;
mod matrix;
mod resolver;

pub use error::ResolveError;
pub use lint::{Diagnostic, Severity, check_artifact_flow};
pub use matrix::{cell_job_id, expand_matrix, is_valid_artifact_name, is_valid_job_id};
pub use resolver::{Resolver, StandardResolver};
