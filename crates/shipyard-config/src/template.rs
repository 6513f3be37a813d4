//! Template values used throughout workflow definitions.
//!
//! Commands, action parameters, environment values and `runs_on` labels are all
//! template strings rendered by minijinja. The following variables are in scope:
//!
//! - `matrix.<axis>`: the value of a matrix axis for the current cell
//! - `job.id`, `job.group`: the expanded job id and the job it was expanded from
//! - `workflow.name`
//! - `release.tag`, `release.branch`, `release.event`: the triggering event
//! - `secrets.<NAME>`: secrets handed to the run
//!
//! # Examples
//!
//! ```json
//! {
//!   "run": "python -m build --wheel --outdir dist/ # {{ matrix.version }}",
//!   "uses": "upload-artifact",
//!   "with": { "name": "dist-{{ matrix.os }}-{{ matrix.version }}", "path": "dist" }
//! }
//! ```
//!
//! Artifact names and `runs_on` may only refer to `matrix`, `job` and `workflow`,
//! since they are fixed when the workflow is resolved.

/// A string that is rendered as a minijinja template before use.
pub type TemplateValue = String;
