//! Shipyard Config
//!
//! This crate contains the serializable workflow configuration types for shipyard.
//! These types represent a build/release workflow as it is written by hand, before
//! the matrix is expanded and the job graph is validated by `shipyard-resolver`.
//!
//! Configuration can be loaded from:
//! - JSON files (`release.json`)
//! - TOML files (`release.toml`)
//!
//! A typical workflow has one trigger, a matrix of build jobs, and a join job that
//! `needs` the build jobs, downloads their artifacts and publishes them.

mod enums;
mod error;
mod job;
mod load;
mod step;
mod template;
mod workflow;

pub use enums::TriggerEvent;
pub use error::ConfigError;
pub use job::{JobDef, MatrixDef};
pub use load::{WorkflowFormat, load_workflow, parse_workflow};
pub use step::{StepDef, StepDefError, StepKindDef};
pub use template::TemplateValue;
pub use workflow::{TriggerDef, WorkflowDef};
