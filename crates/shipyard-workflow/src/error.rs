use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("job not found: {0}")]
  JobNotFound(String),

  #[error("edge references unknown job: from={from}, to={to}")]
  InvalidEdge { from: String, to: String },

  #[error("no entry points found (all jobs have upstream jobs)")]
  NoEntryPoints,

  #[error("dependency cycle involving job '{0}'")]
  CycleDetected(String),
}
