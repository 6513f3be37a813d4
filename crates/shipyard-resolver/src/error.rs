use shipyard_workflow::WorkflowError;
use thiserror::Error;

/// Errors that can occur during workflow resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// The workflow defines no jobs.
  #[error("workflow has no jobs")]
  EmptyWorkflow,

  /// A job id that cannot be used as a workspace directory name.
  #[error("invalid job id '{job_id}': use letters, digits, '-', '_' or '.'")]
  InvalidJobId { job_id: String },

  /// Two jobs share an id (possibly after matrix expansion).
  #[error("duplicate job id: {job_id}")]
  DuplicateJob { job_id: String },

  /// Two steps of the same job share an id.
  #[error("duplicate step id '{step_id}' in job '{job_id}'")]
  DuplicateStep { job_id: String, step_id: String },

  /// The matrix cannot be expanded.
  #[error("invalid matrix for job '{job_id}': {message}")]
  InvalidMatrix { job_id: String, message: String },

  /// A job needs a job that does not exist.
  #[error("job '{job_id}' needs unknown job '{need}'")]
  UnknownDependency { job_id: String, need: String },

  /// Cycle detected in the job graph.
  #[error("cycle detected in job graph at '{job_id}'")]
  CycleDetected { job_id: String },

  /// A step uses an action that is not built in.
  #[error("step '{step_id}' in job '{job_id}' uses unknown action '{action}'")]
  UnknownAction {
    job_id: String,
    step_id: String,
    action: String,
  },

  /// An action call is missing parameters or has conflicting ones.
  #[error("step '{step_id}' in job '{job_id}': {message}")]
  InvalidAction {
    job_id: String,
    step_id: String,
    message: String,
  },

  /// A resolve-time template could not be rendered.
  #[error("failed to render template for job '{job_id}': {message}")]
  Template { job_id: String, message: String },

  /// An artifact name that cannot be used as a single storage key segment.
  #[error("job '{job_id}' uploads invalid artifact name '{name}'")]
  InvalidArtifactName { job_id: String, name: String },

  /// Two uploads use the same artifact name.
  #[error("artifact '{name}' is uploaded by both '{first}' and '{second}'")]
  DuplicateArtifact {
    name: String,
    first: String,
    second: String,
  },

  /// A download refers to an artifact no upstream job uploads.
  #[error("job '{job_id}' downloads '{reference}' but no upstream job uploads a matching artifact")]
  UnknownArtifact { job_id: String, reference: String },

  /// A download refers to an artifact whose producer is not upstream.
  #[error("job '{job_id}' downloads '{name}' but does not need its producer '{producer}'")]
  ArtifactNotUpstream {
    job_id: String,
    name: String,
    producer: String,
  },

  #[error(transparent)]
  Workflow(#[from] WorkflowError),
}
