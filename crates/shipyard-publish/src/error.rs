/// Errors raised while publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
  #[error("invalid repository url '{url}': {message}")]
  InvalidUrl { url: String, message: String },

  #[error("unsupported repository scheme: {0}")]
  UnsupportedScheme(String),

  #[error("repository requires a token but none was given")]
  MissingToken,

  #[error("not a publishable file: {0}")]
  InvalidFile(String),

  #[error("more than one file is named '{0}'")]
  DuplicateFile(String),

  #[error("'{0}' already exists in the repository")]
  AlreadyExists(String),

  #[error("repository rejected '{file}' with status {status}")]
  Rejected { file: String, status: u16 },

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}
