use std::path::PathBuf;

/// Errors raised while loading a workflow file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read workflow file {path}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid JSON workflow: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid TOML workflow: {0}")]
  Toml(#[from] toml::de::Error),
}
