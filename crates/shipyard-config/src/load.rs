use std::path::Path;

use crate::error::ConfigError;
use crate::workflow::WorkflowDef;

/// On-disk format of a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowFormat {
  Json,
  Toml,
}

impl WorkflowFormat {
  /// Pick a format from a file extension. Anything other than `.toml` is JSON.
  pub fn from_path(path: &Path) -> Self {
    match path.extension().and_then(|e| e.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("toml") => WorkflowFormat::Toml,
      _ => WorkflowFormat::Json,
    }
  }
}

/// Read and parse a workflow definition from a file.
pub fn load_workflow(path: impl AsRef<Path>) -> Result<WorkflowDef, ConfigError> {
  let path = path.as_ref();
  let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
    path: path.to_path_buf(),
    source,
  })?;
  parse_workflow(&content, WorkflowFormat::from_path(path))
}

/// Parse a workflow definition from a string.
pub fn parse_workflow(content: &str, format: WorkflowFormat) -> Result<WorkflowDef, ConfigError> {
  match format {
    WorkflowFormat::Json => Ok(serde_json::from_str(content)?),
    WorkflowFormat::Toml => Ok(toml::from_str(content)?),
  }
}
