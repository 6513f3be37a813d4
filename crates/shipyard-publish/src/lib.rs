//! Shipyard Publish
//!
//! The final step of a release: hand the staged files to a package index.
//! The [`Publisher`] trait is the seam; [`publisher_for`] picks an
//! implementation from the repository URL:
//!
//! - `file:///srv/index` copies files into a local directory
//! - `https://upload.example.org/simple/` uploads each file with an HTTP `PUT`,
//!   authenticated with a bearer token

mod directory;
mod error;
mod http;

pub use directory::DirectoryPublisher;
pub use error::PublishError;
pub use http::HttpPublisher;

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use url::Url;

/// What a publish call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
  /// Where the files went.
  pub repository: String,
  /// File names, in the order they were published.
  pub published: Vec<String>,
}

#[async_trait]
pub trait Publisher: Send + Sync {
  /// Publish the given files under their file names.
  ///
  /// File names are checked before anything is published: two files with the
  /// same name are a `DuplicateFile` error. Stops at the first failed upload.
  async fn publish(&self, files: &[PathBuf]) -> Result<PublishReport, PublishError>;
}

/// Build a publisher for `repository_url`.
///
/// `token` is only used (and required) by HTTP repositories.
pub fn publisher_for(
  repository_url: &str,
  token: Option<String>,
) -> Result<Box<dyn Publisher>, PublishError> {
  let url = Url::parse(repository_url).map_err(|e| PublishError::InvalidUrl {
    url: repository_url.to_string(),
    message: e.to_string(),
  })?;

  match url.scheme() {
    "file" => {
      let dir = url.to_file_path().map_err(|_| PublishError::InvalidUrl {
        url: repository_url.to_string(),
        message: "not a local path".to_string(),
      })?;
      Ok(Box::new(DirectoryPublisher::new(dir)))
    }
    "http" | "https" => {
      let token = token
        .filter(|t| !t.is_empty())
        .ok_or(PublishError::MissingToken)?;
      Ok(Box::new(HttpPublisher::new(url, token)))
    }
    other => Err(PublishError::UnsupportedScheme(other.to_string())),
  }
}

fn file_name(path: &std::path::Path) -> Result<String, PublishError> {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .ok_or_else(|| PublishError::InvalidFile(path.display().to_string()))
}

/// Repository names for `files`, in order.
pub(crate) fn file_names(files: &[PathBuf]) -> Result<Vec<String>, PublishError> {
  let mut seen = HashSet::new();
  files
    .iter()
    .map(|path| {
      let name = file_name(path)?;
      if !seen.insert(name.clone()) {
        return Err(PublishError::DuplicateFile(name));
      }
      Ok(name)
    })
    .collect()
}
