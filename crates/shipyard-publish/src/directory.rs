use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::{PublishError, PublishReport, Publisher, file_names};

/// Publishes into a local directory, e.g. a file-based package index.
///
/// Existing files are never overwritten: a version, once published, is final.
/// Nothing is copied unless every file can be.
pub struct DirectoryPublisher {
  dir: PathBuf,
}

impl DirectoryPublisher {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }
}

#[async_trait]
impl Publisher for DirectoryPublisher {
  async fn publish(&self, files: &[PathBuf]) -> Result<PublishReport, PublishError> {
    let names = file_names(files)?;
    fs::create_dir_all(&self.dir).await?;

    for name in &names {
      if fs::try_exists(self.dir.join(name)).await? {
        return Err(PublishError::AlreadyExists(name.clone()));
      }
    }

    let mut published = Vec::with_capacity(files.len());
    for (path, name) in files.iter().zip(names) {
      fs::copy(path, self.dir.join(&name)).await?;
      info!(file = %name, repository = %self.dir.display(), "published file");
      published.push(name);
    }

    Ok(PublishReport {
      repository: self.dir.display().to_string(),
      published,
    })
  }
}
