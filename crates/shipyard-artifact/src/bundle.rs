//! Named file bundles on top of a [`Store`].
//!
//! A bundle is the set of keys under `<execution_id>/<name>/`. Uploading walks a
//! file or directory in a job workspace; downloading recreates the same
//! relative layout under a destination directory.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{Error, Store};

/// Key prefix for all files of an artifact.
pub fn bundle_prefix(execution_id: &str, name: &str) -> String {
  format!("{}/{}/", execution_id, name)
}

/// Every regular file under `root`, with its `/`-separated path relative to `root`.
///
/// When `root` is a file, that single file is returned under its file name.
pub async fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
  let metadata = fs::metadata(root).await.map_err(|e| {
    if e.kind() == std::io::ErrorKind::NotFound {
      Error::Empty(root.display().to_string())
    } else {
      Error::Io(e)
    }
  })?;

  if metadata.is_file() {
    let name = root
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    return Ok(vec![(name, root.to_path_buf())]);
  }

  let mut files = Vec::new();
  let mut pending = vec![root.to_path_buf()];
  while let Some(dir) = pending.pop() {
    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let file_type = entry.file_type().await?;
      if file_type.is_dir() {
        pending.push(path);
      } else if file_type.is_file() {
        let relative = path
          .strip_prefix(root)
          .map_err(|_| Error::InvalidKey(path.display().to_string()))?
          .components()
          .map(|c| c.as_os_str().to_string_lossy())
          .collect::<Vec<_>>()
          .join("/");
        files.push((relative, path));
      }
    }
  }

  files.sort();
  Ok(files)
}

/// Upload every file under `source` as artifact `name`. Returns the stored keys.
pub async fn upload_bundle(
  store: &dyn Store,
  execution_id: &str,
  name: &str,
  source: &Path,
) -> Result<Vec<String>, Error> {
  let files = collect_files(source).await?;
  if files.is_empty() {
    return Err(Error::Empty(source.display().to_string()));
  }

  let prefix = bundle_prefix(execution_id, name);
  let mut keys = Vec::with_capacity(files.len());
  for (relative, path) in files {
    let key = format!("{}{}", prefix, relative);
    let file = File::open(&path).await?;
    let stream = ReaderStream::new(file).map(|r| r.map_err(Error::Io));
    store
      .put(&key, Box::pin(stream), "application/octet-stream")
      .await?;
    keys.push(key);
  }

  debug!(artifact = %name, files = keys.len(), "uploaded artifact");
  Ok(keys)
}

/// Names of all artifacts stored for an execution.
pub async fn list_bundles(store: &dyn Store, execution_id: &str) -> Result<Vec<String>, Error> {
  let prefix = format!("{}/", execution_id);
  let names: BTreeSet<String> = store
    .list(&prefix)
    .await?
    .iter()
    .filter_map(|key| key[prefix.len()..].split('/').next().map(str::to_string))
    .collect();
  Ok(names.into_iter().collect())
}

/// Write every file of artifact `name` under `dest`. Returns the written paths.
///
/// Existing files are never overwritten, so merging two artifacts that share a
/// file path fails with [`Error::AlreadyExists`].
pub async fn download_bundle(
  store: &dyn Store,
  execution_id: &str,
  name: &str,
  dest: &Path,
) -> Result<Vec<PathBuf>, Error> {
  let prefix = bundle_prefix(execution_id, name);
  let keys = store.list(&prefix).await?;
  if keys.is_empty() {
    return Err(Error::NotFound(name.to_string()));
  }

  let mut written = Vec::with_capacity(keys.len());
  for key in keys {
    let target = dest.join(&key[prefix.len()..]);
    if let Some(parent) = target.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut stream = store.get(&key).await?;
    let mut file = fs::OpenOptions::new()
      .write(true)
      .create_new(true)
      .open(&target)
      .await
      .map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
          Error::AlreadyExists(target.display().to_string())
        } else {
          Error::Io(e)
        }
      })?;
    while let Some(chunk) = stream.next().await {
      file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    written.push(target);
  }

  debug!(artifact = %name, files = written.len(), dest = %dest.display(), "downloaded artifact");
  Ok(written)
}
