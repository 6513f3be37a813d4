use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::info;
use url::Url;

use crate::{PublishError, PublishReport, Publisher, file_names};

/// Uploads each file with `PUT <repository>/<file name>` and a bearer token.
pub struct HttpPublisher {
  client: reqwest::Client,
  base: Url,
  token: String,
}

impl HttpPublisher {
  pub fn new(mut base: Url, token: String) -> Self {
    // Url::join replaces the last segment unless the path ends with '/'
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }
    Self {
      client: reqwest::Client::new(),
      base,
      token,
    }
  }

  fn upload_url(&self, name: &str) -> Result<Url, PublishError> {
    self.base.join(name).map_err(|e| PublishError::InvalidUrl {
      url: format!("{}{}", self.base, name),
      message: e.to_string(),
    })
  }
}

#[async_trait]
impl Publisher for HttpPublisher {
  async fn publish(&self, files: &[PathBuf]) -> Result<PublishReport, PublishError> {
    let names = file_names(files)?;
    let mut published = Vec::with_capacity(files.len());

    for (path, name) in files.iter().zip(names) {
      let body = fs::read(path).await?;
      let url = self.upload_url(&name)?;

      let response = self
        .client
        .put(url)
        .bearer_auth(&self.token)
        .body(body)
        .send()
        .await?;

      let status = response.status();
      if !status.is_success() {
        return Err(PublishError::Rejected {
          file: name,
          status: status.as_u16(),
        });
      }

      info!(file = %name, repository = %self.base, "published file");
      published.push(name);
    }

    Ok(PublishReport {
      repository: self.base.to_string(),
      published,
    })
  }
}
