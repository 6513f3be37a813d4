use serde::{Deserialize, Serialize};
use shipyard_config::TriggerEvent;

/// The event that starts an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEvent {
  pub event: TriggerEvent,
  pub branch: String,
  /// Release tag, e.g. "v1.2.0". Empty for manual runs without a tag.
  #[serde(default)]
  pub tag: String,
}

impl ReleaseEvent {
  /// A release published from `branch` with tag `tag`.
  pub fn published(branch: impl Into<String>, tag: impl Into<String>) -> Self {
    Self {
      event: TriggerEvent::ReleasePublished,
      branch: branch.into(),
      tag: tag.into(),
    }
  }

  /// A manual run on `branch`.
  pub fn manual(branch: impl Into<String>) -> Self {
    Self {
      event: TriggerEvent::Manual,
      branch: branch.into(),
      tag: String::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_deserialize_event_without_tag() {
    let event: ReleaseEvent =
      serde_json::from_str(r#"{ "event": "manual", "branch": "main" }"#).unwrap();
    assert_eq!(event, ReleaseEvent::manual("main"));
  }
}
