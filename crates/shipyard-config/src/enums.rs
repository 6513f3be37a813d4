use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of event that starts a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
  /// A release was published.
  ReleasePublished,
  /// Started by hand, e.g. from the CLI.
  Manual,
}

impl fmt::Display for TriggerEvent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TriggerEvent::ReleasePublished => f.write_str("release_published"),
      TriggerEvent::Manual => f.write_str("manual"),
    }
  }
}
