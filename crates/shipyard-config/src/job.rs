use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::step::StepDef;
use crate::template::TemplateValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDef {
  pub job_id: String,
  /// Platform label, e.g. "ubuntu-latest" or "{{ matrix.os }}".
  #[serde(skip_serializing_if = "Option::is_none")]
  pub runs_on: Option<TemplateValue>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub matrix: Option<MatrixDef>,
  /// Jobs (by `job_id`) that must succeed before this one starts.
  /// Naming a matrix job waits for every one of its cells.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub needs: Vec<String>,
  pub steps: Vec<StepDef>,
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub env: IndexMap<String, TemplateValue>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}

/// A build matrix.
///
/// Written the way CI platforms usually write it: every key other than
/// `exclude` is an axis, and axes are expanded in declaration order.
///
/// ```json
/// {
///   "os": ["ubuntu-latest", "macos-latest"],
///   "version": ["3.11", "3.12"],
///   "exclude": [{ "os": "macos-latest", "version": "3.11" }]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatrixDef {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub exclude: Vec<IndexMap<String, String>>,
  #[serde(flatten)]
  pub axes: IndexMap<String, Vec<String>>,
}
