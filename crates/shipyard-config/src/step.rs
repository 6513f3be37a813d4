use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::template::TemplateValue;

/// A step as written, before `run`/`uses` is decided.
#[derive(Deserialize)]
struct RawStepDef {
  #[serde(default)]
  step_id: Option<String>,
  #[serde(default)]
  run: Option<TemplateValue>,
  #[serde(default)]
  uses: Option<String>,
  #[serde(default, rename = "with")]
  with: Option<IndexMap<String, TemplateValue>>,
  #[serde(default)]
  env: IndexMap<String, TemplateValue>,
  #[serde(default)]
  continue_on_error: bool,
}

/// Why a step definition was rejected.
#[derive(Debug, thiserror::Error)]
pub enum StepDefError {
  #[error("a step cannot set both 'run' and 'uses'")]
  RunAndUses,

  #[error("a step needs either 'run' or 'uses'")]
  NoKind,

  #[error("'with' is only valid on a 'uses' step")]
  WithOnRun,
}

/// One step of a job.
///
/// Invariant: exactly one of `run` and `uses` is set (enforced via
/// `#[serde(try_from)]` when reading a workflow file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStepDef")]
pub struct StepDef {
  /// Defaults to `step-<n>` (1-based) when omitted.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub step_id: Option<String>,
  #[serde(flatten)]
  pub kind: StepKindDef,
  #[serde(skip_serializing_if = "IndexMap::is_empty")]
  pub env: IndexMap<String, TemplateValue>,
  /// Keep running the job when this step fails.
  pub continue_on_error: bool,
}

impl TryFrom<RawStepDef> for StepDef {
  type Error = StepDefError;

  fn try_from(raw: RawStepDef) -> Result<Self, Self::Error> {
    let kind = match (raw.run, raw.uses) {
      (Some(_), Some(_)) => return Err(StepDefError::RunAndUses),
      (None, None) => return Err(StepDefError::NoKind),
      (Some(_), None) if raw.with.is_some() => return Err(StepDefError::WithOnRun),
      (Some(run), None) => StepKindDef::Run { run },
      (None, Some(uses)) => StepKindDef::Uses {
        uses,
        with: raw.with.unwrap_or_default(),
      },
    };

    Ok(Self {
      step_id: raw.step_id,
      kind,
      env: raw.env,
      continue_on_error: raw.continue_on_error,
    })
  }
}

/// What a step does: run a shell command, or invoke a built-in action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepKindDef {
  Run {
    run: TemplateValue,
  },
  Uses {
    uses: String,
    #[serde(rename = "with", skip_serializing_if = "IndexMap::is_empty")]
    with: IndexMap<String, TemplateValue>,
  },
}
