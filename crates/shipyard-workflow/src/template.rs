//! Template rendering for commands, parameters and labels.
//!
//! Rendering is strict: referring to a variable that is not in scope is an
//! error rather than an empty string, so a typo in `{{ matrix.verison }}`
//! fails the step instead of building the wrong thing.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

/// Render a single template string against `ctx`.
///
/// Strings without template markers are returned unchanged.
pub fn render<S: Serialize>(template: &str, ctx: S) -> Result<String, minijinja::Error> {
  if !is_template(template) {
    return Ok(template.to_string());
  }

  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Strict);
  env.render_str(template, ctx)
}

/// Check whether a string contains template syntax.
pub fn is_template(value: &str) -> bool {
  value.contains("{{") || value.contains("{%")
}
