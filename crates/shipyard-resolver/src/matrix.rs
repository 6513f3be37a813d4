use indexmap::IndexMap;
use shipyard_config::MatrixDef;

use crate::error::ResolveError;

/// Expand a matrix into its cells, in axis declaration order.
///
/// The first axis varies slowest. Cells matching any `exclude` entry on all of
/// that entry's keys are dropped.
pub fn expand_matrix(
  job_id: &str,
  matrix: &MatrixDef,
) -> Result<Vec<IndexMap<String, String>>, ResolveError> {
  let invalid = |message: String| ResolveError::InvalidMatrix {
    job_id: job_id.to_string(),
    message,
  };

  if matrix.axes.is_empty() {
    return Err(invalid("matrix has no axes".to_string()));
  }

  let mut cells: Vec<IndexMap<String, String>> = vec![IndexMap::new()];
  for (axis, values) in &matrix.axes {
    if values.is_empty() {
      return Err(invalid(format!("axis '{}' has no values", axis)));
    }
    cells = cells
      .into_iter()
      .flat_map(|cell| {
        values.iter().map(move |value| {
          let mut next = cell.clone();
          next.insert(axis.clone(), value.clone());
          next
        })
      })
      .collect();
  }

  for entry in &matrix.exclude {
    if entry.is_empty() {
      return Err(invalid("exclude entry is empty".to_string()));
    }
    if let Some(key) = entry.keys().find(|k| !matrix.axes.contains_key(*k)) {
      return Err(invalid(format!("exclude refers to unknown axis '{}'", key)));
    }
  }

  cells.retain(|cell| {
    !matrix
      .exclude
      .iter()
      .any(|entry| entry.iter().all(|(k, v)| cell.get(k) == Some(v)))
  });

  if cells.is_empty() {
    return Err(invalid("every combination is excluded".to_string()));
  }

  Ok(cells)
}

fn is_id_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// Whether `job_id` is safe to use as a directory name.
pub fn is_valid_job_id(job_id: &str) -> bool {
  !job_id.is_empty() && job_id != "." && job_id != ".." && job_id.chars().all(is_id_char)
}

/// Whether `name` is a single segment of an artifact key.
///
/// Names nest under `<execution_id>/`, so a separator would place one artifact
/// inside another.
pub fn is_valid_artifact_name(name: &str) -> bool {
  !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Job id for a matrix cell: `<job_id>-<value>-<value>...`.
///
/// Characters that are awkward in directory names are replaced with `-`.
pub fn cell_job_id(job_id: &str, cell: &IndexMap<String, String>) -> String {
  if cell.is_empty() {
    return job_id.to_string();
  }

  let mut id = job_id.to_string();
  for value in cell.values() {
    id.push('-');
    id.extend(value.chars().map(|c| if is_id_char(c) { c } else { '-' }));
  }
  id
}
