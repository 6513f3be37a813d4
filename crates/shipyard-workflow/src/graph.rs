use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::WorkflowError;

/// Graph structure for traversal and analysis.
///
/// Node order follows the order jobs were given in, so every traversal
/// that returns a list is deterministic.
#[derive(Debug, Clone)]
pub struct Graph {
  order: Vec<String>,
  /// Adjacency list: job_id -> list of downstream job_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: job_id -> list of upstream job_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Jobs with no incoming edges.
  entry_points: Vec<String>,
  /// Jobs with multiple incoming edges (join points).
  join_points: HashSet<String>,
}

impl Graph {
  /// Build a graph from job ids and edges.
  pub fn new<'a>(job_ids: impl IntoIterator<Item = &'a String>, edges: &[(String, String)]) -> Self {
    let mut order = Vec::new();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for job_id in job_ids {
      order.push(job_id.clone());
      adjacency.entry(job_id.clone()).or_default();
      reverse_adjacency.entry(job_id.clone()).or_default();
    }

    for (from, to) in edges {
      adjacency.entry(from.clone()).or_default().push(to.clone());
      reverse_adjacency
        .entry(to.clone())
        .or_default()
        .push(from.clone());
    }

    let entry_points: Vec<String> = order
      .iter()
      .filter(|id| reverse_adjacency.get(*id).is_none_or(|v| v.is_empty()))
      .cloned()
      .collect();

    let join_points: HashSet<String> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      order,
      adjacency,
      reverse_adjacency,
      entry_points,
      join_points,
    }
  }

  /// Check that every edge names a known job and that there is somewhere to start.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    let known: HashSet<&String> = self.order.iter().collect();
    for (from, targets) in &self.adjacency {
      for to in targets {
        if !known.contains(from) || !known.contains(to) {
          return Err(WorkflowError::InvalidEdge {
            from: from.clone(),
            to: to.clone(),
          });
        }
      }
    }
    if !self.order.is_empty() && self.entry_points.is_empty() {
      return Err(WorkflowError::NoEntryPoints);
    }
    Ok(())
  }

  /// Get entry points (jobs with no upstream jobs).
  pub fn entry_points(&self) -> &[String] {
    &self.entry_points
  }

  /// Get downstream jobs for a given job.
  pub fn downstream(&self, job_id: &str) -> &[String] {
    self
      .adjacency
      .get(job_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Get upstream jobs for a given job.
  pub fn upstream(&self, job_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(job_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Check if a job is a join point (has multiple upstream jobs).
  pub fn is_join_point(&self, job_id: &str) -> bool {
    self.join_points.contains(job_id)
  }

  /// Get all join points.
  pub fn join_points(&self) -> &HashSet<String> {
    &self.join_points
  }

  /// All jobs reachable by walking upstream from `job_id` (excluding itself).
  pub fn ancestors(&self, job_id: &str) -> HashSet<String> {
    walk(job_id, |id| self.upstream(id))
  }

  /// All jobs reachable by walking downstream from `job_id` (excluding itself).
  pub fn descendants(&self, job_id: &str) -> HashSet<String> {
    walk(job_id, |id| self.downstream(id))
  }

  /// Jobs in dependency order (Kahn's algorithm, ties broken by input order).
  pub fn topological_order(&self) -> Result<Vec<String>, WorkflowError> {
    let mut in_degree: HashMap<&str, usize> = self
      .order
      .iter()
      .map(|id| (id.as_str(), self.upstream(id).len()))
      .collect();

    let mut queue: VecDeque<&str> = self
      .order
      .iter()
      .map(String::as_str)
      .filter(|id| in_degree[id] == 0)
      .collect();

    let mut sorted = Vec::with_capacity(self.order.len());
    while let Some(id) = queue.pop_front() {
      sorted.push(id.to_string());
      for next in self.downstream(id) {
        if let Some(degree) = in_degree.get_mut(next.as_str()) {
          *degree -= 1;
          if *degree == 0 {
            queue.push_back(next.as_str());
          }
        }
      }
    }

    if sorted.len() != self.order.len() {
      let stuck = self
        .order
        .iter()
        .find(|id| !sorted.contains(id))
        .cloned()
        .unwrap_or_default();
      return Err(WorkflowError::CycleDetected(stuck));
    }

    Ok(sorted)
  }
}

fn walk<'g>(start: &str, next: impl Fn(&str) -> &'g [String]) -> HashSet<String> {
  let mut seen = HashSet::new();
  let mut stack: Vec<&str> = next(start).iter().map(String::as_str).collect();
  while let Some(id) = stack.pop() {
    if seen.insert(id.to_string()) {
      stack.extend(next(id).iter().map(String::as_str));
    }
  }
  seen
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  fn edge(from: &str, to: &str) -> (String, String) {
    (from.to_string(), to.to_string())
  }

  /// build-a, build-b -> stage -> publish
  fn fan_in() -> Graph {
    let jobs = ids(&["build-a", "build-b", "stage", "publish"]);
    let edges = vec![
      edge("build-a", "stage"),
      edge("build-b", "stage"),
      edge("stage", "publish"),
    ];
    Graph::new(&jobs, &edges)
  }

  #[test]
  fn test_entry_and_join_points() {
    let graph = fan_in();

    assert_eq!(graph.entry_points(), &ids(&["build-a", "build-b"])[..]);
    assert!(graph.is_join_point("stage"));
    assert!(!graph.is_join_point("publish"));
    assert_eq!(graph.upstream("stage"), &ids(&["build-a", "build-b"])[..]);
    assert_eq!(graph.downstream("stage"), &ids(&["publish"])[..]);
    assert!(graph.downstream("missing").is_empty());
  }

  #[test]
  fn test_ancestors_and_descendants() {
    let graph = fan_in();

    let ancestors = graph.ancestors("publish");
    assert_eq!(ancestors.len(), 3);
    assert!(ancestors.contains("build-a"));

    let descendants = graph.descendants("build-b");
    assert_eq!(descendants.len(), 2);
    assert!(descendants.contains("publish"));
    assert!(graph.descendants("publish").is_empty());
  }

  #[test]
  fn test_topological_order() {
    let order = fan_in().topological_order().unwrap();
    assert_eq!(order, ids(&["build-a", "build-b", "stage", "publish"]));
  }

  #[test]
  fn test_cycle_is_rejected() {
    let jobs = ids(&["a", "b", "c"]);
    let edges = vec![edge("a", "b"), edge("b", "c"), edge("c", "b")];
    let graph = Graph::new(&jobs, &edges);

    let err = graph.topological_order().unwrap_err();
    assert!(matches!(err, WorkflowError::CycleDetected(ref id) if id == "b"));
  }

  #[test]
  fn test_validate_rejects_unknown_edge() {
    let jobs = ids(&["a"]);
    let graph = Graph::new(&jobs, &[edge("a", "ghost")]);

    assert!(matches!(
      graph.validate(),
      Err(WorkflowError::InvalidEdge { .. })
    ));
  }

  #[test]
  fn test_validate_rejects_no_entry_points() {
    let jobs = ids(&["a", "b"]);
    let graph = Graph::new(&jobs, &[edge("a", "b"), edge("b", "a")]);

    assert!(matches!(graph.validate(), Err(WorkflowError::NoEntryPoints)));
  }
}
