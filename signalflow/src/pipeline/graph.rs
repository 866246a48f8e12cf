//! Graph validation and the validated stage graph.
//!
//! Validation runs in three phases: duplicate ids, unknown dependencies,
//! cycles. Issues within a phase are aggregated; a failing phase stops the
//! later ones because their checks assume the earlier invariants.

use super::StageDefinition;
use crate::errors::{GraphDefinitionError, GraphIssue};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A validated, immutable stage graph.
///
/// Built once per pipeline definition and reused across runs. All traversal
/// is id-based lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageGraph {
    stages: Vec<StageDefinition>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    dependents: BTreeMap<String, Vec<String>>,
    in_degree: BTreeMap<String, usize>,
    topological_order: Vec<String>,
    sinks: Vec<String>,
}

impl StageGraph {
    /// Validates a stage list and builds the graph.
    ///
    /// Repeated entries inside one `dependsOn` list are collapsed.
    ///
    /// # Errors
    ///
    /// Returns `GraphDefinitionError` for an empty list, duplicate ids,
    /// unknown dependencies, or a dependency cycle.
    pub fn build(stages: Vec<StageDefinition>) -> Result<Self, GraphDefinitionError> {
        if stages.is_empty() {
            return Err(GraphDefinitionError::from_issues(vec![GraphIssue::Empty]));
        }

        let duplicates = find_duplicates(&stages);
        if !duplicates.is_empty() {
            return Err(GraphDefinitionError::from_issues(duplicates));
        }

        let stages: Vec<StageDefinition> = stages.into_iter().map(dedup_dependencies).collect();
        let index: HashMap<String, usize> = stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let unknown: Vec<GraphIssue> = stages
            .iter()
            .flat_map(|stage| {
                stage
                    .depends_on
                    .iter()
                    .filter(|dep| !index.contains_key(*dep))
                    .map(|dep| GraphIssue::UnknownDependency {
                        stage: stage.id.clone(),
                        dependency: dep.clone(),
                    })
            })
            .collect();
        if !unknown.is_empty() {
            return Err(GraphDefinitionError::from_issues(unknown));
        }

        let nodes: Vec<(String, Vec<String>)> = stages
            .iter()
            .map(|s| (s.id.clone(), s.depends_on.clone()))
            .collect();
        let topological_order = stable_topological_sort(&nodes).map_err(|remaining| {
            let path = find_cycle(&nodes, &remaining).unwrap_or(remaining);
            GraphDefinitionError::from_issues(vec![GraphIssue::Cycle { path }])
        })?;

        let mut dependents: BTreeMap<String, Vec<String>> =
            stages.iter().map(|s| (s.id.clone(), Vec::new())).collect();
        for stage in &stages {
            for dep in &stage.depends_on {
                if let Some(children) = dependents.get_mut(dep) {
                    children.push(stage.id.clone());
                }
            }
        }

        let in_degree = stages
            .iter()
            .map(|s| (s.id.clone(), s.depends_on.len()))
            .collect();

        let sinks = stages
            .iter()
            .filter(|s| dependents.get(&s.id).is_some_and(Vec::is_empty))
            .map(|s| s.id.clone())
            .collect();

        Ok(Self {
            stages,
            index,
            dependents,
            in_degree,
            topological_order,
            sinks,
        })
    }

    /// Returns the stages in declared order.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Looks up a stage by id.
    #[must_use]
    pub fn stage(&self, id: &str) -> Option<&StageDefinition> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false; an empty stage list never validates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns the stages that consume `id`, in declared order.
    #[must_use]
    pub fn dependents(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the adjacency map (stage id to its dependents).
    #[must_use]
    pub fn adjacency(&self) -> &BTreeMap<String, Vec<String>> {
        &self.dependents
    }

    /// Returns the in-degree map (stage id to number of dependencies).
    #[must_use]
    pub fn in_degree(&self) -> &BTreeMap<String, usize> {
        &self.in_degree
    }

    /// Returns a deterministic topological order; ties keep declared order.
    #[must_use]
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Returns the stages without dependencies, in declared order.
    #[must_use]
    pub fn roots(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.is_root())
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Returns the stages without dependents, in declared order.
    #[must_use]
    pub fn sinks(&self) -> &[String] {
        &self.sinks
    }
}

fn find_duplicates(stages: &[StageDefinition]) -> Vec<GraphIssue> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut issues = Vec::new();
    for stage in stages {
        if !seen.insert(stage.id.as_str()) && reported.insert(stage.id.as_str()) {
            issues.push(GraphIssue::DuplicateStageId {
                id: stage.id.clone(),
            });
        }
    }
    issues
}

fn dedup_dependencies(mut stage: StageDefinition) -> StageDefinition {
    let mut seen = HashSet::new();
    stage.depends_on.retain(|dep| seen.insert(dep.clone()));
    stage
}

/// Orders `(id, dependencies)` pairs so every node follows its dependencies.
///
/// Among nodes that are ready at the same time, the one declared first wins,
/// which makes the order a pure function of the input. Dependencies that do
/// not name a node in `nodes` are ignored.
///
/// # Errors
///
/// Returns the ids that could not be ordered (every node on or behind a
/// cycle), in declared order.
pub(crate) fn stable_topological_sort(
    nodes: &[(String, Vec<String>)],
) -> Result<Vec<String>, Vec<String>> {
    let position: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (id, _))| (id.as_str(), i))
        .collect();

    let mut pending: Vec<usize> = nodes
        .iter()
        .map(|(_, deps)| deps.iter().filter(|d| position.contains_key(d.as_str())).count())
        .collect();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, (_, deps)) in nodes.iter().enumerate() {
        for dep in deps {
            if let Some(&p) = position.get(dep.as_str()) {
                children[p].push(i);
            }
        }
    }

    let mut emitted = vec![false; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = (0..nodes.len()).find(|&i| !emitted[i] && pending[i] == 0) {
        emitted[next] = true;
        order.push(nodes[next].0.clone());
        for &child in &children[next] {
            pending[child] = pending[child].saturating_sub(1);
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        Err(nodes
            .iter()
            .zip(&emitted)
            .filter(|(_, done)| !**done)
            .map(|((id, _), _)| id.clone())
            .collect())
    }
}

/// Finds one concrete cycle among the unordered nodes, first id repeated at
/// the end.
pub(crate) fn find_cycle(
    nodes: &[(String, Vec<String>)],
    remaining: &[String],
) -> Option<Vec<String>> {
    let deps: HashMap<&str, &[String]> = nodes
        .iter()
        .map(|(id, d)| (id.as_str(), d.as_slice()))
        .collect();
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    fn dfs(
        node: &str,
        deps: &HashMap<&str, &[String]>,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        for dep in deps.get(node).copied().unwrap_or_default() {
            if !deps.contains_key(dep.as_str()) {
                continue;
            }
            if rec_stack.contains(dep) {
                let start = path.iter().position(|n| n == dep).unwrap_or(0);
                let mut cycle = path[start..].to_vec();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = dfs(dep, deps, visited, rec_stack, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }

    remaining.iter().find_map(|start| {
        if visited.contains(start) {
            return None;
        }
        dfs(start, &deps, &mut visited, &mut rec_stack, &mut path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage(id: &str, deps: &[&str]) -> StageDefinition {
        StageDefinition::new(id).with_dependencies(deps.iter().copied())
    }

    #[test]
    fn test_build_linear_chain() {
        let graph = StageGraph::build(vec![
            stage("a", &[]),
            stage("b", &["a"]),
            stage("c", &["b"]),
        ])
        .unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.topological_order(), ["a", "b", "c"]);
        assert_eq!(graph.roots(), vec!["a"]);
        assert_eq!(graph.sinks(), ["c"]);
        assert_eq!(graph.dependents("a"), ["b"]);
        assert_eq!(graph.in_degree().get("c"), Some(&1));
    }

    #[test]
    fn test_duplicate_ids_are_aggregated() {
        let err = StageGraph::build(vec![
            stage("a", &[]),
            stage("a", &[]),
            stage("b", &[]),
            stage("b", &[]),
            stage("a", &[]),
        ])
        .unwrap_err();

        let text = err.to_string().to_lowercase();
        assert!(text.contains("duplicate"));
        assert!(text.contains("stage id"));
        assert_eq!(err.issues.len(), 2);
        assert_eq!(err.error_info.code, "GRAPH-001-DUPLICATE");
    }

    #[test]
    fn test_unknown_dependency_names_the_id() {
        let err = StageGraph::build(vec![stage("a", &[]), stage("b", &["ghost"])]).unwrap_err();

        assert!(err.to_string().contains("ghost"));
        assert_eq!(
            err.issues,
            vec![GraphIssue::UnknownDependency {
                stage: "b".into(),
                dependency: "ghost".into(),
            }]
        );
    }

    #[test]
    fn test_two_node_cycle() {
        let err = StageGraph::build(vec![stage("a", &["b"]), stage("b", &["a"])]).unwrap_err();

        assert!(err.to_string().contains("cycle"));
        assert!(err.has_cycle());
        let GraphIssue::Cycle { path } = &err.issues[0] else {
            panic!("expected cycle issue");
        };
        assert_eq!(path.first(), path.last());
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let err = StageGraph::build(vec![stage("a", &["a"])]).unwrap_err();
        assert!(err.has_cycle());
    }

    #[test]
    fn test_cycle_behind_valid_prefix() {
        let err = StageGraph::build(vec![
            stage("root", &[]),
            stage("x", &["root", "z"]),
            stage("y", &["x"]),
            stage("z", &["y"]),
        ])
        .unwrap_err();

        let GraphIssue::Cycle { path } = &err.issues[0] else {
            panic!("expected cycle issue");
        };
        assert!(!path.contains(&"root".to_string()));
    }

    #[test]
    fn test_empty_stage_list() {
        let err = StageGraph::build(Vec::new()).unwrap_err();
        assert_eq!(err.error_info.code, "GRAPH-004-EMPTY");
    }

    #[test]
    fn test_diamond_sinks_and_dependents() {
        let graph = StageGraph::build(vec![
            stage("root", &[]),
            stage("branch1", &["root"]),
            stage("branch2", &["root"]),
            stage("join", &["branch1", "branch2"]),
        ])
        .unwrap();

        assert_eq!(graph.dependents("root"), ["branch1", "branch2"]);
        assert_eq!(graph.sinks(), ["join"]);
        assert_eq!(graph.in_degree().get("join"), Some(&2));
    }

    #[test]
    fn test_repeated_dependency_is_collapsed() {
        let graph = StageGraph::build(vec![stage("a", &[]), stage("b", &["a", "a"])]).unwrap();
        assert_eq!(graph.stage("b").unwrap().depends_on, vec!["a".to_string()]);
        assert_eq!(graph.in_degree().get("b"), Some(&1));
    }

    #[test]
    fn test_stable_sort_keeps_declaration_order_for_ties() {
        let nodes = vec![
            ("c".to_string(), vec!["a".to_string()]),
            ("b".to_string(), vec![]),
            ("a".to_string(), vec![]),
        ];
        assert_eq!(
            stable_topological_sort(&nodes).unwrap(),
            vec!["b".to_string(), "a".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_graph_serializes_adjacency() {
        let graph = StageGraph::build(vec![stage("a", &[]), stage("b", &["a"])]).unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["dependents"]["a"][0], "b");
        assert_eq!(json["inDegree"]["b"], 1);
    }
}
