//! Dependency graph ordering and cycle detection.
//!
//! The sort is best-effort: changes unreachable by Kahn's algorithm
//! (members of cycles) keep their original relative order at the end of
//! the plan. Cycles are detected separately and reported, never fatal.

use std::collections::{HashMap, HashSet, VecDeque};

use super::types::{Change, DependencyGraph};

/// Builds a dependency graph from the changes' resolved dependency lists.
///
/// Edges run `(depends_on, dependent)`; only dependencies that are
/// themselves changes in the plan produce edges.
#[must_use]
pub fn build_graph(changes: &[Change]) -> DependencyGraph {
    let ids: HashSet<&str> = changes.iter().map(|c| c.resource_id.as_str()).collect();

    let mut graph = DependencyGraph::new();
    for change in changes {
        graph.nodes.push(change.resource_id.clone());
        for dep in &change.dependencies {
            if ids.contains(dep.as_str()) {
                graph.edges.push((dep.clone(), change.resource_id.clone()));
            }
        }
    }
    graph
}

/// Kahn's-algorithm topological sort over `(depends_on, dependent)` edges.
///
/// Returns node ids in an order where every node appears after its
/// dependencies. Nodes on cycles are absent from the result.
#[must_use]
pub fn topological_sort(nodes: &[String], edges: &[(String, String)]) -> Vec<String> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (n.as_str(), 0)).collect();

    for (from, to) in edges {
        adjacency.entry(from.as_str()).or_default().push(to.as_str());
        *in_degree.entry(to.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = nodes
        .iter()
        .map(String::as_str)
        .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
        .collect();

    let mut result = Vec::with_capacity(nodes.len());
    while let Some(node) = queue.pop_front() {
        result.push(node.to_string());

        if let Some(neighbors) = adjacency.get(node) {
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
    }

    result
}

/// DFS-based cycle detection.
///
/// Returns each detected cycle as the chain of node ids, closed with the
/// repeated node.
#[must_use]
pub fn detect_cycles(nodes: &[String], edges: &[(String, String)]) -> Vec<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (from, to) in edges {
        adjacency.entry(from.as_str()).or_default().push(to.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();

    for node in nodes {
        if !visited.contains(node.as_str()) {
            let mut rec_stack = HashSet::new();
            dfs(
                node.as_str(),
                &adjacency,
                &mut visited,
                &mut rec_stack,
                &mut Vec::new(),
                &mut cycles,
            );
        }
    }

    cycles
}

/// DFS visit tracking the recursion stack to spot back edges.
fn dfs<'a>(
    node: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = adjacency.get(node) {
        for neighbor in neighbors {
            if !visited.contains(neighbor) {
                dfs(neighbor, adjacency, visited, rec_stack, &mut path.clone(), cycles);
            } else if rec_stack.contains(neighbor) {
                // Back edge: the cycle runs from the first occurrence of
                // the neighbor on the current path back to it.
                if let Some(start) = path.iter().position(|n| n == neighbor) {
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(ToString::to_string).collect();
                    cycle.push((*neighbor).to_string());
                    cycles.push(cycle);
                }
            }
        }
    }

    rec_stack.remove(node);
}

/// Reorders changes so dependencies come first.
///
/// Changes missing from the sorted ids (cycle members) are appended in
/// their original order.
#[must_use]
pub fn sort_changes(changes: Vec<Change>, graph: &DependencyGraph) -> Vec<Change> {
    let sorted_ids = topological_sort(&graph.nodes, &graph.edges);

    let mut by_id: HashMap<String, Change> = changes
        .iter()
        .map(|c| (c.resource_id.clone(), c.clone()))
        .collect();

    let mut sorted = Vec::with_capacity(changes.len());
    for id in sorted_ids {
        if let Some(change) = by_id.remove(&id) {
            sorted.push(change);
        }
    }

    // Cycle members fall through here, original order preserved.
    for change in changes {
        if by_id.remove(&change.resource_id).is_some() {
            sorted.push(change);
        }
    }

    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::types::ChangeAction;

    fn change_with_deps(id: &str, deps: &[&str]) -> Change {
        let mut change = Change::new(ChangeAction::Create, "VPC::Subnet", id);
        change.dependencies = deps.iter().map(ToString::to_string).collect();
        change
    }

    #[test]
    fn test_sort_respects_dependencies() {
        let changes = vec![
            change_with_deps("i-1", &["subnet-1", "sg-1"]),
            change_with_deps("subnet-1", &["vpc-1"]),
            change_with_deps("sg-1", &["vpc-1"]),
            change_with_deps("vpc-1", &[]),
        ];

        let graph = build_graph(&changes);
        let sorted = sort_changes(changes, &graph);

        let position = |id: &str| {
            sorted
                .iter()
                .position(|c| c.resource_id == id)
                .expect("change present")
        };

        assert!(position("vpc-1") < position("subnet-1"));
        assert!(position("vpc-1") < position("sg-1"));
        assert!(position("subnet-1") < position("i-1"));
        assert!(position("sg-1") < position("i-1"));
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn test_cycle_members_appended_in_original_order() {
        let changes = vec![
            change_with_deps("a", &["b"]),
            change_with_deps("b", &["a"]),
            change_with_deps("c", &[]),
        ];

        let graph = build_graph(&changes);
        let sorted = sort_changes(changes, &graph);

        assert_eq!(sorted.len(), 3);
        assert_eq!(sorted[0].resource_id, "c");
        assert_eq!(sorted[1].resource_id, "a");
        assert_eq!(sorted[2].resource_id, "b");
    }

    #[test]
    fn test_detect_cycles_reports_chain() {
        let nodes = vec![String::from("a"), String::from("b"), String::from("c")];
        let edges = vec![
            (String::from("a"), String::from("b")),
            (String::from("b"), String::from("a")),
            (String::from("b"), String::from("c")),
        ];

        let cycles = detect_cycles(&nodes, &edges);
        assert!(!cycles.is_empty());
        let cycle = &cycles[0];
        assert!(cycle.contains(&String::from("a")));
        assert!(cycle.contains(&String::from("b")));
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let nodes = vec![String::from("a"), String::from("b")];
        let edges = vec![(String::from("a"), String::from("b"))];

        assert!(detect_cycles(&nodes, &edges).is_empty());
    }
}
