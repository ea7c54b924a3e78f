//! Dependency plan for one run
//!
//! Resolves edges to child indices and computes a deterministic topological
//! order with Kahn's algorithm. Among ready nodes the one that appears first
//! in the original node order always goes next.

use std::collections::{BTreeSet, HashMap};

use crate::error::{EngineError, Result};
use crate::types::Edge;

/// Resolved adjacency for a set of children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Child indices in execution order
    pub order: Vec<usize>,
    /// Distinct upstream children per child
    pub predecessors: Vec<Vec<usize>>,
    /// Distinct downstream children per child
    pub successors: Vec<Vec<usize>>,
    /// Indices into the edge slice arriving at each child, in edge order
    pub incoming: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    /// Children with no outgoing edge
    pub fn is_terminal(&self, index: usize) -> bool {
        self.successors.get(index).map_or(true, Vec::is_empty)
    }
}

/// Build the plan for `node_ids` (in original order) connected by `edges`
///
/// Fails before anything runs if an edge names an unknown child or the
/// edges contain a cycle, self-loops included.
pub fn build_plan(node_ids: &[&str], edges: &[Edge]) -> Result<ExecutionPlan> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(node_ids.len());
    for (i, id) in node_ids.iter().enumerate() {
        if index.insert(*id, i).is_some() {
            return Err(EngineError::failed(format!(
                "Child node id '{}' appears more than once",
                id
            )));
        }
    }

    let n = node_ids.len();
    let mut predecessors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (edge_index, edge) in edges.iter().enumerate() {
        let source = resolve(&index, edge, &edge.source.node_id)?;
        let target = resolve(&index, edge, &edge.target.node_id)?;

        if source == target {
            return Err(EngineError::CycleDetected {
                nodes: vec![edge.source.node_id.clone()],
            });
        }

        predecessors[target].insert(source);
        successors[source].insert(target);
        incoming[target].push(edge_index);
    }

    let mut in_degree: Vec<usize> = predecessors.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for &succ in &successors[next] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() != n {
        let nodes = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| node_ids[i].to_string())
            .collect();
        return Err(EngineError::CycleDetected { nodes });
    }

    Ok(ExecutionPlan {
        order,
        predecessors: predecessors.into_iter().map(|s| s.into_iter().collect()).collect(),
        successors: successors.into_iter().map(|s| s.into_iter().collect()).collect(),
        incoming,
    })
}

fn resolve(index: &HashMap<&str, usize>, edge: &Edge, node_id: &str) -> Result<usize> {
    index
        .get(node_id)
        .copied()
        .ok_or_else(|| EngineError::UnresolvedEdge {
            edge_id: edge.id.clone(),
            node_id: node_id.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(plan: &ExecutionPlan, names: &[&str]) -> Vec<String> {
        plan.order.iter().map(|&i| names[i].to_string()).collect()
    }

    #[test]
    fn test_linear_chain() {
        let names = ["a", "b", "c"];
        let edges = vec![Edge::between("e1", "a", "b"), Edge::between("e2", "b", "c")];
        let plan = build_plan(&names, &edges).unwrap();
        assert_eq!(ids(&plan, &names), vec!["a", "b", "c"]);
        assert!(plan.is_terminal(2));
        assert!(!plan.is_terminal(0));
    }

    #[test]
    fn test_order_follows_dependencies_not_declaration() {
        let names = ["c", "b", "a"];
        let edges = vec![Edge::between("e1", "a", "b"), Edge::between("e2", "b", "c")];
        let plan = build_plan(&names, &edges).unwrap();
        assert_eq!(ids(&plan, &names), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_broken_by_original_order() {
        // root fans out to x, y, z declared in the order z, x, y
        let names = ["root", "z", "x", "y", "sink"];
        let edges = vec![
            Edge::between("e1", "root", "x"),
            Edge::between("e2", "root", "y"),
            Edge::between("e3", "root", "z"),
            Edge::between("e4", "x", "sink"),
            Edge::between("e5", "y", "sink"),
            Edge::between("e6", "z", "sink"),
        ];
        let plan = build_plan(&names, &edges).unwrap();
        assert_eq!(ids(&plan, &names), vec!["root", "z", "x", "y", "sink"]);
        assert_eq!(plan.predecessors[4], vec![1, 2, 3]);
    }

    #[test]
    fn test_parallel_edges_counted_once() {
        let names = ["a", "b"];
        let edges = vec![
            Edge::between("e1", "a", "b"),
            Edge::between("e2", "a", "b"),
        ];
        let plan = build_plan(&names, &edges).unwrap();
        assert_eq!(plan.predecessors[1], vec![0]);
        assert_eq!(plan.incoming[1], vec![0, 1]);
    }

    #[test]
    fn test_unresolved_edge() {
        let err = build_plan(&["a"], &[Edge::between("e1", "a", "ghost")]).unwrap_err();
        match err {
            EngineError::UnresolvedEdge { edge_id, node_id } => {
                assert_eq!(edge_id, "e1");
                assert_eq!(node_id, "ghost");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cycle_detected() {
        let names = ["a", "b", "c", "d"];
        let edges = vec![
            Edge::between("e1", "a", "b"),
            Edge::between("e2", "b", "c"),
            Edge::between("e3", "c", "b"),
            Edge::between("e4", "c", "d"),
        ];
        let err = build_plan(&names, &edges).unwrap_err();
        assert_eq!(err.code(), "CYCLE_DETECTED");
        match err {
            EngineError::CycleDetected { nodes } => assert_eq!(nodes, vec!["b", "c", "d"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let err = build_plan(&["a"], &[Edge::between("loop", "a", "a")]).unwrap_err();
        assert_eq!(err.code(), "CYCLE_DETECTED");
    }

    #[test]
    fn test_empty() {
        let plan = build_plan(&[], &[]).unwrap();
        assert!(plan.order.is_empty());
    }
}
