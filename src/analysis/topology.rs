//! Topological ordering and reachability over the dependency-edge view.
use crate::error::EvalError;
use crate::store::{Graph, NodeId};
use std::collections::{HashSet, VecDeque};

/// Returns an execution order using Kahn's algorithm.
///
/// In-degree of a node is its number of dependencies; edges run
/// dependency → dependent. The ready queue is seeded and drained in index
/// order, so the order is deterministic for a given graph.
///
/// A produced order shorter than the node count means a cycle; that is a
/// hard error rather than a partial order.
pub fn execution_order(graph: &Graph) -> Result<Vec<NodeId>, EvalError> {
    let count = graph.count();
    let mut in_degree = vec![0usize; count];
    let mut dependents: Vec<Vec<NodeId>> = vec![Vec::new(); count];

    for id in graph.ids() {
        let deps = graph.deps(id);
        in_degree[id.index()] = deps.len();
        for &dep in deps {
            dependents[dep.index()].push(id);
        }
    }

    let mut queue: VecDeque<NodeId> = graph
        .ids()
        .filter(|id| in_degree[id.index()] == 0)
        .collect();
    let mut order = Vec::with_capacity(count);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &child in &dependents[node.index()] {
            in_degree[child.index()] -= 1;
            if in_degree[child.index()] == 0 {
                queue.push_back(child);
            }
        }
    }

    if order.len() != count {
        // Any node still holding in-degree sits on (or behind) a cycle.
        let stuck = graph
            .ids()
            .find(|id| in_degree[id.index()] > 0)
            .map(|id| graph.name_of(id).to_string())
            .unwrap_or_default();
        return Err(EvalError::Cycle(stuck));
    }

    Ok(order)
}

/// Breadth-first traversal along dependency edges from `start_nodes`.
pub fn upstream_from(graph: &Graph, start_nodes: &[NodeId]) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start_nodes.to_vec());

    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            for &dep in graph.deps(node) {
                queue.push_back(dep);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CalcExpr, DepList, NodeKind};
    use crate::value::Value;
    use smallvec::smallvec;

    fn constant(g: &mut Graph, name: &str) -> NodeId {
        g.add_node(name, NodeKind::Constant(Value::Number(1.0)), DepList::new())
            .unwrap()
    }

    fn formula(g: &mut Graph, name: &str, deps: DepList) -> NodeId {
        let expr = CalcExpr::NodeRef(deps[0]);
        g.add_node(name, NodeKind::Formula(expr), deps).unwrap()
    }

    #[test]
    fn test_order_diamond_dependency() {
        // Shape: A -> B, A -> C, B+C -> D
        let mut g = Graph::new();
        let a = constant(&mut g, "A");
        let b = formula(&mut g, "B", smallvec![a]);
        let c = formula(&mut g, "C", smallvec![a]);
        let d = formula(&mut g, "D", smallvec![b, c]);

        let order = execution_order(&g).expect("sort failed");
        assert_eq!(order.len(), 4);

        let pos = |id: NodeId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_every_node_appears_after_its_dependencies() {
        let mut g = Graph::new();
        let a = constant(&mut g, "A");
        let b = formula(&mut g, "B", smallvec![a]);
        let c = formula(&mut g, "C", smallvec![b, a]);
        let _d = formula(&mut g, "D", smallvec![c]);

        let order = execution_order(&g).unwrap();
        let pos: Vec<usize> = g
            .ids()
            .map(|id| order.iter().position(|&x| x == id).unwrap())
            .collect();
        for id in g.ids() {
            for dep in g.deps(id) {
                assert!(pos[dep.index()] < pos[id.index()]);
            }
        }
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut g = Graph::new();
        let a = constant(&mut g, "A");
        let b = formula(&mut g, "B", smallvec![a]);
        // Force A -> B after the fact, closing the loop.
        g.set_deps(a, smallvec![b]);

        let err = execution_order(&g).unwrap_err();
        assert!(matches!(err, EvalError::Cycle(_)), "got: {:?}", err);
    }

    #[test]
    fn test_upstream_traversal() {
        let mut g = Graph::new();
        let a = constant(&mut g, "A");
        let b = formula(&mut g, "B", smallvec![a]);
        let c = formula(&mut g, "C", smallvec![b]);
        let other = constant(&mut g, "other");

        let reached = upstream_from(&g, &[c]);
        assert!(reached.contains(&a) && reached.contains(&b) && reached.contains(&c));
        assert!(!reached.contains(&other));
    }
}
