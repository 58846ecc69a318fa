//! Range expansion: volatile-subgraph computation and per-item cloning.
//!
//! Kept as two separable operations so each can be exercised on its own:
//! [`volatile_subgraph`] decides *what* gets cloned, [`expand_range`]
//! performs the clone-evaluate-rewire pass.
use crate::error::EvalError;
use crate::eval::context::Scope;
use crate::eval::interp::Interp;
use crate::store::{DepList, Graph, NodeId, NodeKind};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Dependency-ordered transitive closure of volatile nodes from `roots`.
///
/// Post-order, so every node appears after the volatile dependencies its
/// clone will be rewired to.
pub(crate) fn volatile_subgraph(graph: &Graph, volatile: &[bool], roots: &[NodeId]) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    for &root in roots {
        visit(graph, volatile, root, &mut seen, &mut order);
    }
    order
}

fn visit(
    graph: &Graph,
    volatile: &[bool],
    id: NodeId,
    seen: &mut HashSet<NodeId>,
    order: &mut Vec<NodeId>,
) {
    if !volatile.get(id.index()).copied().unwrap_or(false) || !seen.insert(id) {
        return;
    }
    for &dep in graph.deps(id) {
        visit(graph, volatile, dep, seen, order);
    }
    order.push(id);
}

/// Expands one Range node in place.
///
/// Evaluates the source collection, clones the volatile subgraph once per
/// item under that item's context, materializes a `RangeItem` per item, and
/// replaces the Range's dependency list with the created items. Returns the
/// array of per-item scalars.
pub(crate) fn expand_range(
    graph: &mut Graph,
    volatile: &[bool],
    results: &mut BTreeMap<String, Value>,
    id: NodeId,
) -> Result<Value, EvalError> {
    let (source, target, target_roots, range_name) = match graph.kind(id) {
        NodeKind::Range {
            source,
            target,
            target_roots,
        } => (
            source.clone(),
            target.clone(),
            target_roots.clone(),
            graph.name_of(id).to_string(),
        ),
        _ => unreachable!("expand_range invoked on a non-Range node"),
    };

    let items = {
        let interp = Interp {
            graph: &*graph,
            volatile,
        };
        let scope = Scope::root(results);
        interp.collection_items(&range_name, &source, &scope)?
    };

    let subgraph = volatile_subgraph(graph, volatile, &target_roots);

    let mut scalars = Vec::with_capacity(items.len());
    let mut item_nodes = DepList::new();

    for (i, item) in items.iter().enumerate() {
        let index = i + 1;
        let mut clone_map: HashMap<NodeId, NodeId> = HashMap::new();

        for &template in &subgraph {
            let value = {
                let interp = Interp {
                    graph: &*graph,
                    volatile,
                };
                let root = Scope::root(results);
                let child = Scope::child(item.clone(), &root);
                interp.eval_node(template, &child)?
            };
            // Volatile dependencies point at this item's sibling clones;
            // everything else stays shared with the original.
            let deps: DepList = graph
                .deps(template)
                .iter()
                .map(|d| clone_map.get(d).copied().unwrap_or(*d))
                .collect();
            let proposed = format!("{}({})", graph.name_of(template), index);
            let kind = graph.kind(template).clone();
            let clone_id = graph.add_node_uniquified(&proposed, kind, deps);
            results.insert(graph.name_of(clone_id).to_string(), value);
            clone_map.insert(template, clone_id);
        }

        let scalar = {
            let interp = Interp {
                graph: &*graph,
                volatile,
            };
            let root = Scope::root(results);
            let child = Scope::child(item.clone(), &root);
            interp.eval(&target, &child)?.as_number()?
        };

        let item_deps: DepList = target_roots
            .iter()
            .map(|d| clone_map.get(d).copied().unwrap_or(*d))
            .collect();
        let item_id = graph.add_node_uniquified(
            &format!("{}({})", range_name, index),
            NodeKind::RangeItem {
                index,
                result: scalar,
                properties: item.clone(),
                parent: range_name.clone(),
            },
            item_deps,
        );
        results.insert(graph.name_of(item_id).to_string(), Value::Number(scalar));
        item_nodes.push(item_id);
        scalars.push(scalar);
    }

    graph.set_deps(id, item_nodes);
    Ok(Value::Array(scalars.into_iter().map(Value::Number).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::volatility;
    use crate::store::CalcExpr;
    use smallvec::smallvec;

    /// items -> range(target: line = qty * 10)
    fn fixture() -> (Graph, Vec<bool>, NodeId) {
        let mut g = Graph::new();
        let items = g
            .add_node(
                "items",
                NodeKind::Constant(Value::Array(vec![])),
                DepList::new(),
            )
            .unwrap();
        let qty = g.add_node("qty", NodeKind::Param, DepList::new()).unwrap();
        let line = g
            .add_node(
                "line",
                NodeKind::Formula(CalcExpr::Binary {
                    op: crate::ast::BinaryOp::Mul,
                    lhs: Box::new(CalcExpr::NodeRef(qty)),
                    rhs: Box::new(CalcExpr::Number(10.0)),
                }),
                smallvec![qty],
            )
            .unwrap();
        let range = g
            .add_node(
                "r",
                NodeKind::Range {
                    source: CalcExpr::NodeRef(items),
                    target: CalcExpr::NodeRef(line),
                    target_roots: smallvec![line],
                },
                smallvec![items, line],
            )
            .unwrap();
        let volatile = volatility::compute(&g);
        (g, volatile, range)
    }

    #[test]
    fn test_subgraph_is_dependency_ordered() {
        let (g, volatile, _) = fixture();
        let line = g.id_of("line").unwrap();
        let qty = g.id_of("qty").unwrap();
        let sub = volatile_subgraph(&g, &volatile, &[line]);
        assert_eq!(sub, vec![qty, line]);
    }

    #[test]
    fn test_expand_clones_and_rewires_per_item() {
        let (mut g, volatile, range) = fixture();
        let items = g.id_of("items").unwrap();
        let item = |qty: f64| {
            let mut m = BTreeMap::new();
            m.insert("qty".to_string(), Value::Number(qty));
            Value::Object(m)
        };
        g.set_kind(
            items,
            NodeKind::Constant(Value::Array(vec![item(2.0), item(3.0)])),
        );

        let mut results = BTreeMap::new();
        results.insert("items".to_string(), Value::Array(vec![item(2.0), item(3.0)]));
        let value = expand_range(&mut g, &volatile, &mut results, range).unwrap();
        assert_eq!(
            value,
            Value::Array(vec![Value::Number(20.0), Value::Number(30.0)])
        );

        // Clones carry per-item values and point at sibling clones.
        assert_eq!(results["qty(1)"], Value::Number(2.0));
        assert_eq!(results["line(2)"], Value::Number(30.0));
        let line2 = g.id_of("line(2)").unwrap();
        let qty2 = g.id_of("qty(2)").unwrap();
        assert_eq!(g.deps(line2), &[qty2]);

        // The range now depends on its materialized items.
        let r1 = g.id_of("r(1)").unwrap();
        let r2 = g.id_of("r(2)").unwrap();
        assert_eq!(g.deps(range), &[r1, r2]);
        match g.kind(r1) {
            NodeKind::RangeItem {
                index,
                result,
                parent,
                properties,
            } => {
                assert_eq!(*index, 1);
                assert_eq!(*result, 20.0);
                assert_eq!(parent, "r");
                assert_eq!(properties["qty"], Value::Number(2.0));
            }
            other => panic!("expected range item, got {:?}", other),
        }
    }
}
