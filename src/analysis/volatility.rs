//! Transitive Param-dependence analysis.
//!
//! A node is volatile when its value depends on a loop-local Param binding
//! and therefore cannot be cached once per evaluation: Params themselves,
//! and anything that transitively reads one (including Ranges whose target
//! expressions do). Both maps here are computed once per compiled graph and
//! cached on the template; evaluation never re-derives them.
use crate::store::{Graph, NodeId, NodeKind};
use std::collections::HashSet;

/// Computes the volatility bitmap for `graph`, indexed by `NodeId`.
pub fn compute(graph: &Graph) -> Vec<bool> {
    let mut memo: Vec<Option<bool>> = vec![None; graph.count()];
    for id in graph.ids() {
        visit(graph, id, &mut memo);
    }
    memo.into_iter().map(|v| v.unwrap_or(false)).collect()
}

fn visit(graph: &Graph, id: NodeId, memo: &mut Vec<Option<bool>>) -> bool {
    if let Some(known) = memo[id.index()] {
        return known;
    }
    // Claim non-volatile while visiting; a dependency cycle re-entering this
    // node resolves to false here and fails properly at topological sort.
    memo[id.index()] = Some(false);

    let volatile = match graph.kind(id) {
        NodeKind::Param => true,
        NodeKind::Constant(_) | NodeKind::Input { .. } | NodeKind::RangeItem { .. } => false,
        NodeKind::Formula(_) | NodeKind::Range { .. } => graph
            .deps(id)
            .iter()
            .any(|&dep| visit(graph, dep, memo)),
    };
    memo[id.index()] = Some(volatile);
    volatile
}

/// Marks every node claimed as a per-item template by some Range.
///
/// A template is a member of the volatile closure reachable from any Range's
/// target roots: the Params, formulas, and nested Ranges that the expansion
/// pass clones per item. Templates are evaluated values-only during the walk
/// (the enclosing Range materializes their clones) and are never treated as
/// display roots afterwards.
pub fn template_set(graph: &Graph, volatile: &[bool]) -> Vec<bool> {
    let mut templates = vec![false; graph.count()];
    for id in graph.ids() {
        let NodeKind::Range { target_roots, .. } = graph.kind(id) else {
            continue;
        };
        let mut stack: Vec<NodeId> = target_roots
            .iter()
            .copied()
            .filter(|d| volatile[d.index()])
            .collect();
        let mut seen: HashSet<NodeId> = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            templates[node.index()] = true;
            for &dep in graph.deps(node) {
                if volatile[dep.index()] {
                    stack.push(dep);
                }
            }
        }
    }
    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CalcExpr, DepList};
    use crate::value::Value;
    use smallvec::smallvec;

    #[test]
    fn test_param_dependence_is_transitive() {
        let mut g = Graph::new();
        let qty = g.add_node("qty", NodeKind::Param, DepList::new()).unwrap();
        let base = g
            .add_node("base", NodeKind::Constant(Value::Number(10.0)), DepList::new())
            .unwrap();
        let line = g
            .add_node(
                "line",
                NodeKind::Formula(CalcExpr::NodeRef(qty)),
                smallvec![qty, base],
            )
            .unwrap();
        let total = g
            .add_node(
                "total",
                NodeKind::Formula(CalcExpr::NodeRef(base)),
                smallvec![base],
            )
            .unwrap();

        let v = compute(&g);
        assert!(v[qty.index()]);
        assert!(v[line.index()]);
        assert!(!v[base.index()]);
        assert!(!v[total.index()]);
    }

    #[test]
    fn test_template_set_claims_target_closure_only() {
        let mut g = Graph::new();
        let items = g
            .add_node("items", NodeKind::Input { key: "items".into() }, DepList::new())
            .unwrap();
        let qty = g.add_node("qty", NodeKind::Param, DepList::new()).unwrap();
        let line = g
            .add_node(
                "line",
                NodeKind::Formula(CalcExpr::NodeRef(qty)),
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
        // A formula reading the Param directly, outside any range target.
        let direct = g
            .add_node(
                "direct",
                NodeKind::Formula(CalcExpr::NodeRef(qty)),
                smallvec![qty],
            )
            .unwrap();

        let volatile = compute(&g);
        let templates = template_set(&g, &volatile);
        assert!(templates[line.index()]);
        assert!(templates[qty.index()]);
        assert!(!templates[range.index()]);
        assert!(!templates[direct.index()]);
        assert!(!templates[items.index()]);
    }
}
