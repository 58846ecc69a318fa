//! Display pruning of an evaluated graph.
use crate::analysis::topology;
use crate::store::{Graph, NodeId, NodeKind};

/// Reduces an evaluated graph to what external consumers should see.
///
/// True roots are nodes nothing depends on, excluding Inputs, Params,
/// `$`-prefixed scaffolding, input-wrapper formulas, and per-item templates
/// already cloned by a Range. Everything unreachable from a true root along
/// dependency edges is deleted; a template some live formula still reads
/// stays because that formula keeps it reachable.
pub(crate) fn prune(graph: &Graph, templates: &[bool]) -> Graph {
    let counts = graph.dependent_counts();
    let roots: Vec<NodeId> = graph
        .ids()
        .filter(|&id| counts[id.index()] == 0 && is_true_root(graph, templates, id))
        .collect();
    let keep = topology::upstream_from(graph, &roots);
    graph.compact(&keep)
}

fn is_true_root(graph: &Graph, templates: &[bool], id: NodeId) -> bool {
    let kind = graph.kind(id);
    if kind.is_input() || kind.is_param() {
        return false;
    }
    if graph.name_of(id).starts_with('$') {
        return false;
    }
    if templates.get(id.index()).copied().unwrap_or(false) {
        return false;
    }
    // An input wrapper only forwards a value; it is plumbing, not a root.
    if matches!(kind, NodeKind::Formula(_)) {
        if let [only] = graph.deps(id) {
            if graph.kind(*only).is_input() {
                return false;
            }
        }
    }
    true
}
