//! The evaluator: runs a compiled graph against a chain of input providers.
use crate::compile::CompiledModel;
use crate::error::EvalError;
use crate::eval::context::Scope;
use crate::eval::interp::Interp;
use crate::eval::{expand, inputs, prune};
use crate::eval::inputs::InputProvider;
use crate::store::{Graph, NodeId, NodeKind};
use crate::analysis::topology;
use crate::value::Value;
use std::collections::BTreeMap;

/// The outcome of one evaluation: computed values by node name, plus the
/// expanded-and-pruned graph for display.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub results: BTreeMap<String, Value>,
    pub graph: Graph,
}

/// Evaluates a compiled model against `providers`.
///
/// The template is deep-cloned first; this function never mutates it, so a
/// failed run leaves the model valid for the next attempt and concurrent
/// runs never observe each other.
pub fn evaluate(
    model: &CompiledModel,
    providers: &[&dyn InputProvider],
) -> Result<Evaluation, EvalError> {
    let _span = tracing::info_span!("evaluate", nodes = model.graph().count()).entered();

    let mut graph = model.graph().clone();
    let order = topology::execution_order(&graph)?;

    let volatile = model.volatile_map();
    let templates = model.template_map();
    let mut results: BTreeMap<String, Value> = BTreeMap::new();

    for id in order {
        let expandable = matches!(graph.kind(id), NodeKind::Range { .. })
            && !templates.get(id.index()).copied().unwrap_or(false);
        let value = if expandable {
            expand::expand_range(&mut graph, volatile, &mut results, id)?
        } else {
            plain_value(&graph, volatile, &results, providers, id)?
        };
        results.insert(graph.name_of(id).to_string(), value);
    }

    let graph = prune::prune(&graph, templates);
    Ok(Evaluation { results, graph })
}

/// Evaluates any node that does not expand: constants copy, inputs resolve
/// and decode, everything else re-runs its own computation in a root scope.
fn plain_value(
    graph: &Graph,
    volatile: &[bool],
    results: &BTreeMap<String, Value>,
    providers: &[&dyn InputProvider],
    id: NodeId,
) -> Result<Value, EvalError> {
    match graph.kind(id) {
        NodeKind::Constant(v) => Ok(v.clone()),
        NodeKind::Input { key } => {
            let raw = inputs::resolve(providers, key)
                .ok_or_else(|| EvalError::MissingInput(key.clone()))?;
            inputs::decode(key, raw)
        }
        _ => {
            let interp = Interp { graph, volatile };
            let scope = Scope::root(results);
            interp.eval_node(id, &scope)
        }
    }
}
