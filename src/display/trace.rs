//! Human-readable dependency traces for diagnosing a computed model.
use crate::store::{Graph, NodeId, NodeKind};
use crate::value::Value;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Write;

/// Formats an indented dependency tree for `target`, annotated with the
/// computed values from `results`.
pub fn format_trace(graph: &Graph, results: &BTreeMap<String, Value>, target: &str) -> String {
    let mut tracer = Tracer {
        graph,
        results,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match graph.id_of(target) {
        Some(id) => {
            let _ = writeln!(tracer.output, "TRACE for node '{}':", target);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_node(id, 1, "");
        }
        None => {
            let _ = writeln!(tracer.output, "Error: unknown node '{}'", target);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    graph: &'a Graph,
    results: &'a BTreeMap<String, Value>,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let name = self.graph.name_of(node_id);
        let value = self
            .results
            .get(name)
            .map(|v| format!(" [{}]", v))
            .unwrap_or_default();
        let header = format!("[L{}] {}{}", level, name, value);

        match self.graph.kind(node_id) {
            NodeKind::Constant(_) => {
                let _ = writeln!(self.output, "{}{} -> Const", prefix, header);
            }
            NodeKind::Input { key } => {
                let _ = writeln!(self.output, "{}{} -> Input(\"{}\")", prefix, header, key);
            }
            NodeKind::Param => {
                let _ = writeln!(self.output, "{}{} -> Param", prefix, header);
            }
            NodeKind::RangeItem { index, result, .. } => {
                let _ = writeln!(
                    self.output,
                    "{}{} -> Item #{} = {}",
                    prefix, header, index, result
                );
                self.recurse_children(node_id, prefix, level);
            }
            NodeKind::Formula(_) | NodeKind::Range { .. } => {
                let _ = writeln!(self.output, "{}{}", prefix, header);
                self.recurse_children(node_id, prefix, level);
            }
        }
    }

    fn recurse_children(&mut self, node_id: NodeId, prefix: &str, level: usize) {
        let deps: Vec<NodeId> = self.graph.deps(node_id).to_vec();
        let child_prefix = format!("{}|  ", prefix);
        for dep in deps {
            self.trace_node(dep, level + 1, &child_prefix);
        }
    }
}
