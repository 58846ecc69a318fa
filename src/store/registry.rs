//! The named-node registry backing compiled and evaluated graphs.
use super::types::{DepList, NodeId, NodeKind};
use crate::error::CompileError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A registry mapping unique names to nodes, stored as a columnar arena.
///
/// Node records are immutable once added; the dependency edge table is the
/// only part that mutates afterwards (pass-2 resolution, Range expansion).
/// Nothing here is hashed on mutable state: `by_name` keys on the name,
/// which never changes after insertion.
///
/// `Clone` produces a deep structural copy; that copy is how evaluation
/// protects the compiled template from its own mutations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    kinds: Vec<NodeKind>,
    names: Vec<String>,
    deps: Vec<DepList>,

    // Lookup cache, rebuilt on load rather than serialized.
    #[serde(skip)]
    by_name: HashMap<String, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.kinds.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.count()).map(NodeId::new)
    }

    /// Adds a node under a unique name. Two nodes may never share a name.
    pub fn add_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        deps: DepList,
    ) -> Result<NodeId, CompileError> {
        if self.by_name.contains_key(name) {
            return Err(CompileError::DuplicateNode(name.to_string()));
        }
        Ok(self.push(name.to_string(), kind, deps))
    }

    /// Adds a node, suffixing the name until it is unique.
    ///
    /// Reserved for evaluation-time artifacts (per-item clones, range items)
    /// where two expansions may propose the same name; compiled nodes go
    /// through [`Graph::add_node`] and fail hard instead.
    pub fn add_node_uniquified(&mut self, name: &str, kind: NodeKind, deps: DepList) -> NodeId {
        let mut candidate = name.to_string();
        let mut counter = 1;
        while self.by_name.contains_key(&candidate) {
            candidate = format!("{}_{}", name, counter);
            counter += 1;
        }
        self.push(candidate, kind, deps)
    }

    fn push(&mut self, name: String, kind: NodeKind, deps: DepList) -> NodeId {
        let id = NodeId(self.kinds.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.names.push(name);
        self.kinds.push(kind);
        self.deps.push(deps);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    #[inline(always)]
    pub fn name_of(&self, id: NodeId) -> &str {
        &self.names[id.index()]
    }

    #[inline(always)]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.kinds[id.index()]
    }

    #[inline(always)]
    pub fn deps(&self, id: NodeId) -> &[NodeId] {
        &self.deps[id.index()]
    }

    pub(crate) fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.kinds[id.index()] = kind;
    }

    pub(crate) fn set_deps(&mut self, id: NodeId, deps: DepList) {
        self.deps[id.index()] = deps;
    }

    /// Counts, per node, how many other nodes list it as a dependency.
    ///
    /// Computed on demand: the edge table is rewritten during evaluation, so
    /// an incrementally maintained reverse index would go stale.
    pub fn dependent_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.count()];
        for deps in &self.deps {
            for dep in deps {
                counts[dep.index()] += 1;
            }
        }
        counts
    }

    /// Rebuilds the `by_name` cache after deserialization.
    pub fn rebuild_name_index(&mut self) {
        self.by_name = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), NodeId::new(i)))
            .collect();
    }

    /// Rebuilds the arena keeping only `keep`, remapping ids and edges.
    ///
    /// Dependencies of kept nodes must themselves be kept; Range target-root
    /// lists may reference deleted templates and are filtered instead.
    pub fn compact(&self, keep: &HashSet<NodeId>) -> Graph {
        let mut remap: HashMap<NodeId, NodeId> = HashMap::with_capacity(keep.len());
        let mut out = Graph::new();
        for old in self.ids().filter(|id| keep.contains(id)) {
            let new_id = out.push(
                self.names[old.index()].clone(),
                self.kinds[old.index()].clone(),
                DepList::new(),
            );
            remap.insert(old, new_id);
        }
        for old in self.ids().filter(|id| keep.contains(id)) {
            let new_id = remap[&old];
            let new_deps: DepList = self.deps[old.index()]
                .iter()
                .filter_map(|d| remap.get(d).copied())
                .collect();
            out.deps[new_id.index()] = new_deps;
            if let NodeKind::Range {
                source,
                target,
                target_roots,
            } = &self.kinds[old.index()]
            {
                let roots: DepList = target_roots
                    .iter()
                    .filter_map(|d| remap.get(d).copied())
                    .collect();
                out.kinds[new_id.index()] = NodeKind::Range {
                    source: source.clone(),
                    target: target.clone(),
                    target_roots: roots,
                };
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use smallvec::smallvec;

    #[test]
    fn test_duplicate_name_is_hard_error() {
        let mut g = Graph::new();
        g.add_node("a", NodeKind::Constant(Value::Number(1.0)), DepList::new())
            .unwrap();
        let err = g
            .add_node("a", NodeKind::Constant(Value::Number(2.0)), DepList::new())
            .unwrap_err();
        assert_eq!(err, CompileError::DuplicateNode("a".into()));
    }

    #[test]
    fn test_uniquified_add_suffixes() {
        let mut g = Graph::new();
        g.add_node("qty(1)", NodeKind::Param, DepList::new()).unwrap();
        let id = g.add_node_uniquified("qty(1)", NodeKind::Param, DepList::new());
        assert_eq!(g.name_of(id), "qty(1)_1");
    }

    #[test]
    fn test_compact_remaps_edges() {
        let mut g = Graph::new();
        let a = g
            .add_node("a", NodeKind::Constant(Value::Number(1.0)), DepList::new())
            .unwrap();
        let b = g
            .add_node("b", NodeKind::Constant(Value::Number(2.0)), DepList::new())
            .unwrap();
        let c = g
            .add_node(
                "c",
                NodeKind::Formula(crate::store::CalcExpr::NodeRef(b)),
                smallvec![b],
            )
            .unwrap();
        let keep: HashSet<NodeId> = [b, c].into_iter().collect();
        let out = g.compact(&keep);
        assert_eq!(out.count(), 2);
        assert!(out.id_of("a").is_none());
        let new_c = out.id_of("c").unwrap();
        let new_b = out.id_of("b").unwrap();
        assert_eq!(out.deps(new_c), &[new_b]);
        let _ = a;
    }
}
