//! Serialization of an evaluated graph for external visualization.
use crate::store::{Graph, NodeId, NodeKind};
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;

/// The node/edge shape consumed by graph visualizers.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub label: String,
    pub metadata: NodeViewMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Constant,
    Input,
    Formula,
    Range,
    RangeItem,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NodeViewMetadata {
    /// A constant's fixed value, or any node's computed result when a
    /// results map was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    #[serde(rename = "rangeParentId", skip_serializing_if = "Option::is_none")]
    pub range_parent_id: Option<String>,
}

/// Edges point from dependency to dependent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeView {
    pub source: String,
    pub target: String,
}

/// Flattens an evaluated graph into nodes and edges for display.
pub fn serialize_for_display(
    graph: &Graph,
    results: Option<&BTreeMap<String, Value>>,
) -> GraphView {
    let nodes = graph.ids().map(|id| node_view(graph, results, id)).collect();

    let mut edges = Vec::new();
    for id in graph.ids() {
        for &dep in graph.deps(id) {
            edges.push(EdgeView {
                source: graph.name_of(dep).to_string(),
                target: graph.name_of(id).to_string(),
            });
        }
    }

    GraphView { nodes, edges }
}

fn node_view(graph: &Graph, results: Option<&BTreeMap<String, Value>>, id: NodeId) -> NodeView {
    let name = graph.name_of(id).to_string();
    let mut metadata = NodeViewMetadata {
        value: results.and_then(|r| r.get(&name)).cloned(),
        ..Default::default()
    };

    let node_type = match graph.kind(id) {
        NodeKind::Constant(v) => {
            metadata.value = Some(v.clone());
            NodeType::Constant
        }
        NodeKind::Input { key } => {
            metadata.key = Some(key.clone());
            NodeType::Input
        }
        // Surviving Params compute from context like any formula; the
        // display type set is closed.
        NodeKind::Param | NodeKind::Formula(_) => NodeType::Formula,
        NodeKind::Range { .. } => NodeType::Range,
        NodeKind::RangeItem {
            index,
            result,
            parent,
            ..
        } => {
            metadata.index = Some(*index);
            metadata.result = Some(*result);
            metadata.range_parent_id = Some(parent.clone());
            NodeType::RangeItem
        }
    };

    NodeView {
        id: name.clone(),
        node_type,
        label: name,
        metadata,
    }
}
