//! Serde shapes of the flat document form
//!
//! Edges carry bare node-id strings plus optional `sourceHandle` /
//! `targetHandle`; nodes always carry a position and a config object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{
    CompositeGraph, Edge, Endpoint, Metadata, NodeSpec, PassThrough, Position, Settings, Variable,
    DEFAULT_SOURCE_PORT, DEFAULT_TARGET_PORT,
};

/// Canonical node keys, never treated as pass-through
pub const NODE_FIELDS: &[&str] = &["id", "type", "position", "config", "data"];

/// Editor-only node fields carried verbatim
pub const NODE_PASSTHROUGH: &[&str] = &[
    "width",
    "height",
    "parentId",
    "dragHandle",
    "style",
    "className",
    "extent",
    "hidden",
];

/// Canonical edge keys, never treated as pass-through
pub const EDGE_FIELDS: &[&str] = &["id", "source", "target", "sourceHandle", "targetHandle", "data"];

/// Editor-only edge display fields carried verbatim
pub const EDGE_PASSTHROUGH: &[&str] = &[
    "animated",
    "style",
    "label",
    "type",
    "className",
    "markerStart",
    "markerEnd",
    "hidden",
];

/// Top-level document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentGraph {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub metadata: Metadata,
    pub nodes: Vec<DocumentNode>,
    pub edges: Vec<DocumentEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Variable>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

/// A node as it appears in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: Position,
    #[serde(default = "empty_object")]
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extras: PassThrough,
}

/// An edge as it appears in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extras: PassThrough,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Copy pass-through entries, dropping anything that would shadow a canonical key
fn passthrough(extras: &PassThrough, reserved: &[&str]) -> PassThrough {
    extras
        .iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl DocumentNode {
    pub fn from_spec(node: &NodeSpec) -> Self {
        Self {
            id: node.id.clone(),
            node_type: node.node_type.clone(),
            position: node.position.unwrap_or_default(),
            config: if node.config.is_null() {
                empty_object()
            } else {
                node.config.clone()
            },
            data: node.data.clone(),
            extras: passthrough(&node.extras, NODE_FIELDS),
        }
    }

    pub fn into_spec(self) -> NodeSpec {
        NodeSpec {
            id: self.id,
            node_type: self.node_type,
            position: Some(self.position),
            config: self.config,
            data: self.data,
            extras: self.extras,
        }
    }
}

impl DocumentEdge {
    pub fn from_edge(edge: &Edge) -> Self {
        Self {
            id: edge.id.clone(),
            source: edge.source.node_id.clone(),
            target: edge.target.node_id.clone(),
            source_handle: Some(edge.source.port_id.clone()),
            target_handle: Some(edge.target.port_id.clone()),
            data: edge.data.clone(),
            extras: passthrough(&edge.extras, EDGE_FIELDS),
        }
    }

    pub fn into_edge(self) -> Edge {
        let source_port = self
            .source_handle
            .unwrap_or_else(|| DEFAULT_SOURCE_PORT.to_string());
        let target_port = self
            .target_handle
            .unwrap_or_else(|| DEFAULT_TARGET_PORT.to_string());
        Edge {
            id: self.id,
            source: Endpoint::new(self.source, source_port),
            target: Endpoint::new(self.target, target_port),
            data: self.data,
            extras: self.extras,
        }
    }
}

impl DocumentGraph {
    /// Map the runtime form to the document form without touching the input
    pub fn from_graph(graph: &CompositeGraph) -> Self {
        Self {
            id: graph.id.clone(),
            name: graph.name.clone(),
            category: graph.category.clone(),
            kind: graph.kind.clone(),
            version: graph.version.clone(),
            description: graph.description.clone(),
            metadata: graph.metadata.clone(),
            nodes: graph.nodes.iter().map(DocumentNode::from_spec).collect(),
            edges: graph.edges.iter().map(DocumentEdge::from_edge).collect(),
            variables: graph.variables.clone(),
            settings: graph.settings.clone(),
        }
    }

    pub fn into_graph(self) -> CompositeGraph {
        CompositeGraph {
            id: self.id,
            name: self.name,
            category: self.category,
            kind: self.kind,
            version: self.version,
            description: self.description,
            metadata: self.metadata,
            nodes: self.nodes.into_iter().map(DocumentNode::into_spec).collect(),
            edges: self.edges.into_iter().map(DocumentEdge::into_edge).collect(),
            variables: self.variables,
            settings: self.settings,
        }
    }
}
