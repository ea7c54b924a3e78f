//! Leaf type registry
//!
//! Maps node type strings to factories producing executable leaf nodes. The
//! same resolver is handed to semantic validation (is this type known?) and
//! to execution (give me an instance for this type and config), so the core
//! never hard-codes any leaf implementation.
//!
//! # Usage
//!
//! ```ignore
//! use composite_engine::NodeRegistry;
//!
//! let mut registry = NodeRegistry::new();
//! registry.register_callback("echo", |_node_id, inputs, _config| async move { Ok(inputs) });
//! let composite = Composite::from_definition(graph, Arc::new(registry))?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::PortValues;

/// An executable leaf node
///
/// Receives the values arriving on its input ports plus its verbatim config,
/// and returns values keyed by output port.
#[async_trait]
pub trait LeafNode: Send + Sync {
    async fn execute(&self, node_id: &str, inputs: PortValues, config: &Value)
        -> Result<PortValues>;
}

/// Produces leaf instances for one node type
pub trait LeafNodeFactory: Send + Sync {
    fn create(&self, config: &Value) -> Result<Arc<dyn LeafNode>>;
}

/// Name to capability lookup
pub trait TypeResolver: Send + Sync {
    /// Factory for `node_type`, or `None` if unknown
    fn resolve(&self, node_type: &str) -> Option<Arc<dyn LeafNodeFactory>>;

    /// Every type this resolver can produce
    fn known_types(&self) -> Vec<String>;

    fn is_known(&self, node_type: &str) -> bool {
        self.resolve(node_type).is_some()
    }
}

/// Palette information for a registered type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafInfo {
    pub node_type: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl LeafInfo {
    pub fn new(node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            label: node_type.clone(),
            node_type,
            description: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

struct RegistryEntry {
    info: LeafInfo,
    factory: Arc<dyn LeafNodeFactory>,
}

/// Default [`TypeResolver`] backed by a map of factories
///
/// Registries compose by merging:
/// ```ignore
/// let mut registry = NodeRegistry::new();
/// composite_nodes::register_builtins(&mut registry);
/// registry.merge(host_registry);
/// ```
pub struct NodeRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a node type with palette info and a factory
    pub fn register(&mut self, info: LeafInfo, factory: Arc<dyn LeafNodeFactory>) {
        log::debug!("Registering leaf type '{}'", info.node_type);
        self.entries
            .insert(info.node_type.clone(), RegistryEntry { info, factory });
    }

    /// Register one shared instance for every node of `node_type`
    pub fn register_node(&mut self, node_type: impl Into<String>, node: Arc<dyn LeafNode>) {
        self.register(
            LeafInfo::new(node_type),
            Arc::new(SharedNodeFactory { node }),
        );
    }

    /// Register a node type backed by an async closure
    ///
    /// The callback receives (node_id, inputs, config) and returns outputs.
    pub fn register_callback<F, Fut>(&mut self, node_type: impl Into<String>, callback: F)
    where
        F: Fn(String, PortValues, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PortValues>> + Send + 'static,
    {
        let node = CallbackNode {
            callback: Box::new(move |node_id, inputs, config| {
                Box::pin(callback(node_id, inputs, config))
            }),
        };
        self.register_node(node_type, Arc::new(node));
    }

    /// Register a node type backed by a synchronous closure
    pub fn register_sync(
        &mut self,
        node_type: impl Into<String>,
        callback: impl Fn(&str, PortValues, &Value) -> Result<PortValues> + Send + Sync + 'static,
    ) {
        self.register_node(node_type, Arc::new(SyncCallbackNode::new(callback)));
    }

    /// Palette info for a node type
    pub fn info(&self, node_type: &str) -> Option<&LeafInfo> {
        self.entries.get(node_type).map(|e| &e.info)
    }

    /// All palette info, sorted by type
    pub fn all_info(&self) -> Vec<&LeafInfo> {
        let mut infos: Vec<&LeafInfo> = self.entries.values().map(|e| &e.info).collect();
        infos.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        infos
    }

    /// Check if a node type is registered
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.entries.contains_key(node_type)
    }

    /// List all registered node type strings
    pub fn node_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` that share a type.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeResolver for NodeRegistry {
    fn resolve(&self, node_type: &str) -> Option<Arc<dyn LeafNodeFactory>> {
        self.entries.get(node_type).map(|e| e.factory.clone())
    }

    fn known_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.entries.keys().cloned().collect();
        types.sort();
        types
    }

    fn is_known(&self, node_type: &str) -> bool {
        self.has_node_type(node_type)
    }
}

type BoxedCallback = Box<
    dyn Fn(String, PortValues, Value) -> Pin<Box<dyn Future<Output = Result<PortValues>> + Send>>
        + Send
        + Sync,
>;

/// Async closure wrapped as a [`LeafNode`]
pub struct CallbackNode {
    callback: BoxedCallback,
}

#[async_trait]
impl LeafNode for CallbackNode {
    async fn execute(
        &self,
        node_id: &str,
        inputs: PortValues,
        config: &Value,
    ) -> Result<PortValues> {
        (self.callback)(node_id.to_string(), inputs, config.clone()).await
    }
}

/// Synchronous closure wrapped as a [`LeafNode`]
pub struct SyncCallbackNode {
    callback: Box<dyn Fn(&str, PortValues, &Value) -> Result<PortValues> + Send + Sync>,
}

impl SyncCallbackNode {
    pub fn new(
        callback: impl Fn(&str, PortValues, &Value) -> Result<PortValues> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl LeafNode for SyncCallbackNode {
    async fn execute(
        &self,
        node_id: &str,
        inputs: PortValues,
        config: &Value,
    ) -> Result<PortValues> {
        (self.callback)(node_id, inputs, config)
    }
}

/// Factory that hands out one shared instance
struct SharedNodeFactory {
    node: Arc<dyn LeafNode>,
}

impl LeafNodeFactory for SharedNodeFactory {
    fn create(&self, _config: &Value) -> Result<Arc<dyn LeafNode>> {
        Ok(self.node.clone())
    }
}
