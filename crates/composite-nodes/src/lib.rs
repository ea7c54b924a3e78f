//! Composite Nodes
//!
//! Reference leaf node implementations for the composite engine. Each node
//! is an atomic building block that a composite graph can reference by type.
//!
//! # Nodes
//!
//! - `passthrough`: Forwards every input port unchanged
//! - `constant`: Emits a configured value
//! - `json-filter`: Extracts a value from JSON with a path expression
//! - `merge`: Joins several inputs into one string
//!
//! Every node reads `input` and writes `output` so that document edges
//! without explicit handles connect them.

pub mod constant;
pub mod json_filter;
pub mod merge;
pub mod passthrough;

pub use constant::{ConstantConfig, ConstantNode};
pub use json_filter::{JsonFilterConfig, JsonFilterNode};
pub use merge::{MergeConfig, MergeNode};
pub use passthrough::PassthroughNode;

use std::sync::Arc;

use composite_engine::{EngineError, LeafInfo, LeafNode, LeafNodeFactory, NodeRegistry, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Register every built-in node type
pub fn register_builtins(registry: &mut NodeRegistry) {
    register::<PassthroughNode>(registry);
    register::<ConstantNode>(registry);
    register::<JsonFilterNode>(registry);
    register::<MergeNode>(registry);
}

fn register<T: FromConfig>(registry: &mut NodeRegistry) {
    registry.register(T::info(), Arc::new(ConfigFactory::<T>::new()));
}

/// A registry holding only the built-in nodes
pub fn builtin_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_builtins(&mut registry);
    registry
}

/// A leaf that is built from its node config
pub trait FromConfig: LeafNode + Sized + 'static {
    const NODE_TYPE: &'static str;

    /// Palette entry for this node type
    fn info() -> LeafInfo;

    fn from_config(config: &Value) -> Result<Self>;
}

/// Factory for any [`FromConfig`] node
struct ConfigFactory<T> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> ConfigFactory<T> {
    fn new() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: FromConfig> LeafNodeFactory for ConfigFactory<T> {
    fn create(&self, config: &Value) -> Result<Arc<dyn LeafNode>> {
        Ok(Arc::new(T::from_config(config)?))
    }
}

/// Deserialize a node config, treating `null` as the default
pub(crate) fn parse_config<T: DeserializeOwned + Default>(
    node_type: &str,
    config: &Value,
) -> Result<T> {
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| {
        EngineError::InvalidConfig(format!("Invalid config for '{}': {}", node_type, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use composite_engine::{
        Composite, CompositeBuilder, DocumentOptions, PortValues, TypeResolver,
    };
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = builtin_registry();
        assert_eq!(
            registry.known_types(),
            vec!["constant", "json-filter", "merge", "passthrough"]
        );
        assert_eq!(registry.info("json-filter").unwrap().label, "JSON Filter");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let registry = builtin_registry();
        let factory = registry.resolve("merge").unwrap();
        let err = factory.create(&json!({"separator": 5})).err().unwrap();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[tokio::test]
    async fn test_builtins_in_a_composite() {
        let graph = CompositeBuilder::new("pipeline", "Pipeline")
            .add_node("greeting", "constant", (0.0, 0.0))
            .with_config(json!({"value": {"text": "hello"}}))
            .add_node("name", "constant", (0.0, 100.0))
            .with_config(json!({"value": {"text": "world"}}))
            .add_node("pick-a", "json-filter", (200.0, 0.0))
            .with_config(json!({"path": "text"}))
            .add_node("pick-b", "json-filter", (200.0, 100.0))
            .with_config(json!({"path": "text"}))
            .add_node("join", "merge", (400.0, 50.0))
            .with_config(json!({"separator": ", "}))
            .add_node("out", "passthrough", (600.0, 50.0))
            .connect("e1", "greeting", "pick-a")
            .connect("e2", "name", "pick-b")
            .connect("e3", "pick-a", "join")
            .connect("e4", "pick-b", "join")
            .connect("e5", "join", "out")
            .add_edge("join", "count", "out", "count")
            .build();

        let composite = Composite::from_definition(graph, Arc::new(builtin_registry())).unwrap();
        let outcome = composite.execute(PortValues::new()).await;

        assert!(outcome.is_success(), "{:?}", outcome.failure);
        assert_eq!(outcome.outputs["output"], "hello, world");
        assert_eq!(outcome.outputs["count"], 2);
    }

    #[test]
    fn test_strict_document_with_unknown_type() {
        let text = r#"{
            "id": "doc",
            "name": "Doc",
            "category": "test",
            "type": "composite",
            "version": "1.0.0",
            "metadata": {"created": "2024-01-01T00:00:00Z", "modified": "2024-01-01T00:00:00Z"},
            "nodes": [{"id": "a", "type": "Passthrough", "position": {"x": 0, "y": 0}}],
            "edges": []
        }"#;
        let registry = builtin_registry();
        let context = composite_engine::SemanticContext::from_resolver(&registry, true);
        let err = composite_engine::from_document(text, &DocumentOptions::default().with_context(context))
            .unwrap_err();
        let report = err.report().unwrap();
        assert!(report.errors[0].message.contains("Did you mean 'passthrough'?"));
    }
}
