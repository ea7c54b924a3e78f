//! JSON Filter Node
//!
//! Extracts values from JSON data using path expressions.
//! Supports simple dot notation and array indexing.

use async_trait::async_trait;
use composite_engine::{EngineError, LeafInfo, LeafNode, PortValues, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{parse_config, FromConfig};

/// Configuration for the JSON filter node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonFilterConfig {
    /// JSON path expression (e.g., "data.items[0].name" or "[0].arguments.content")
    #[serde(default)]
    pub path: String,
    /// Default value if path doesn't exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

/// JSON Filter Node
///
/// Extracts a value from JSON input using a path expression.
/// The path supports dot notation for object access and bracket
/// notation for array indexing.
///
/// # Path Syntax Examples
/// - `"name"` - Get the "name" field
/// - `"data.items"` - Get nested field
/// - `"[0]"` - Get first array element
/// - `"items[0].name"` - Combined access
///
/// # Inputs
/// - `input` (required) - JSON data to filter
///
/// # Outputs
/// - `output` - Extracted value, or the configured default
/// - `found` - Whether the path was found
#[derive(Debug, Clone)]
pub struct JsonFilterNode {
    config: JsonFilterConfig,
}

impl JsonFilterNode {
    /// Port ID for json input
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID for value output
    pub const PORT_OUTPUT: &'static str = "output";
    /// Port ID for found output
    pub const PORT_FOUND: &'static str = "found";

    pub fn new(config: JsonFilterConfig) -> Self {
        Self { config }
    }

    /// Extract a value from JSON using a path expression.
    pub fn extract_path(json: &Value, path: &str) -> Option<Value> {
        if path.is_empty() {
            return Some(json.clone());
        }

        let mut current = json;
        let mut remaining = path;

        while !remaining.is_empty() {
            // Array index at start: [0]
            if let Some(rest) = remaining.strip_prefix('[') {
                let end = rest.find(']')?;
                let index = rest[..end].parse::<usize>().ok()?;
                current = current.get(index)?;
                remaining = &rest[end + 1..];
                remaining = remaining.strip_prefix('.').unwrap_or(remaining);
                continue;
            }

            // Object field up to the next '.' or '['
            let split = remaining.find(['.', '[']).unwrap_or(remaining.len());
            let (field, rest) = remaining.split_at(split);
            current = current.get(field)?;
            remaining = rest.strip_prefix('.').unwrap_or(rest);
        }

        Some(current.clone())
    }
}

impl FromConfig for JsonFilterNode {
    const NODE_TYPE: &'static str = "json-filter";

    fn info() -> LeafInfo {
        LeafInfo::new(Self::NODE_TYPE)
            .with_label("JSON Filter")
            .with_description("Extracts values from JSON using path expressions")
    }

    fn from_config(config: &Value) -> Result<Self> {
        Ok(Self::new(parse_config(Self::NODE_TYPE, config)?))
    }
}

#[async_trait]
impl LeafNode for JsonFilterNode {
    async fn execute(&self, node_id: &str, inputs: PortValues, _config: &Value) -> Result<PortValues> {
        let json = inputs.get(Self::PORT_INPUT).ok_or_else(|| {
            EngineError::failed(format!(
                "JsonFilterNode {}: missing required input '{}'",
                node_id,
                Self::PORT_INPUT
            ))
        })?;

        log::debug!(
            "JsonFilterNode {}: extracting path '{}' from JSON",
            node_id,
            self.config.path
        );

        let (value, found) = match Self::extract_path(json, &self.config.path) {
            Some(v) => (v, true),
            None => (self.config.default_value.clone().unwrap_or(Value::Null), false),
        };

        let mut outputs = PortValues::new();
        outputs.insert(Self::PORT_OUTPUT.to_string(), value);
        outputs.insert(Self::PORT_FOUND.to_string(), Value::Bool(found));
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter(path: &str, default_value: Option<Value>) -> JsonFilterNode {
        JsonFilterNode::new(JsonFilterConfig {
            path: path.to_string(),
            default_value,
        })
    }

    fn input(value: Value) -> PortValues {
        let mut inputs = PortValues::new();
        inputs.insert("input".into(), value);
        inputs
    }

    #[test]
    fn test_extract_simple_field() {
        let json = json!({"name": "test", "value": 42});
        assert_eq!(JsonFilterNode::extract_path(&json, "name"), Some(json!("test")));
    }

    #[test]
    fn test_extract_nested_field() {
        let json = json!({"data": {"items": [1, 2, 3], "name": "nested"}});
        assert_eq!(JsonFilterNode::extract_path(&json, "data.name"), Some(json!("nested")));
    }

    #[test]
    fn test_extract_array_then_field() {
        let json = json!([{"name": "first"}, {"name": "second"}]);
        assert_eq!(JsonFilterNode::extract_path(&json, "[1].name"), Some(json!("second")));
    }

    #[test]
    fn test_extract_field_then_array() {
        let json = json!({"items": [10, 20, 30]});
        assert_eq!(JsonFilterNode::extract_path(&json, "items[2]"), Some(json!(30)));
    }

    #[test]
    fn test_extract_complex_path() {
        let json = json!({
            "response": {
                "choices": [
                    {"message": {"tool_calls": [{"id": "call_1", "arguments": {"content": "hello"}}]}}
                ]
            }
        });
        let result = JsonFilterNode::extract_path(
            &json,
            "response.choices[0].message.tool_calls[0].arguments.content",
        );
        assert_eq!(result, Some(json!("hello")));
    }

    #[test]
    fn test_extract_misses() {
        let json = json!({"name": "test", "list": [1]});
        assert_eq!(JsonFilterNode::extract_path(&json, "missing"), None);
        assert_eq!(JsonFilterNode::extract_path(&json, "list[10]"), None);
        assert_eq!(JsonFilterNode::extract_path(&json, "list[x]"), None);
        assert_eq!(JsonFilterNode::extract_path(&json, "list[0"), None);
    }

    #[test]
    fn test_extract_empty_path() {
        let json = json!({"name": "test"});
        assert_eq!(JsonFilterNode::extract_path(&json, ""), Some(json.clone()));
    }

    #[test]
    fn test_config_uses_camel_case() {
        let node = JsonFilterNode::from_config(&json!({"path": "a", "defaultValue": 0})).unwrap();
        assert_eq!(node.config.default_value, Some(json!(0)));
    }

    #[tokio::test]
    async fn test_filter_execution() {
        let outputs = filter("data.value", None)
            .execute("f", input(json!({"data": {"value": 42}})), &Value::Null)
            .await
            .unwrap();
        assert_eq!(outputs["output"], 42);
        assert_eq!(outputs["found"], true);
    }

    #[tokio::test]
    async fn test_filter_with_default() {
        let outputs = filter("missing.path", Some(json!("default_value")))
            .execute("f", input(json!({"other": "data"})), &Value::Null)
            .await
            .unwrap();
        assert_eq!(outputs["output"], "default_value");
        assert_eq!(outputs["found"], false);
    }

    #[tokio::test]
    async fn test_missing_input_error() {
        let result = filter("a", None)
            .execute("f", PortValues::new(), &Value::Null)
            .await;
        assert!(result.is_err());
    }
}
