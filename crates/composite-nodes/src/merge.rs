//! Merge Node
//!
//! Combines multiple inputs into a single string output.
//! Useful for aggregating results from parallel branches, since several
//! edges into the same port arrive as an array.

use async_trait::async_trait;
use composite_engine::{LeafInfo, LeafNode, PortValues, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{parse_config, FromConfig};

/// Configuration for the merge node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MergeConfig {
    /// Separator to use when joining inputs
    pub separator: String,
    /// Whether to filter out empty inputs
    pub filter_empty: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            filter_empty: true,
        }
    }
}

/// Merge Node
///
/// Strings are joined as-is; other values use their JSON text.
///
/// # Inputs
/// - `input` - A single value or an array of values
///
/// # Outputs
/// - `output` - Combined string
/// - `count` - Number of inputs merged
#[derive(Debug, Clone, Default)]
pub struct MergeNode {
    config: MergeConfig,
}

impl MergeNode {
    /// Port ID for inputs (accepts multiple connections)
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID for merged output
    pub const PORT_OUTPUT: &'static str = "output";
    /// Port ID for count output
    pub const PORT_COUNT: &'static str = "count";

    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    fn text_of(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl FromConfig for MergeNode {
    const NODE_TYPE: &'static str = "merge";

    fn info() -> LeafInfo {
        LeafInfo::new(Self::NODE_TYPE)
            .with_label("Merge")
            .with_description("Combines multiple inputs into one string")
    }

    fn from_config(config: &Value) -> Result<Self> {
        Ok(Self::new(parse_config(Self::NODE_TYPE, config)?))
    }
}

#[async_trait]
impl LeafNode for MergeNode {
    async fn execute(&self, node_id: &str, inputs: PortValues, _config: &Value) -> Result<PortValues> {
        let inputs: Vec<String> = match inputs.get(Self::PORT_INPUT) {
            Some(Value::Array(items)) => items.iter().map(Self::text_of).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![Self::text_of(single)],
        };

        log::debug!("MergeNode {}: merging {} inputs", node_id, inputs.len());

        let filtered: Vec<&str> = inputs
            .iter()
            .map(String::as_str)
            .filter(|s| !self.config.filter_empty || !s.trim().is_empty())
            .collect();

        let merged = filtered.join(&self.config.separator);
        let count = filtered.len();

        let mut outputs = PortValues::new();
        outputs.insert(Self::PORT_OUTPUT.to_string(), Value::String(merged));
        outputs.insert(Self::PORT_COUNT.to_string(), Value::from(count));
        Ok(outputs)
    }
}
