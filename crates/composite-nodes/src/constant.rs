//! Constant Node
//!
//! Emits a value fixed in the node config, ignoring its inputs.

use async_trait::async_trait;
use composite_engine::{LeafInfo, LeafNode, PortValues, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{parse_config, FromConfig};

/// Configuration for the constant node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantConfig {
    /// Value emitted on every run
    #[serde(default)]
    pub value: Value,
}

/// Constant Node
///
/// # Outputs
/// - `output` - The configured value (`null` when unset)
#[derive(Debug, Clone)]
pub struct ConstantNode {
    config: ConstantConfig,
}

impl ConstantNode {
    /// Port ID for value output
    pub const PORT_OUTPUT: &'static str = "output";

    pub fn new(value: Value) -> Self {
        Self {
            config: ConstantConfig { value },
        }
    }

    pub fn value(&self) -> &Value {
        &self.config.value
    }
}

impl FromConfig for ConstantNode {
    const NODE_TYPE: &'static str = "constant";

    fn info() -> LeafInfo {
        LeafInfo::new(Self::NODE_TYPE)
            .with_label("Constant")
            .with_description("Emits a configured value")
    }

    fn from_config(config: &Value) -> Result<Self> {
        Ok(Self {
            config: parse_config(Self::NODE_TYPE, config)?,
        })
    }
}

#[async_trait]
impl LeafNode for ConstantNode {
    async fn execute(&self, node_id: &str, _inputs: PortValues, _config: &Value) -> Result<PortValues> {
        log::debug!("ConstantNode {}: emitting configured value", node_id);

        let mut outputs = PortValues::new();
        outputs.insert(Self::PORT_OUTPUT.to_string(), self.config.value.clone());
        Ok(outputs)
    }
}
