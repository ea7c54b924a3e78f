//! Passthrough Node
//!
//! Forwards its inputs unchanged. Useful as an explicit output boundary or
//! to rename the default `input` port to `output`.

use async_trait::async_trait;
use composite_engine::{LeafInfo, LeafNode, PortValues, Result};
use serde_json::Value;

use crate::FromConfig;

/// Passthrough Node
///
/// # Inputs
/// - `input` - Emitted on `output`
/// - any other port - Emitted under the same name
///
/// # Outputs
/// - `output` - The value that arrived on `input`, if any
#[derive(Debug, Clone, Default)]
pub struct PassthroughNode;

impl PassthroughNode {
    /// Port ID for the primary input
    pub const PORT_INPUT: &'static str = "input";
    /// Port ID for the primary output
    pub const PORT_OUTPUT: &'static str = "output";
}

impl FromConfig for PassthroughNode {
    const NODE_TYPE: &'static str = "passthrough";

    fn info() -> LeafInfo {
        LeafInfo::new(Self::NODE_TYPE)
            .with_label("Passthrough")
            .with_description("Forwards inputs unchanged")
    }

    fn from_config(_config: &Value) -> Result<Self> {
        Ok(Self)
    }
}

#[async_trait]
impl LeafNode for PassthroughNode {
    async fn execute(&self, node_id: &str, inputs: PortValues, _config: &Value) -> Result<PortValues> {
        log::debug!("PassthroughNode {}: forwarding {} port(s)", node_id, inputs.len());

        Ok(inputs
            .into_iter()
            .map(|(port, value)| {
                if port == Self::PORT_INPUT {
                    (Self::PORT_OUTPUT.to_string(), value)
                } else {
                    (port, value)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_renames_input_port() {
        let mut inputs = PortValues::new();
        inputs.insert("input".into(), json!("hello"));
        inputs.insert("extra".into(), json!(1));

        let outputs = PassthroughNode.execute("p", inputs, &Value::Null).await.unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs["output"], "hello");
        assert_eq!(outputs["extra"], 1);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let outputs = PassthroughNode
            .execute("p", PortValues::new(), &Value::Null)
            .await
            .unwrap();
        assert!(outputs.is_empty());
    }
}
