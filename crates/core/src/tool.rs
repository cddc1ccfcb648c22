//! Tool configuration
//!
//! Tools are configured on the assistant and projected into JSON-schema
//! descriptors for the LLM. Function schemas are opaque JSON blobs passed
//! through to vendors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transfer hand-off style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
    Blind,
    WarmSummary,
    WarmMessage,
}

impl Default for TransferMode {
    fn default() -> Self {
        TransferMode::Blind
    }
}

/// Tool variants an assistant may carry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ToolKind {
    /// User-defined HTTP function: schema is forwarded verbatim.
    Function {
        /// JSON-schema for the arguments object.
        parameters: Value,
        server_url: String,
    },
    /// Transfer the call leg to another destination.
    Transfer {
        destinations: Vec<String>,
        #[serde(default)]
        mode: TransferMode,
    },
    /// Knowledge-base retrieval.
    Query { knowledge_base_id: String },
    /// Send DTMF digits on the carrier leg.
    Dtmf,
    /// Let the assistant hang up.
    EndCall,
}

/// One configured tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub kind: ToolKind,
}

/// JSON-schema descriptor handed to LLM adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema of the arguments object, passed through to the vendor.
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_config_round_trips_tagged_kind() {
        let cfg = ToolConfig {
            id: "t1".into(),
            name: "lookupOrder".into(),
            description: "Look up an order".into(),
            kind: ToolKind::Function {
                parameters: json!({"type": "object", "properties": {"orderId": {"type": "string"}}}),
                server_url: "https://example.com/tools".into(),
            },
        };
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["kind"], "function");
        let back: ToolConfig = serde_json::from_value(json).unwrap();
        assert!(matches!(back.kind, ToolKind::Function { .. }));
    }
}
