//! Tool executor
//!
//! Built-in tools resolve to control-action envelopes the orchestrator
//! interprets; function tools POST their arguments to the configured
//! server. A tool failure is a data result, never a session-fatal error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use voice_engine_core::{EngineError, ToolConfig, ToolDefinition, ToolKind};

use crate::schema::validate_function_schema;

/// Deadline for user-defined HTTP function tools.
pub const FUNCTION_TIMEOUT: Duration = Duration::from_secs(10);

const KNOWLEDGE_PREFIX: &str = "queryKnowledge_";

/// Knowledge-base retrieval is an external collaborator; sessions without
/// one fall back to a well-formed stub result.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn query(&self, knowledge_base_id: &str, query: &str) -> Result<Value, EngineError>;
}

/// Executes an assistant's tool set.
pub struct ToolExecutor {
    tools: Vec<ToolConfig>,
    retriever: Option<Arc<dyn KnowledgeRetriever>>,
    client: reqwest::Client,
}

impl ToolExecutor {
    /// Validate the tool set and build an executor.
    ///
    /// Function schemas are checked here so malformed definitions fail at
    /// configuration time, not mid-call.
    pub fn new(tools: Vec<ToolConfig>) -> Result<Self, EngineError> {
        for tool in &tools {
            if let ToolKind::Function { parameters, .. } = &tool.kind {
                validate_function_schema(&tool.name, parameters)?;
            }
        }
        Ok(Self {
            tools,
            retriever: None,
            client: reqwest::Client::new(),
        })
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn KnowledgeRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Project each configured tool into a JSON-schema descriptor, in
    /// configuration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| match &tool.kind {
                ToolKind::Function { parameters, .. } => ToolDefinition {
                    name: tool.name.clone(),
                    description: tool.description.clone(),
                    parameters: parameters.clone(),
                },
                ToolKind::Transfer { destinations, .. } => ToolDefinition {
                    name: "transferCall".to_string(),
                    description: format!(
                        "{} Destinations: {}",
                        tool.description,
                        destinations.join(", ")
                    ),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "destination": { "type": "string", "description": "Number or SIP URI to transfer to" },
                            "reason": { "type": "string" },
                        },
                        "required": ["destination"],
                    }),
                },
                ToolKind::EndCall => ToolDefinition {
                    name: "endCall".to_string(),
                    description: tool.description.clone(),
                    parameters: json!({
                        "type": "object",
                        "properties": { "reason": { "type": "string" } },
                    }),
                },
                ToolKind::Dtmf => ToolDefinition {
                    name: "pressDigits".to_string(),
                    description: tool.description.clone(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "digits": { "type": "string", "pattern": "[0-9*#]+" },
                        },
                        "required": ["digits"],
                    }),
                },
                ToolKind::Query { knowledge_base_id } => ToolDefinition {
                    name: format!("{KNOWLEDGE_PREFIX}{knowledge_base_id}"),
                    description: tool.description.clone(),
                    parameters: json!({
                        "type": "object",
                        "properties": { "query": { "type": "string" } },
                        "required": ["query"],
                    }),
                },
            })
            .collect()
    }

    /// Execute one tool invocation. Always returns a data result.
    pub async fn execute(&self, name: &str, arguments: Value) -> Value {
        match name {
            "endCall" => json!({
                "action": "end_call",
                "reason": arguments.get("reason").cloned().unwrap_or(Value::Null),
            }),
            "transferCall" => json!({
                "action": "transfer",
                "destination": arguments.get("destination").cloned().unwrap_or(Value::Null),
                "reason": arguments.get("reason").cloned().unwrap_or(Value::Null),
            }),
            "pressDigits" => json!({
                "action": "dtmf",
                "digits": arguments.get("digits").cloned().unwrap_or(Value::Null),
            }),
            _ if name.starts_with(KNOWLEDGE_PREFIX) => {
                let kb_id = &name[KNOWLEDGE_PREFIX.len()..];
                let query = arguments
                    .get("query")
                    .and_then(|q| q.as_str())
                    .unwrap_or("");
                self.query_knowledge(kb_id, query).await
            }
            _ => self.call_function(name, arguments).await,
        }
    }

    async fn query_knowledge(&self, kb_id: &str, query: &str) -> Value {
        match &self.retriever {
            Some(retriever) => match retriever.query(kb_id, query).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(kb_id, "knowledge query failed: {}", e);
                    json!({ "error": e.to_string() })
                }
            },
            None => json!({ "results": [], "query": query }),
        }
    }

    async fn call_function(&self, name: &str, arguments: Value) -> Value {
        let tool = self.tools.iter().find(|t| {
            t.name == name && matches!(t.kind, ToolKind::Function { .. })
        });

        let server_url = match tool {
            Some(ToolConfig {
                kind: ToolKind::Function { server_url, .. },
                ..
            }) => server_url.clone(),
            _ => {
                tracing::warn!(tool = name, "unknown tool requested by model");
                return json!({ "error": format!("unknown tool: {name}") });
            }
        };

        let envelope = json!({ "tool": name, "arguments": arguments });
        let result = self
            .client
            .post(&server_url)
            .json(&envelope)
            .timeout(FUNCTION_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(res) if res.status().is_success() => {
                res.json::<Value>().await.unwrap_or_else(|e| {
                    json!({ "error": format!("invalid tool response: {e}") })
                })
            }
            Ok(res) => {
                let status = res.status().as_u16();
                tracing::warn!(tool = name, status, "tool server returned error");
                json!({ "error": format!("tool server returned {status}") })
            }
            Err(e) => {
                tracing::warn!(tool = name, "tool call failed: {}", e);
                json!({ "error": e.to_string() })
            }
        }
    }
}
