//! Anthropic messages adapter
//!
//! Differences from the neutral shape: the system prompt is hoisted out of
//! the message list into the top-level `system` field; tool results travel
//! as `tool_result` content blocks on a `user` turn; assistant tool calls
//! are `tool_use` content blocks; tool schemas use `input_schema`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use voice_engine_core::{ChatMessage, ChatRole, ModelConfig, ToolCall, ToolDefinition};

use crate::{LanguageModel, LlmResponse, ProviderError, TokenUsage};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AnthropicLlm {
    api_key: String,
    config: ModelConfig,
    client: reqwest::Client,
}

impl AnthropicLlm {
    pub fn new(api_key: String, config: ModelConfig) -> Self {
        Self {
            api_key,
            config,
            client: reqwest::Client::new(),
        }
    }
}

/// Build the messages-API request body.
pub(crate) fn build_request(
    config: &ModelConfig,
    messages: &[ChatMessage],
    tools: &[ToolDefinition],
) -> Value {
    let mut system = String::new();
    let mut wire_messages: Vec<Value> = Vec::new();

    for m in messages {
        match m.role {
            ChatRole::System => {
                // Hoisted; multiple system entries concatenate.
                if !system.is_empty() {
                    system.push('\n');
                }
                system.push_str(&m.content);
            }
            ChatRole::User => {
                wire_messages.push(json!({ "role": "user", "content": m.content }));
            }
            ChatRole::Assistant => {
                let mut blocks: Vec<Value> = Vec::new();
                if !m.content.is_empty() {
                    blocks.push(json!({ "type": "text", "text": m.content }));
                }
                for tc in &m.tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.arguments,
                    }));
                }
                wire_messages.push(json!({ "role": "assistant", "content": blocks }));
            }
            ChatRole::Tool => {
                // The vendor has no tool role; the result rides a user turn.
                wire_messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id,
                        "content": m.content,
                    }],
                }));
            }
        }
    }

    let mut body = json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "messages": wire_messages,
    });

    if !system.is_empty() {
        body["system"] = Value::String(system);
    }

    if !tools.is_empty() {
        body["tools"] = tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();
    }

    body
}

/// Parse a messages-API response into the neutral result.
pub(crate) fn parse_response(json: &Value) -> Result<LlmResponse, ProviderError> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("missing content blocks".into()))?;

    let mut content = String::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                content.push_str(block.get("text").and_then(|t| t.as_str()).unwrap_or(""));
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block
                        .get("id")
                        .and_then(|i| i.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    name: block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    arguments: block.get("input").cloned().unwrap_or_else(|| json!({})),
                });
            }
            _ => {}
        }
    }

    let usage = json.get("usage").map(|u| TokenUsage {
        prompt_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
    });

    Ok(LlmResponse {
        content,
        tool_calls,
        usage,
    })
}

#[async_trait]
impl LanguageModel for AnthropicLlm {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, ProviderError> {
        let body = build_request(&self.config, messages, tools);

        let res = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let json: Value = res.json().await?;
        parse_response(&json)
    }

    fn provider(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig {
            provider: "anthropic".into(),
            model: "claude-3-5-haiku-latest".into(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    #[test]
    fn system_prompt_is_hoisted() {
        let messages = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("hello"),
        ];
        let body = build_request(&config(), &messages, &[]);
        assert_eq!(body["system"], "Be brief.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn tool_result_coerced_to_user_turn() {
        let messages = vec![ChatMessage::tool_result("toolu_1", "{\"ok\":true}")];
        let body = build_request(&config(), &messages, &[]);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][0]["type"], "tool_result");
        assert_eq!(body["messages"][0]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn tool_schema_uses_input_schema() {
        let tools = vec![ToolDefinition {
            name: "transferCall".into(),
            description: "Transfer".into(),
            parameters: json!({"type":"object","properties":{"destination":{"type":"string"}},"required":["destination"]}),
        }];
        let body = build_request(&config(), &[ChatMessage::user("hi")], &tools);
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert!(body["tools"][0].get("parameters").is_none());
    }

    #[test]
    fn assistant_tool_use_round_trips() {
        let messages = vec![ChatMessage::assistant_with_tools(
            "One moment.",
            vec![ToolCall {
                id: "toolu_2".into(),
                name: "endCall".into(),
                arguments: json!({"reason": "done"}),
            }],
        )];
        let body = build_request(&config(), &messages, &[]);
        let blocks = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(blocks[0]["type"], "text");
        assert_eq!(blocks[1]["type"], "tool_use");
        assert_eq!(blocks[1]["input"]["reason"], "done");
    }

    #[test]
    fn parse_text_and_tool_use_blocks() {
        let response = json!({
            "content": [
                { "type": "text", "text": "Transferring you now." },
                { "type": "tool_use", "id": "toolu_3", "name": "transferCall",
                  "input": { "destination": "+15551234" } }
            ],
            "usage": { "input_tokens": 10, "output_tokens": 5 }
        });
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.content, "Transferring you now.");
        assert_eq!(parsed.tool_calls[0].arguments["destination"], "+15551234");
        assert_eq!(parsed.usage.unwrap().completion_tokens, 5);
    }
}
