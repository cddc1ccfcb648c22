//! OpenAI chat-completions adapter
//!
//! The neutral history maps almost one-to-one: tool results become `tool`
//! role messages carrying `tool_call_id`, tool schemas ride under
//! `{type:"function", function:{...}}`.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use voice_engine_core::{ChatMessage, ChatRole, ModelConfig, ToolCall, ToolDefinition};

use crate::{LanguageModel, LlmResponse, ProviderError, TokenUsage};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAiLlm {
    api_key: String,
    config: ModelConfig,
    client: reqwest::Client,
}

impl OpenAiLlm {
    pub fn new(api_key: String, config: ModelConfig) -> Self {
        Self {
            api_key,
            config,
            client: reqwest::Client::new(),
        }
    }
}

/// Build the chat-completions request body.
pub(crate) fn build_request(
    config: &ModelConfig,
    messages: &[ChatMessage],
    tools: &[ToolDefinition],
) -> Value {
    let wire_messages: Vec<Value> = messages
        .iter()
        .map(|m| match m.role {
            ChatRole::Tool => json!({
                "role": "tool",
                "tool_call_id": m.tool_call_id,
                "content": m.content,
            }),
            ChatRole::Assistant if !m.tool_calls.is_empty() => json!({
                "role": "assistant",
                "content": if m.content.is_empty() { Value::Null } else { Value::String(m.content.clone()) },
                "tool_calls": m.tool_calls.iter().map(|tc| json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    },
                })).collect::<Vec<_>>(),
            }),
            _ => json!({ "role": m.role.as_str(), "content": m.content }),
        })
        .collect();

    let mut body = json!({
        "model": config.model,
        "messages": wire_messages,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    });

    if !tools.is_empty() {
        body["tools"] = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect();
    }

    body
}

/// Parse a chat-completions response into the neutral result.
pub(crate) fn parse_response(json: &Value) -> Result<LlmResponse, ProviderError> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| ProviderError::InvalidResponse("missing choices[0].message".into()))?;

    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
        for call in calls {
            let id = call.get("id").and_then(|i| i.as_str()).unwrap_or_default();
            let function = call
                .get("function")
                .ok_or_else(|| ProviderError::InvalidResponse("tool call without function".into()))?;
            let name = function
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or_default();
            let raw_args = function
                .get("arguments")
                .and_then(|a| a.as_str())
                .unwrap_or("{}");
            let arguments: Value =
                serde_json::from_str(raw_args).unwrap_or_else(|_| json!({ "_raw": raw_args }));
            tool_calls.push(ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            });
        }
    }

    let usage = json.get("usage").map(|u| TokenUsage {
        prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
    });

    Ok(LlmResponse {
        content,
        tool_calls,
        usage,
    })
}

#[async_trait]
impl LanguageModel for OpenAiLlm {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, ProviderError> {
        let body = build_request(&self.config, messages, tools);

        let res = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
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
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            temperature: 0.7,
            max_tokens: 256,
        }
    }

    #[test]
    fn system_message_stays_in_list() {
        let messages = vec![
            ChatMessage::system("Be brief."),
            ChatMessage::user("hello"),
        ];
        let body = build_request(&config(), &messages, &[]);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tool_result_maps_to_tool_role() {
        let messages = vec![ChatMessage::tool_result("call_1", "{\"ok\":true}")];
        let body = build_request(&config(), &messages, &[]);
        assert_eq!(body["messages"][0]["role"], "tool");
        assert_eq!(body["messages"][0]["tool_call_id"], "call_1");
    }

    #[test]
    fn assistant_tool_calls_carry_stringified_arguments() {
        let messages = vec![ChatMessage::assistant_with_tools(
            "",
            vec![ToolCall {
                id: "call_7".into(),
                name: "transferCall".into(),
                arguments: json!({"destination": "+15551234"}),
            }],
        )];
        let body = build_request(&config(), &messages, &[]);
        let call = &body["messages"][0]["tool_calls"][0];
        assert_eq!(call["function"]["name"], "transferCall");
        assert!(call["function"]["arguments"].as_str().unwrap().contains("+15551234"));
        assert_eq!(body["messages"][0]["content"], Value::Null);
    }

    #[test]
    fn tools_projected_into_function_format() {
        let tools = vec![ToolDefinition {
            name: "endCall".into(),
            description: "Hang up".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let body = build_request(&config(), &[ChatMessage::user("hi")], &tools);
        assert_eq!(body["tools"][0]["function"]["name"], "endCall");
        assert_eq!(body["tools"][0]["type"], "function");
    }

    #[test]
    fn parse_content_and_usage() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "It is 3 pm." } }],
            "usage": { "prompt_tokens": 42, "completion_tokens": 7 }
        });
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.content, "It is 3 pm.");
        assert!(!parsed.has_tool_calls());
        assert_eq!(parsed.usage.unwrap().prompt_tokens, 42);
    }

    #[test]
    fn parse_tool_calls_with_json_arguments() {
        let response = json!({
            "choices": [{ "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": { "name": "pressDigits", "arguments": "{\"digits\":\"12#\"}" }
                }]
            }}]
        });
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.content, "");
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "pressDigits");
        assert_eq!(parsed.tool_calls[0].arguments["digits"], "12#");
    }

    #[test]
    fn unparseable_arguments_preserved_raw() {
        let response = json!({
            "choices": [{ "message": {
                "content": null,
                "tool_calls": [{
                    "id": "c",
                    "function": { "name": "f", "arguments": "not json" }
                }]
            }}]
        });
        let parsed = parse_response(&response).unwrap();
        assert_eq!(parsed.tool_calls[0].arguments["_raw"], "not json");
    }
}
