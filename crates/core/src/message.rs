//! Conversation messages
//!
//! `ChatMessage` is the in-memory history entry handed to LLM adapters;
//! `CallMessage` is the append-only persisted form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Vendor-provided call id; echoed back in the tool-result message.
    pub id: String,
    pub name: String,
    /// Parsed arguments object.
    pub arguments: Value,
}

/// One entry of the live message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Set on `Tool` entries: the id of the call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Set on `Assistant` entries that requested tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: Vec::new(),
        }
    }
}

/// Per-turn pipeline latencies in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLatency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_ms: Option<u64>,
}

/// Persisted, append-only conversation entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallMessage {
    pub id: String,
    pub call_id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    /// Milliseconds since call start.
    pub timestamp_ms: u64,
    #[serde(default)]
    pub latency: TurnLatency,
}

impl CallMessage {
    pub fn new(
        call_id: impl Into<String>,
        role: ChatRole,
        content: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            call_id: call_id.into(),
            role,
            content: content.into(),
            tool_name: None,
            tool_arguments: None,
            tool_result: None,
            timestamp_ms,
            latency: TurnLatency::default(),
        }
    }

    pub fn with_latency(mut self, latency: TurnLatency) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        arguments: Option<Value>,
        result: Option<Value>,
    ) -> Self {
        self.tool_name = Some(name.into());
        self.tool_arguments = arguments;
        self.tool_result = result;
        self
    }
}
