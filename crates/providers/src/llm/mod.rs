//! Large-language-model adapters
//!
//! Contract: `generate(messages, tools)` returns assistant content and/or
//! tool calls. Adapters translate the neutral history into the vendor's
//! native shape; translation is implemented as pure functions so request
//! shaping is testable without network.

mod anthropic;
mod openai;

pub use anthropic::AnthropicLlm;
pub use openai::OpenAiLlm;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use voice_engine_core::{ChatMessage, ToolCall, ToolDefinition};

use crate::ProviderError;

/// Token accounting reported by the vendor, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One generation result.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM provider boundary.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate the next assistant turn for the given history.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, ProviderError>;

    /// Provider name for logging and cost attribution.
    fn provider(&self) -> &'static str;
}

impl std::fmt::Debug for dyn LanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageModel")
            .field("provider", &self.provider())
            .finish()
    }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, ProviderError> {
        self.as_ref().generate(messages, tools).await
    }

    fn provider(&self) -> &'static str {
        self.as_ref().provider()
    }
}
