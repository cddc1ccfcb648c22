//! Assistant configuration
//!
//! Read-only input resolved by the control surface and handed to the engine
//! at session creation.

use serde::{Deserialize, Serialize};

use crate::tool::ToolConfig;

/// LLM selection and sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name, e.g. "openai" or "anthropic".
    pub provider: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    512
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// TTS selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Provider name, e.g. "openai", "elevenlabs", "cartesia".
    pub provider: String,
    pub voice_id: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            voice_id: "alloy".to_string(),
            speed: default_speed(),
        }
    }
}

/// STT selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Provider name, e.g. "openai" or "deepgram".
    pub provider: String,
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "whisper-1".to_string(),
            language: default_language(),
        }
    }
}

/// Who speaks first once the media channel opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirstMessageMode {
    AssistantSpeaksFirst,
    AssistantWaitsForUser,
}

impl Default for FirstMessageMode {
    fn default() -> Self {
        FirstMessageMode::AssistantSpeaksFirst
    }
}

/// Resolved assistant handed to the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    pub system_prompt: String,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub first_message_mode: FirstMessageMode,
    #[serde(default = "default_true")]
    pub interruption_enabled: bool,
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
    #[serde(default = "default_max_call_duration_secs")]
    pub max_call_duration_secs: u64,
    /// 0.0 = least sensitive endpointing, 1.0 = most sensitive.
    #[serde(default = "default_endpointing_sensitivity")]
    pub endpointing_sensitivity: f32,
    #[serde(default = "default_true")]
    pub end_call_enabled: bool,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

fn default_true() -> bool {
    true
}
fn default_silence_timeout_ms() -> u64 {
    800
}
fn default_max_call_duration_secs() -> u64 {
    1800
}
fn default_endpointing_sensitivity() -> f32 {
    0.5
}

impl Assistant {
    /// Minimal assistant for tests and dev seeding.
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: ModelConfig::default(),
            voice: VoiceConfig::default(),
            transcriber: TranscriberConfig::default(),
            system_prompt: "You are a helpful voice assistant.".to_string(),
            first_message: None,
            first_message_mode: FirstMessageMode::default(),
            interruption_enabled: true,
            silence_timeout_ms: default_silence_timeout_ms(),
            max_call_duration_secs: default_max_call_duration_secs(),
            endpointing_sensitivity: default_endpointing_sensitivity(),
            end_call_enabled: true,
            tools: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let json = r#"{
            "id": "a1",
            "name": "Receptionist",
            "system_prompt": "Be brief."
        }"#;
        let assistant: Assistant = serde_json::from_str(json).unwrap();
        assert!(assistant.interruption_enabled);
        assert_eq!(assistant.silence_timeout_ms, 800);
        assert_eq!(
            assistant.first_message_mode,
            FirstMessageMode::AssistantSpeaksFirst
        );
        assert!(assistant.tools.is_empty());
    }
}
