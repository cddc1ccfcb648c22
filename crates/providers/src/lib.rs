//! Provider adapters
//!
//! The engine performs no STT/LLM/TTS computation itself; each role is an
//! interface with one adapter per supported vendor, speaking the vendor's
//! HTTPS API. Factories are keyed by provider name and bind an adapter to
//! credentials plus per-assistant config.

pub mod llm;
pub mod resample;
pub mod stt;
pub mod tts;

pub use llm::{LanguageModel, LlmResponse, TokenUsage};
pub use resample::resample_pcm16;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use thiserror::Error;

use voice_engine_config::ProviderCredentials;
use voice_engine_core::{ModelConfig, TranscriberConfig, VoiceConfig};

/// Provider-boundary failures.
///
/// Inside a session these are recoverable: the orchestrator logs, returns
/// to listening, and the call continues.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("unsupported provider: {0}")]
    Unsupported(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

impl From<ProviderError> for voice_engine_core::EngineError {
    fn from(err: ProviderError) -> Self {
        voice_engine_core::EngineError::Provider(err.to_string())
    }
}

/// Build the STT adapter named by the transcriber config.
pub fn stt_for(
    cfg: &TranscriberConfig,
    creds: &ProviderCredentials,
) -> Result<Box<dyn SpeechToText>, ProviderError> {
    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(stt::OpenAiStt::new(
            require(creds, "OPENAI_API_KEY")?,
            cfg.model.clone(),
            cfg.language.clone(),
        ))),
        "deepgram" => Ok(Box::new(stt::DeepgramStt::new(
            require(creds, "DEEPGRAM_API_KEY")?,
            cfg.model.clone(),
            cfg.language.clone(),
        ))),
        other => Err(ProviderError::Unsupported(other.to_string())),
    }
}

/// Build the LLM adapter named by the model config.
pub fn llm_for(
    cfg: &ModelConfig,
    creds: &ProviderCredentials,
) -> Result<Box<dyn LanguageModel>, ProviderError> {
    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(llm::OpenAiLlm::new(
            require(creds, "OPENAI_API_KEY")?,
            cfg.clone(),
        ))),
        "anthropic" => Ok(Box::new(llm::AnthropicLlm::new(
            require(creds, "ANTHROPIC_API_KEY")?,
            cfg.clone(),
        ))),
        other => Err(ProviderError::Unsupported(other.to_string())),
    }
}

/// Build the TTS adapter named by the voice config, emitting PCM at
/// `egress_rate`.
pub fn tts_for(
    cfg: &VoiceConfig,
    creds: &ProviderCredentials,
    egress_rate: u32,
) -> Result<Box<dyn TextToSpeech>, ProviderError> {
    match cfg.provider.as_str() {
        "openai" => Ok(Box::new(tts::OpenAiTts::new(
            require(creds, "OPENAI_API_KEY")?,
            cfg.clone(),
            egress_rate,
        ))),
        "elevenlabs" => Ok(Box::new(tts::ElevenLabsTts::new(
            require(creds, "ELEVENLABS_API_KEY")?,
            cfg.clone(),
            egress_rate,
        ))),
        "cartesia" => Ok(Box::new(tts::CartesiaTts::new(
            require(creds, "CARTESIA_API_KEY")?,
            cfg.clone(),
            egress_rate,
        ))),
        other => Err(ProviderError::Unsupported(other.to_string())),
    }
}

fn require(creds: &ProviderCredentials, name: &str) -> Result<String, ProviderError> {
    creds
        .require(name)
        .map(|s| s.to_string())
        .map_err(|_| ProviderError::MissingCredential(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let cfg = TranscriberConfig {
            provider: "acme".into(),
            model: "m".into(),
            language: "en".into(),
        };
        let err = stt_for(&cfg, &ProviderCredentials::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        let cfg = ModelConfig::default();
        let err = llm_for(&cfg, &ProviderCredentials::default()).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
