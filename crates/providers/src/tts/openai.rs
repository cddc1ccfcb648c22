//! OpenAI speech adapter
//!
//! `response_format=pcm` returns 24 kHz s16le mono.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use voice_engine_core::VoiceConfig;

use crate::{resample_pcm16, ProviderError, TextToSpeech};

const API_URL: &str = "https://api.openai.com/v1/audio/speech";
const NATIVE_RATE: u32 = 24_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct OpenAiTts {
    api_key: String,
    config: VoiceConfig,
    egress_rate: u32,
    client: reqwest::Client,
}

impl OpenAiTts {
    pub fn new(api_key: String, config: VoiceConfig, egress_rate: u32) -> Self {
        Self {
            api_key,
            config,
            egress_rate,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextToSpeech for OpenAiTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "model": "tts-1",
            "input": text,
            "voice": self.config.voice_id,
            "speed": self.config.speed,
            "response_format": "pcm",
        });

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

        let pcm = res.bytes().await?.to_vec();
        Ok(resample_pcm16(&pcm, NATIVE_RATE, self.egress_rate))
    }

    fn sample_rate(&self) -> u32 {
        self.egress_rate
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_text_yields_no_audio() {
        let tts = OpenAiTts::new("key".into(), VoiceConfig::default(), 24_000);
        assert!(tts.synthesize("   ").await.unwrap().is_empty());
        assert_eq!(tts.sample_rate(), 24_000);
    }
}
