//! ElevenLabs adapter
//!
//! `output_format=pcm_24000` returns raw s16le mono.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use voice_engine_core::VoiceConfig;

use crate::{resample_pcm16, ProviderError, TextToSpeech};

const NATIVE_RATE: u32 = 24_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ElevenLabsTts {
    api_key: String,
    config: VoiceConfig,
    egress_rate: u32,
    client: reqwest::Client,
}

impl ElevenLabsTts {
    pub fn new(api_key: String, config: VoiceConfig, egress_rate: u32) -> Self {
        Self {
            api_key,
            config,
            egress_rate,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=pcm_24000",
            self.config.voice_id
        )
    }
}

#[async_trait]
impl TextToSpeech for ElevenLabsTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "text": text,
            "model_id": "eleven_turbo_v2_5",
            "voice_settings": { "speed": self.config.speed },
        });

        let res = self
            .client
            .post(self.url())
            .header("xi-api-key", &self.api_key)
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
        "elevenlabs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_id_lands_in_path() {
        let tts = ElevenLabsTts::new(
            "key".into(),
            VoiceConfig {
                provider: "elevenlabs".into(),
                voice_id: "rachel".into(),
                speed: 1.0,
            },
            24_000,
        );
        assert!(tts.url().contains("/text-to-speech/rachel?"));
    }
}
