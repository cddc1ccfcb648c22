//! Cartesia adapter
//!
//! `/tts/bytes` with a raw `pcm_s16le` output container. Native output is
//! requested at 16 kHz and resampled up when the session egress is 24 kHz.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use voice_engine_core::VoiceConfig;

use crate::{resample_pcm16, ProviderError, TextToSpeech};

const API_URL: &str = "https://api.cartesia.ai/tts/bytes";
const API_VERSION: &str = "2024-06-10";
const NATIVE_RATE: u32 = 16_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CartesiaTts {
    api_key: String,
    config: VoiceConfig,
    egress_rate: u32,
    client: reqwest::Client,
}

impl CartesiaTts {
    pub fn new(api_key: String, config: VoiceConfig, egress_rate: u32) -> Self {
        Self {
            api_key,
            config,
            egress_rate,
            client: reqwest::Client::new(),
        }
    }
}

/// Request body for `/tts/bytes`.
pub(crate) fn build_request(config: &VoiceConfig) -> serde_json::Value {
    json!({
        "model_id": "sonic-english",
        "transcript": "",
        "voice": { "mode": "id", "id": config.voice_id },
        "output_format": {
            "container": "raw",
            "encoding": "pcm_s16le",
            "sample_rate": NATIVE_RATE,
        },
    })
}

#[async_trait]
impl TextToSpeech for CartesiaTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = build_request(&self.config);
        body["transcript"] = serde_json::Value::String(text.to_string());

        let res = self
            .client
            .post(API_URL)
            .header("X-API-Key", &self.api_key)
            .header("Cartesia-Version", API_VERSION)
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
        "cartesia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_is_raw_pcm() {
        let body = build_request(&VoiceConfig {
            provider: "cartesia".into(),
            voice_id: "a0e99841".into(),
            speed: 1.0,
        });
        assert_eq!(body["output_format"]["encoding"], "pcm_s16le");
        assert_eq!(body["output_format"]["sample_rate"], 16_000);
        assert_eq!(body["voice"]["id"], "a0e99841");
    }
}
