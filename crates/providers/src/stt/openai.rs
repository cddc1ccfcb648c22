//! OpenAI transcription adapter
//!
//! Uploads WAV-wrapped PCM to `/v1/audio/transcriptions`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use voice_engine_core::audio::pcm_to_wav;
use voice_engine_core::INGRESS_SAMPLE_RATE;

use crate::{ProviderError, SpeechToText};

const API_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OpenAiStt {
    api_key: String,
    model: String,
    language: String,
    client: reqwest::Client,
}

impl OpenAiStt {
    pub fn new(api_key: String, model: String, language: String) -> Self {
        Self {
            api_key,
            model,
            language,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SpeechToText for OpenAiStt {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, ProviderError> {
        if pcm.is_empty() {
            return Ok(String::new());
        }

        let wav = pcm_to_wav(pcm, INGRESS_SAMPLE_RATE);
        let part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let res = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let json: serde_json::Value = res.json().await?;
        Ok(json
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string())
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_audio_short_circuits() {
        let stt = OpenAiStt::new("key".into(), "whisper-1".into(), "en".into());
        assert_eq!(stt.transcribe(&[]).await.unwrap(), "");
    }
}
