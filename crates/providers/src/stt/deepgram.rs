//! Deepgram transcription adapter
//!
//! Posts raw linear16 PCM to `/v1/listen`; transcript is read from the
//! first channel alternative.

use std::time::Duration;

use async_trait::async_trait;

use voice_engine_core::INGRESS_SAMPLE_RATE;

use crate::{ProviderError, SpeechToText};

const API_URL: &str = "https://api.deepgram.com/v1/listen";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DeepgramStt {
    api_key: String,
    model: String,
    language: String,
    client: reqwest::Client,
}

impl DeepgramStt {
    pub fn new(api_key: String, model: String, language: String) -> Self {
        Self {
            api_key,
            model,
            language,
            client: reqwest::Client::new(),
        }
    }
}

/// Pull `results.channels[0].alternatives[0].transcript` out of a
/// Deepgram response document.
pub(crate) fn transcript_from_response(json: &serde_json::Value) -> Option<String> {
    json.get("results")?
        .get("channels")?
        .get(0)?
        .get("alternatives")?
        .get(0)?
        .get("transcript")?
        .as_str()
        .map(|s| s.trim().to_string())
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, ProviderError> {
        if pcm.is_empty() {
            return Ok(String::new());
        }

        let sample_rate = INGRESS_SAMPLE_RATE.to_string();
        let res = self
            .client
            .post(API_URL)
            .query(&[
                ("model", self.model.as_str()),
                ("language", self.language.as_str()),
                ("encoding", "linear16"),
                ("sample_rate", sample_rate.as_str()),
                ("channels", "1"),
            ])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .body(pcm.to_vec())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Http { status, body });
        }

        let json: serde_json::Value = res.json().await?;
        transcript_from_response(&json)
            .ok_or_else(|| ProviderError::InvalidResponse("missing transcript field".into()))
    }

    fn provider(&self) -> &'static str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transcript_extracted_from_nested_shape() {
        let body = json!({
            "results": { "channels": [ { "alternatives": [
                { "transcript": " what time is it ", "confidence": 0.98 }
            ]}]}
        });
        assert_eq!(
            transcript_from_response(&body).as_deref(),
            Some("what time is it")
        );
    }

    #[test]
    fn malformed_body_yields_none() {
        assert!(transcript_from_response(&json!({"results": {}})).is_none());
    }
}
