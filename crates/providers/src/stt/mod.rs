//! Speech-to-text adapters
//!
//! Contract: `transcribe(pcm)` takes linear-PCM 16-bit mono at the ingress
//! sample rate and returns the transcript text (possibly empty).

mod deepgram;
mod openai;

pub use deepgram::DeepgramStt;
pub use openai::OpenAiStt;

use std::sync::Arc;

use async_trait::async_trait;

use crate::ProviderError;

/// STT provider boundary.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one utterance of 16 kHz mono s16le PCM.
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, ProviderError>;

    /// Provider name for logging and cost attribution.
    fn provider(&self) -> &'static str;
}

impl std::fmt::Debug for dyn SpeechToText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechToText")
            .field("provider", &self.provider())
            .finish()
    }
}

#[async_trait]
impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, ProviderError> {
        self.as_ref().transcribe(pcm).await
    }

    fn provider(&self) -> &'static str {
        self.as_ref().provider()
    }
}
