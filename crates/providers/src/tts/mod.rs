//! Text-to-speech adapters
//!
//! Contract: `synthesize(text)` returns linear-PCM 16-bit mono at the
//! session egress rate. Adapters whose native rate differs resample
//! before returning.

mod cartesia;
mod elevenlabs;
mod openai;

pub use cartesia::CartesiaTts;
pub use elevenlabs::ElevenLabsTts;
pub use openai::OpenAiTts;

use async_trait::async_trait;

use crate::ProviderError;

/// TTS provider boundary.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Synthesize `text` into s16le mono PCM at `sample_rate()`.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;

    /// Output sample rate of `synthesize`, Hz.
    fn sample_rate(&self) -> u32;

    /// Provider name for logging and cost attribution.
    fn provider(&self) -> &'static str;
}
