//! Call recordings
//!
//! Each call leaves two raw PCM blobs in the recordings directory, written
//! once at teardown: `{call_id}-user.pcm` and `{call_id}-assistant.pcm`.

use std::path::PathBuf;

use voice_engine_core::EngineError;

/// Writes per-call recording blobs.
#[derive(Debug, Clone)]
pub struct RecordingWriter {
    dir: PathBuf,
}

impl RecordingWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Flush both streams; returns (user_uri, assistant_uri).
    pub async fn write(
        &self,
        call_id: &str,
        user_pcm: &[u8],
        assistant_pcm: &[u8],
    ) -> Result<(String, String), EngineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| EngineError::Fatal(format!("recordings dir: {e}")))?;

        let user_path = self.dir.join(format!("{call_id}-user.pcm"));
        let assistant_path = self.dir.join(format!("{call_id}-assistant.pcm"));

        tokio::fs::write(&user_path, user_pcm)
            .await
            .map_err(|e| EngineError::Fatal(format!("write user recording: {e}")))?;
        tokio::fs::write(&assistant_path, assistant_pcm)
            .await
            .map_err(|e| EngineError::Fatal(format!("write assistant recording: {e}")))?;

        Ok((
            user_path.to_string_lossy().into_owned(),
            assistant_path.to_string_lossy().into_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_both_streams() {
        let dir = std::env::temp_dir().join(format!("ve-rec-{}", uuid::Uuid::new_v4()));
        let writer = RecordingWriter::new(&dir);

        let (user_uri, assistant_uri) = writer
            .write("call-1", &[1u8, 2, 3, 4], &[9u8, 9])
            .await
            .unwrap();

        assert!(user_uri.ends_with("call-1-user.pcm"));
        assert!(assistant_uri.ends_with("call-1-assistant.pcm"));
        assert_eq!(tokio::fs::read(&user_uri).await.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(tokio::fs::read(&assistant_uri).await.unwrap(), vec![9, 9]);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
