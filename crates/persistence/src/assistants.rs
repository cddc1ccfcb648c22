//! Assistant lookup
//!
//! Assistants are created and edited by the REST control surface, which is
//! outside this engine. The engine only resolves them: by id for web and
//! outbound calls, by dialled number for inbound calls.

use async_trait::async_trait;

use voice_engine_core::Assistant;

use crate::PersistenceError;

/// Read-only assistant resolution.
#[async_trait]
pub trait AssistantDirectory: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Assistant>, PersistenceError>;

    /// Assistant configured for an inbound phone number, if any.
    async fn for_number(&self, number: &str) -> Result<Option<Assistant>, PersistenceError>;
}
