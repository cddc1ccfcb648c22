//! In-memory stores
//!
//! Back the same traits as the ScyllaDB implementations; used by tests and
//! single-node development where no cluster is configured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use voice_engine_core::{Assistant, Call, CallMessage, CallStatus};

use crate::{AssistantDirectory, CallStore, PersistenceError};

/// In-memory `CallStore`.
#[derive(Default)]
pub struct InMemoryStore {
    calls: RwLock<HashMap<String, Call>>,
    messages: RwLock<HashMap<String, Vec<CallMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of persisted calls; test helper.
    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }
}

#[async_trait]
impl CallStore for InMemoryStore {
    async fn upsert_call(&self, call: &Call) -> Result<(), PersistenceError> {
        self.calls.write().insert(call.id.clone(), call.clone());
        Ok(())
    }

    async fn get_call(&self, id: &str) -> Result<Option<Call>, PersistenceError> {
        Ok(self.calls.read().get(id).cloned())
    }

    async fn find_by_carrier_sid(&self, sid: &str) -> Result<Option<Call>, PersistenceError> {
        Ok(self
            .calls
            .read()
            .values()
            .find(|c| c.carrier.get("carrier_call_sid").map(String::as_str) == Some(sid))
            .cloned())
    }

    async fn set_status(&self, id: &str, status: CallStatus) -> Result<(), PersistenceError> {
        match self.calls.write().get_mut(id) {
            Some(call) => {
                call.status = status;
                Ok(())
            }
            None => Err(PersistenceError::NotFound(id.to_string())),
        }
    }

    async fn append_message(&self, message: &CallMessage) -> Result<(), PersistenceError> {
        self.messages
            .write()
            .entry(message.call_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn messages_for(&self, call_id: &str) -> Result<Vec<CallMessage>, PersistenceError> {
        Ok(self
            .messages
            .read()
            .get(call_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory `AssistantDirectory`.
#[derive(Default)]
pub struct InMemoryDirectory {
    assistants: RwLock<HashMap<String, Assistant>>,
    numbers: RwLock<HashMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, assistant: Assistant) {
        self.assistants
            .write()
            .insert(assistant.id.clone(), assistant);
    }

    /// Route an inbound number to an assistant id.
    pub fn map_number(&self, number: impl Into<String>, assistant_id: impl Into<String>) {
        self.numbers.write().insert(number.into(), assistant_id.into());
    }
}

#[async_trait]
impl AssistantDirectory for InMemoryDirectory {
    async fn get(&self, id: &str) -> Result<Option<Assistant>, PersistenceError> {
        Ok(self.assistants.read().get(id).cloned())
    }

    async fn for_number(&self, number: &str) -> Result<Option<Assistant>, PersistenceError> {
        let id = match self.numbers.read().get(number) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        self.get(&id).await
    }
}
