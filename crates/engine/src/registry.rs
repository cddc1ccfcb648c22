//! Session registry
//!
//! Process-wide map from call id to live session. Instantiated once at
//! startup and injected into request handlers; deregistration is the final
//! step of session teardown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use voice_engine_core::EngineError;

use crate::end_reason;
use crate::session::SessionHandle;

/// Registry of live sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
        })
    }

    /// Register a session; at most one per call id may exist.
    pub fn register(&self, handle: SessionHandle) -> Result<(), EngineError> {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            return Err(EngineError::QuotaExceeded(format!(
                "concurrent session limit ({}) reached",
                self.max_sessions
            )));
        }
        let call_id = handle.call_id().to_string();
        if sessions.contains_key(&call_id) {
            return Err(EngineError::Conflict(format!(
                "session already live for call {call_id}"
            )));
        }
        sessions.insert(call_id.clone(), handle);
        tracing::info!(call_id = %call_id, live = sessions.len(), "session registered");
        Ok(())
    }

    pub fn deregister(&self, call_id: &str) {
        let mut sessions = self.sessions.write();
        if sessions.remove(call_id).is_some() {
            tracing::info!(call_id, live = sessions.len(), "session deregistered");
        }
    }

    pub fn lookup(&self, call_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(call_id).cloned()
    }

    pub fn iterate(&self) -> Vec<SessionHandle> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// End every live session and wait for teardown, bounded per session.
    pub async fn shutdown_all(&self) {
        let handles = self.iterate();
        if handles.is_empty() {
            return;
        }
        tracing::info!(live = handles.len(), "ending all sessions for shutdown");

        for handle in &handles {
            handle.end(end_reason::SERVER_SHUTDOWN).await;
        }
        for handle in handles {
            if tokio::time::timeout(Duration::from_secs(5), handle.wait_ended())
                .await
                .is_err()
            {
                tracing::warn!(call_id = %handle.call_id(), "session did not end before shutdown deadline");
            }
        }
    }
}
