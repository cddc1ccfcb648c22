//! ScyllaDB client wrapper

use std::sync::Arc;
use std::time::Duration;

use scylla::{Session, SessionBuilder};

use crate::PersistenceError;

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ScyllaConfig {
    pub nodes: Vec<String>,
    pub keyspace: String,
    pub connect_timeout: Duration,
}

impl Default for ScyllaConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["127.0.0.1:9042".to_string()],
            keyspace: "voice_engine".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared session handle.
#[derive(Clone)]
pub struct ScyllaClient {
    session: Arc<Session>,
    keyspace: String,
}

impl ScyllaClient {
    /// Connect and ensure the schema exists.
    pub async fn connect(config: ScyllaConfig) -> Result<Self, PersistenceError> {
        let mut builder = SessionBuilder::new().connection_timeout(config.connect_timeout);
        for node in &config.nodes {
            builder = builder.known_node(node);
        }
        let session = builder.build().await?;

        let client = Self {
            session: Arc::new(session),
            keyspace: config.keyspace,
        };
        client.ensure_schema().await?;

        tracing::info!(keyspace = %client.keyspace, "connected to ScyllaDB");
        Ok(client)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Create the keyspace and tables if absent.
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        let ks = &self.keyspace;

        self.session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {ks} WITH replication = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}"
                ),
                (),
            )
            .await?;

        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {ks}.calls (
                        call_id text PRIMARY KEY,
                        org_id text,
                        kind text,
                        status text,
                        from_number text,
                        to_number text,
                        assistant_id text,
                        carrier_sid text,
                        carrier_json text,
                        started_at bigint,
                        ended_at bigint,
                        duration_secs bigint,
                        ended_reason text,
                        cost_json text,
                        user_recording_uri text,
                        assistant_recording_uri text
                    )"
                ),
                (),
            )
            .await?;

        self.session
            .query_unpaged(
                format!("CREATE INDEX IF NOT EXISTS ON {ks}.calls (carrier_sid)"),
                (),
            )
            .await?;

        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {ks}.call_messages (
                        call_id text,
                        message_id text,
                        role text,
                        content text,
                        tool_name text,
                        tool_arguments_json text,
                        tool_result_json text,
                        timestamp_ms bigint,
                        latency_json text,
                        PRIMARY KEY (call_id, timestamp_ms, message_id)
                    )"
                ),
                (),
            )
            .await?;

        Ok(())
    }
}
