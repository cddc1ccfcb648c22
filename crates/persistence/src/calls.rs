//! Call and call-message storage
//!
//! The engine writes through the `CallStore` trait; the ScyllaDB
//! implementation serialises map-shaped fields as JSON text columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use voice_engine_core::{Call, CallKind, CallMessage, CallStatus, ChatRole, CostBreakdown};

use crate::{PersistenceError, ScyllaClient};

/// Durable call storage.
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Insert or fully replace a call row.
    async fn upsert_call(&self, call: &Call) -> Result<(), PersistenceError>;

    async fn get_call(&self, id: &str) -> Result<Option<Call>, PersistenceError>;

    /// Look up a call by the carrier's own call sid.
    async fn find_by_carrier_sid(&self, sid: &str) -> Result<Option<Call>, PersistenceError>;

    async fn set_status(&self, id: &str, status: CallStatus) -> Result<(), PersistenceError>;

    /// Append one conversation entry; the log is append-only.
    async fn append_message(&self, message: &CallMessage) -> Result<(), PersistenceError>;

    async fn messages_for(&self, call_id: &str) -> Result<Vec<CallMessage>, PersistenceError>;
}

/// ScyllaDB implementation of `CallStore`.
#[derive(Clone)]
pub struct ScyllaCallStore {
    client: ScyllaClient,
}

impl ScyllaCallStore {
    pub fn new(client: ScyllaClient) -> Self {
        Self { client }
    }
}

fn kind_from_str(s: &str) -> Result<CallKind, PersistenceError> {
    match s {
        "web" => Ok(CallKind::Web),
        "inbound" => Ok(CallKind::Inbound),
        "outbound" => Ok(CallKind::Outbound),
        other => Err(PersistenceError::InvalidData(format!(
            "unknown call kind: {other}"
        ))),
    }
}

fn kind_to_str(kind: CallKind) -> &'static str {
    match kind {
        CallKind::Web => "web",
        CallKind::Inbound => "inbound",
        CallKind::Outbound => "outbound",
    }
}

fn status_from_str(s: &str) -> Result<CallStatus, PersistenceError> {
    match s {
        "queued" => Ok(CallStatus::Queued),
        "ringing" => Ok(CallStatus::Ringing),
        "in-progress" => Ok(CallStatus::InProgress),
        "completed" => Ok(CallStatus::Completed),
        "failed" => Ok(CallStatus::Failed),
        "no-answer" => Ok(CallStatus::NoAnswer),
        "busy" => Ok(CallStatus::Busy),
        other => Err(PersistenceError::InvalidData(format!(
            "unknown call status: {other}"
        ))),
    }
}

fn role_from_str(s: &str) -> Result<ChatRole, PersistenceError> {
    match s {
        "system" => Ok(ChatRole::System),
        "user" => Ok(ChatRole::User),
        "assistant" => Ok(ChatRole::Assistant),
        "tool" => Ok(ChatRole::Tool),
        other => Err(PersistenceError::InvalidData(format!(
            "unknown role: {other}"
        ))),
    }
}

type CallRow = (
    String,         // call_id
    String,         // org_id
    String,         // kind
    String,         // status
    Option<String>, // from_number
    Option<String>, // to_number
    String,         // assistant_id
    Option<String>, // carrier_json
    Option<i64>,    // started_at
    Option<i64>,    // ended_at
    Option<i64>,    // duration_secs
    Option<String>, // ended_reason
    Option<String>, // cost_json
    Option<String>, // user_recording_uri
    Option<String>, // assistant_recording_uri
);

fn call_from_row(row: CallRow) -> Result<Call, PersistenceError> {
    let (
        call_id,
        org_id,
        kind,
        status,
        from_number,
        to_number,
        assistant_id,
        carrier_json,
        started_at,
        ended_at,
        duration_secs,
        ended_reason,
        cost_json,
        user_recording_uri,
        assistant_recording_uri,
    ) = row;

    let carrier = match carrier_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?,
        None => Default::default(),
    };
    let cost: Option<CostBreakdown> = match cost_json {
        Some(json) => Some(
            serde_json::from_str(&json).map_err(|e| PersistenceError::InvalidData(e.to_string()))?,
        ),
        None => None,
    };

    Ok(Call {
        id: call_id,
        org_id,
        kind: kind_from_str(&kind)?,
        status: status_from_str(&status)?,
        from_number,
        to_number,
        assistant_id,
        carrier,
        started_at: started_at.and_then(DateTime::<Utc>::from_timestamp_millis),
        ended_at: ended_at.and_then(DateTime::<Utc>::from_timestamp_millis),
        duration_secs: duration_secs.map(|d| d.max(0) as u64),
        ended_reason,
        cost,
        user_recording_uri,
        assistant_recording_uri,
    })
}

const CALL_COLUMNS: &str = "call_id, org_id, kind, status, from_number, to_number, \
     assistant_id, carrier_json, started_at, ended_at, duration_secs, ended_reason, \
     cost_json, user_recording_uri, assistant_recording_uri";

#[async_trait]
impl CallStore for ScyllaCallStore {
    async fn upsert_call(&self, call: &Call) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.calls (
                call_id, org_id, kind, status, from_number, to_number,
                assistant_id, carrier_sid, carrier_json, started_at, ended_at,
                duration_secs, ended_reason, cost_json,
                user_recording_uri, assistant_recording_uri
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        let carrier_json = serde_json::to_string(&call.carrier)
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        let cost_json = match &call.cost {
            Some(cost) => Some(
                serde_json::to_string(cost)
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?,
            ),
            None => None,
        };
        let carrier_sid = call.carrier.get("carrier_call_sid").cloned();

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &call.id,
                    &call.org_id,
                    kind_to_str(call.kind),
                    call.status.as_str(),
                    &call.from_number,
                    &call.to_number,
                    &call.assistant_id,
                    carrier_sid,
                    carrier_json,
                    call.started_at.map(|t| t.timestamp_millis()),
                    call.ended_at.map(|t| t.timestamp_millis()),
                    call.duration_secs.map(|d| d as i64),
                    &call.ended_reason,
                    cost_json,
                    &call.user_recording_uri,
                    &call.assistant_recording_uri,
                ),
            )
            .await?;

        tracing::debug!(call_id = %call.id, status = call.status.as_str(), "call upserted");
        Ok(())
    }

    async fn get_call(&self, id: &str) -> Result<Option<Call>, PersistenceError> {
        let query = format!(
            "SELECT {CALL_COLUMNS} FROM {}.calls WHERE call_id = ?",
            self.client.keyspace()
        );

        let result = self.client.session().query_unpaged(query, (id,)).await?;
        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let typed: CallRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                return Ok(Some(call_from_row(typed)?));
            }
        }
        Ok(None)
    }

    async fn find_by_carrier_sid(&self, sid: &str) -> Result<Option<Call>, PersistenceError> {
        let query = format!(
            "SELECT {CALL_COLUMNS} FROM {}.calls WHERE carrier_sid = ?",
            self.client.keyspace()
        );

        let result = self.client.session().query_unpaged(query, (sid,)).await?;
        if let Some(rows) = result.rows {
            if let Some(row) = rows.into_iter().next() {
                let typed: CallRow = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
                return Ok(Some(call_from_row(typed)?));
            }
        }
        Ok(None)
    }

    async fn set_status(&self, id: &str, status: CallStatus) -> Result<(), PersistenceError> {
        let query = format!(
            "UPDATE {}.calls SET status = ? WHERE call_id = ?",
            self.client.keyspace()
        );
        self.client
            .session()
            .query_unpaged(query, (status.as_str(), id))
            .await?;
        Ok(())
    }

    async fn append_message(&self, message: &CallMessage) -> Result<(), PersistenceError> {
        let query = format!(
            "INSERT INTO {}.call_messages (
                call_id, message_id, role, content, tool_name,
                tool_arguments_json, tool_result_json, timestamp_ms, latency_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.client.keyspace()
        );

        let args_json = message.tool_arguments.as_ref().map(|v| v.to_string());
        let result_json = message.tool_result.as_ref().map(|v| v.to_string());
        let latency_json = serde_json::to_string(&message.latency)
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        self.client
            .session()
            .query_unpaged(
                query,
                (
                    &message.call_id,
                    &message.id,
                    message.role.as_str(),
                    &message.content,
                    &message.tool_name,
                    args_json,
                    result_json,
                    message.timestamp_ms as i64,
                    latency_json,
                ),
            )
            .await?;
        Ok(())
    }

    async fn messages_for(&self, call_id: &str) -> Result<Vec<CallMessage>, PersistenceError> {
        let query = format!(
            "SELECT call_id, message_id, role, content, tool_name,
                    tool_arguments_json, tool_result_json, timestamp_ms, latency_json
             FROM {}.call_messages WHERE call_id = ?",
            self.client.keyspace()
        );

        let result = self.client.session().query_unpaged(query, (call_id,)).await?;
        let mut messages = Vec::new();

        if let Some(rows) = result.rows {
            for row in rows {
                let (
                    call_id,
                    message_id,
                    role,
                    content,
                    tool_name,
                    args_json,
                    result_json,
                    timestamp_ms,
                    latency_json,
                ): (
                    String,
                    String,
                    String,
                    String,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    i64,
                    Option<String>,
                ) = row
                    .into_typed()
                    .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

                let latency = match latency_json {
                    Some(json) => serde_json::from_str(&json)
                        .map_err(|e| PersistenceError::InvalidData(e.to_string()))?,
                    None => Default::default(),
                };

                messages.push(CallMessage {
                    id: message_id,
                    call_id,
                    role: role_from_str(&role)?,
                    content,
                    tool_name,
                    tool_arguments: args_json
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()
                        .map_err(|e| PersistenceError::InvalidData(e.to_string()))?,
                    tool_result: result_json
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()
                        .map_err(|e| PersistenceError::InvalidData(e.to_string()))?,
                    timestamp_ms: timestamp_ms.max(0) as u64,
                    latency,
                });
            }
        }

        Ok(messages)
    }
}
