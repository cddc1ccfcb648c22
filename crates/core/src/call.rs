//! Call records
//!
//! A `Call` is the durable record of one conversation; the live counterpart
//! is the session owned by the engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the call reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Web,
    Inbound,
    Outbound,
}

/// Durable call status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Ringing,
    InProgress,
    Completed,
    Failed,
    NoAnswer,
    Busy,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Failed | CallStatus::NoAnswer | CallStatus::Busy
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Queued => "queued",
            CallStatus::Ringing => "ringing",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Busy => "busy",
        }
    }
}

/// Per-call cost breakdown in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub stt_cents: u32,
    pub llm_cents: u32,
    pub tts_cents: u32,
    pub total_cents: u32,
}

/// One call record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub org_id: String,
    pub kind: CallKind,
    pub status: CallStatus,
    /// Caller number; `None` for web calls.
    pub from_number: Option<String>,
    /// Callee number; `None` for web calls.
    pub to_number: Option<String>,
    pub assistant_id: String,
    /// Opaque carrier metadata (e.g. the carrier's own call sid).
    #[serde(default)]
    pub carrier: HashMap<String, String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<u64>,
    pub ended_reason: Option<String>,
    pub cost: Option<CostBreakdown>,
    pub user_recording_uri: Option<String>,
    pub assistant_recording_uri: Option<String>,
}

impl Call {
    /// Create a fresh call record in its initial status.
    pub fn new(
        org_id: impl Into<String>,
        assistant_id: impl Into<String>,
        kind: CallKind,
        status: CallStatus,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            org_id: org_id.into(),
            kind,
            status,
            from_number: None,
            to_number: None,
            assistant_id: assistant_id.into(),
            carrier: HashMap::new(),
            started_at: None,
            ended_at: None,
            duration_secs: None,
            ended_reason: None,
            cost: None,
            user_recording_uri: None,
            assistant_recording_uri: None,
        }
    }

    /// Whole-second duration between `started_at` and `ended_at`.
    ///
    /// Floors sub-second remainders and clamps negatives to zero.
    pub fn computed_duration_secs(&self) -> Option<u64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        let ms = end.signed_duration_since(start).num_milliseconds().max(0);
        Some((ms / 1000) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_floors_and_never_negative() {
        let mut call = Call::new("org", "asst", CallKind::Web, CallStatus::InProgress);
        call.started_at = Some(Utc.timestamp_millis_opt(10_000).unwrap());
        call.ended_at = Some(Utc.timestamp_millis_opt(13_999).unwrap());
        assert_eq!(call.computed_duration_secs(), Some(3));

        call.ended_at = Some(Utc.timestamp_millis_opt(9_000).unwrap());
        assert_eq!(call.computed_duration_secs(), Some(0));
    }

    #[test]
    fn terminal_statuses() {
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::NoAnswer.is_terminal());
        assert!(!CallStatus::Ringing.is_terminal());
        assert!(!CallStatus::InProgress.is_terminal());
    }
}
