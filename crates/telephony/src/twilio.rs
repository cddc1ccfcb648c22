//! Twilio adapter
//!
//! Inbound rings and status callbacks arrive as form-encoded webhooks; the
//! only control-plane action a successful call needs is the TwiML directive
//! connecting the media leg to the engine's WebSocket. Everything else
//! (dial-out, hangup, transfer, DTMF) is a REST call against the call sid.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use voice_engine_core::{CallStatus, EngineError};
use voice_engine_engine::CallControl;

use crate::TelephonyError;

const API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Inbound-ring webhook payload (subset the engine needs).
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioInbound {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
}

/// Status-callback webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioStatus {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
}

/// Map a Twilio call status onto the engine's call statuses.
///
/// Returns `None` for intermediate states the engine does not track.
pub fn map_call_status(status: &str) -> Option<CallStatus> {
    match status {
        "queued" | "initiated" => Some(CallStatus::Queued),
        "ringing" => Some(CallStatus::Ringing),
        "in-progress" | "answered" => Some(CallStatus::InProgress),
        "completed" => Some(CallStatus::Completed),
        "busy" => Some(CallStatus::Busy),
        "failed" | "canceled" => Some(CallStatus::Failed),
        "no-answer" => Some(CallStatus::NoAnswer),
        _ => None,
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// TwiML directive bridging the media leg to the engine's WebSocket.
pub fn stream_twiml(ws_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Connect>
    <Stream url="{}"/>
  </Connect>
</Response>"#,
        xml_escape(ws_url)
    )
}

/// TwiML for numbers with no configured assistant: short prompt, hang up.
pub fn reject_twiml(message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say>{}</Say>
  <Hangup/>
</Response>"#,
        xml_escape(message)
    )
}

/// TwiML patched onto a live leg to dial a new destination (blind transfer).
pub fn dial_twiml(destination: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Dial>{}</Dial>
</Response>"#,
        xml_escape(destination)
    )
}

/// TwiML patched onto a live leg to emit DTMF, then resume nothing.
pub fn digits_twiml(digits: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Play digits="{}"/>
</Response>"#,
        xml_escape(digits)
    )
}

/// Twilio REST client bound to one account.
#[derive(Clone)]
pub struct TwilioClient {
    account_sid: String,
    auth_token: String,
    client: reqwest::Client,
}

impl TwilioClient {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn calls_url(&self, suffix: &str) -> String {
        format!("{API_BASE}/Accounts/{}/Calls{suffix}", self.account_sid)
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<serde_json::Value, TelephonyError> {
        let res = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(TelephonyError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.json().await?)
    }

    /// Initiate an outbound dial; `answer_url` serves the stream TwiML when
    /// the callee picks up. Returns the carrier call sid.
    pub async fn create_call(
        &self,
        to: &str,
        from: &str,
        answer_url: &str,
        status_callback: &str,
    ) -> Result<String, TelephonyError> {
        let body = self
            .post_form(
                &self.calls_url(".json"),
                &[
                    ("To", to),
                    ("From", from),
                    ("Url", answer_url),
                    ("Method", "POST"),
                    ("StatusCallback", status_callback),
                    ("StatusCallbackMethod", "POST"),
                ],
            )
            .await?;

        body.get("sid")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| TelephonyError::InvalidResponse("missing call sid".into()))
    }

    /// Hang up a live leg.
    pub async fn hangup(&self, call_sid: &str) -> Result<(), TelephonyError> {
        self.post_form(
            &self.calls_url(&format!("/{call_sid}.json")),
            &[("Status", "completed")],
        )
        .await?;
        Ok(())
    }

    /// Patch a live leg with replacement TwiML.
    pub async fn update_twiml(&self, call_sid: &str, twiml: &str) -> Result<(), TelephonyError> {
        self.post_form(
            &self.calls_url(&format!("/{call_sid}.json")),
            &[("Twiml", twiml)],
        )
        .await?;
        Ok(())
    }
}

/// `CallControl` for a Twilio leg; handed to telephony sessions so the
/// orchestrator can transfer, hang up, and press digits without knowing the
/// carrier.
pub struct TwilioCallControl {
    client: TwilioClient,
    call_sid: String,
}

impl TwilioCallControl {
    pub fn new(client: TwilioClient, call_sid: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client,
            call_sid: call_sid.into(),
        })
    }
}

#[async_trait]
impl CallControl for TwilioCallControl {
    async fn transfer(&self, destination: &str) -> Result<(), EngineError> {
        tracing::info!(call_sid = %self.call_sid, destination, "patching leg for transfer");
        self.client
            .update_twiml(&self.call_sid, &dial_twiml(destination))
            .await
            .map_err(EngineError::from)
    }

    async fn hangup(&self) -> Result<(), EngineError> {
        self.client
            .hangup(&self.call_sid)
            .await
            .map_err(EngineError::from)
    }

    async fn send_digits(&self, digits: &str) -> Result<(), EngineError> {
        self.client
            .update_twiml(&self.call_sid, &digits_twiml(digits))
            .await
            .map_err(EngineError::from)
    }
}
