//! HTTP endpoints
//!
//! Call creation, session lifecycle management, carrier webhooks, health.

use axum::{
    extract::{Form, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use voice_engine_core::{Call, CallKind, CallStatus};
use voice_engine_engine::end_reason;
use voice_engine_persistence::AssistantDirectory;
use voice_engine_telephony::twilio;
use voice_engine_telephony::{TwilioInbound, TwilioStatus};

use crate::state::AppState;
use crate::websocket::ws_handler;
use crate::ServerError;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = if state.settings.server.cors_origin.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(
                state
                    .settings
                    .server
                    .cors_origin
                    .parse::<axum::http::HeaderValue>()
                    .expect("cors_origin must be a valid origin"),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Call lifecycle
        .route("/api/calls/web", post(create_web_call))
        .route("/api/calls/outbound", post(create_outbound_call))
        .route("/api/calls/:id/session", get(get_session_info))
        .route("/api/calls/:id/end", post(end_session))
        // Carrier webhooks
        .route("/telephony/twilio/inbound", post(twilio_inbound))
        .route("/telephony/twilio/answer/:call_id", post(twilio_answer))
        .route("/telephony/twilio/status", post(twilio_status))
        // Media
        .route("/ws/:call_id", get(ws_handler))
        // Health
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct CreateWebCallRequest {
    assistant_id: String,
    #[serde(default)]
    org_id: Option<String>,
}

/// Create a web call: a Call row plus a tokenized media URL. The session
/// itself starts when the WebSocket connects.
async fn create_web_call(
    State(state): State<AppState>,
    Json(request): Json<CreateWebCallRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let assistant = state
        .directory
        .get(&request.assistant_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::NotFound(format!("assistant {}", request.assistant_id)))?;

    let org_id = request.org_id.unwrap_or_else(|| "default".to_string());
    let call = Call::new(org_id, &assistant.id, CallKind::Web, CallStatus::Queued);
    state
        .store
        .upsert_call(&call)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let token = state.tokens.mint(&call.id)?;
    Ok(Json(serde_json::json!({
        "call_id": call.id,
        "websocket_url": state.media_ws_url(&call.id, &token),
        "token": token,
    })))
}

#[derive(Debug, Deserialize)]
struct CreateOutboundCallRequest {
    assistant_id: String,
    to: String,
    from: String,
    #[serde(default)]
    org_id: Option<String>,
}

/// Initiate a single outbound dial through the carrier.
async fn create_outbound_call(
    State(state): State<AppState>,
    Json(request): Json<CreateOutboundCallRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let twilio = state
        .twilio
        .clone()
        .ok_or_else(|| ServerError::Validation("no carrier credentials configured".into()))?;

    state
        .directory
        .get(&request.assistant_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::NotFound(format!("assistant {}", request.assistant_id)))?;

    let org_id = request.org_id.unwrap_or_else(|| "default".to_string());
    let mut call = Call::new(org_id, &request.assistant_id, CallKind::Outbound, CallStatus::Queued);
    call.from_number = Some(request.from.clone());
    call.to_number = Some(request.to.clone());

    let api_base = state.settings.server.public_api_url.trim_end_matches('/');
    let answer_url = format!("{api_base}/telephony/twilio/answer/{}", call.id);
    let status_url = format!("{api_base}/telephony/twilio/status");

    let sid = twilio
        .create_call(&request.to, &request.from, &answer_url, &status_url)
        .await
        .map_err(|e| ServerError::Upstream(e.to_string()))?;
    call.carrier.insert("carrier_call_sid".to_string(), sid.clone());

    state
        .store
        .upsert_call(&call)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    tracing::info!(call_id = %call.id, carrier_call_sid = %sid, "outbound call initiated");
    Ok(Json(serde_json::json!({
        "call_id": call.id,
        "carrier_call_sid": sid,
        "status": call.status.as_str(),
    })))
}

/// Live session snapshot for one call.
async fn get_session_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let handle = state
        .registry
        .lookup(&id)
        .ok_or_else(|| ServerError::NotFound(format!("no live session for call {id}")))?;
    let info = handle.info();

    Ok(Json(serde_json::json!({
        "call_id": info.call_id,
        "state": info.state.as_str(),
        "duration_secs": info.duration_secs,
        "message_count": info.message_count,
        "latency": {
            "stt_ms": info.latency.stt_ms,
            "llm_ms": info.latency.llm_ms,
            "tts_ms": info.latency.tts_ms,
        },
    })))
}

/// End a live session from the API.
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let handle = state
        .registry
        .lookup(&id)
        .ok_or_else(|| ServerError::NotFound(format!("no live session for call {id}")))?;
    handle.end(end_reason::API_REQUEST).await;
    Ok(StatusCode::NO_CONTENT)
}

fn xml_response(twiml: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/xml")], twiml)
}

/// Inbound ring: resolve the dialled number, create the Call, answer with
/// the media-bridge directive. Unknown numbers get a prompt and a hangup.
async fn twilio_inbound(
    State(state): State<AppState>,
    Form(inbound): Form<TwilioInbound>,
) -> Result<impl IntoResponse, ServerError> {
    let assistant = state
        .directory
        .for_number(&inbound.to)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let Some(assistant) = assistant else {
        tracing::warn!(to = %inbound.to, "inbound call to unconfigured number");
        return Ok(xml_response(twilio::reject_twiml(
            "This number is not configured to receive calls. Goodbye.",
        )));
    };

    let mut call = Call::new("default", &assistant.id, CallKind::Inbound, CallStatus::Ringing);
    call.from_number = Some(inbound.from.clone());
    call.to_number = Some(inbound.to.clone());
    call.carrier
        .insert("carrier_call_sid".to_string(), inbound.call_sid.clone());
    state
        .store
        .upsert_call(&call)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let token = state.tokens.mint(&call.id)?;
    let ws_url = state.media_ws_url(&call.id, &token);
    tracing::info!(call_id = %call.id, carrier_call_sid = %inbound.call_sid, "inbound call bridged");
    Ok(xml_response(twilio::stream_twiml(&ws_url)))
}

/// Outbound answer webhook: the callee picked up; bridge the media leg.
async fn twilio_answer(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let call = state
        .store
        .get_call(&call_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::NotFound(format!("call {call_id}")))?;

    let token = state.tokens.mint(&call.id)?;
    let ws_url = state.media_ws_url(&call.id, &token);
    Ok(xml_response(twilio::stream_twiml(&ws_url)))
}

/// Carrier status callback: keep the Call row in step and tear down the
/// session when the carrier reports a terminal state.
async fn twilio_status(
    State(state): State<AppState>,
    Form(status): Form<TwilioStatus>,
) -> Result<StatusCode, ServerError> {
    let Some(mapped) = twilio::map_call_status(&status.call_status) else {
        tracing::debug!(status = %status.call_status, "ignoring unmapped carrier status");
        return Ok(StatusCode::OK);
    };

    let call = state
        .store
        .find_by_carrier_sid(&status.call_sid)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let Some(call) = call else {
        tracing::warn!(carrier_call_sid = %status.call_sid, "status callback for unknown call");
        return Ok(StatusCode::OK);
    };

    if mapped.is_terminal() {
        if let Some(handle) = state.registry.lookup(&call.id) {
            handle.end(end_reason::CLIENT_DISCONNECT).await;
            return Ok(StatusCode::OK);
        }
    }

    // No live session (pre-answer, or already torn down): record the status.
    if let Err(e) = state.store.set_status(&call.id, mapped).await {
        tracing::warn!(call_id = %call.id, "failed to record carrier status: {}", e);
    }
    Ok(StatusCode::OK)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ready",
        "sessions": state.registry.count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_engine_config::{ProviderCredentials, Settings};

    #[test]
    fn router_builds() {
        let state = AppState::in_memory(Settings::default(), ProviderCredentials::default());
        let _ = create_router(state);
    }
}
