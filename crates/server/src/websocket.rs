//! Media WebSocket
//!
//! One socket per call: binary frames are raw PCM, text frames are JSON
//! control messages. The socket task only pumps bytes; every decision
//! happens on the session actor, reached through its command queue so frame
//! order is preserved and back-pressure reaches the client.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;

use voice_engine_core::{
    ClientCommand, EngineError, ServerEvent, EGRESS_SAMPLE_RATE_TELEPHONY, EGRESS_SAMPLE_RATE_WEB,
};
use voice_engine_engine::{
    CallControl, MediaSink, NoopCallControl, Session, SessionConfig, SessionDeps,
};
use voice_engine_persistence::{AssistantDirectory, CallStore};
use voice_engine_providers::{llm_for, stt_for, tts_for};
use voice_engine_telephony::TwilioCallControl;
use voice_engine_tools::ToolExecutor;

use crate::state::AppState;
use crate::ServerError;

/// Maximum WebSocket frame size (1 MiB).
const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    token: String,
}

/// `MediaSink` over the write half of the call's WebSocket.
struct WsMediaSink {
    sender: Arc<Mutex<SplitSink<WebSocket, Message>>>,
}

#[async_trait]
impl MediaSink for WsMediaSink {
    async fn send_event(&self, event: ServerEvent) -> Result<(), EngineError> {
        let wire = event.to_wire(chrono::Utc::now().timestamp_millis());
        self.sender
            .lock()
            .await
            .send(Message::Text(wire.to_string()))
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))
    }

    async fn send_audio(&self, pcm: Vec<u8>) -> Result<(), EngineError> {
        self.sender
            .lock()
            .await
            .send(Message::Binary(pcm))
            .await
            .map_err(|e| EngineError::Transport(e.to_string()))
    }

    async fn close(&self) {
        let _ = self.sender.lock().await.send(Message::Close(None)).await;
    }
}

/// Upgrade handler for `/ws/{call_id}?token=…`.
///
/// Token, call, assistant, and provider construction are all checked before
/// the upgrade so failures surface as plain HTTP statuses.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Query(query): Query<MediaQuery>,
) -> Result<Response, ServerError> {
    state.tokens.verify(&query.token, &call_id)?;

    let call = state
        .store
        .get_call(&call_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::NotFound(format!("call {call_id}")))?;

    if state.registry.lookup(&call_id).is_some() {
        return Err(ServerError::Conflict(format!(
            "call {call_id} already has a live session"
        )));
    }

    let assistant = state
        .directory
        .get(&call.assistant_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::NotFound(format!("assistant {}", call.assistant_id)))?;

    let egress_rate = match call.kind {
        voice_engine_core::CallKind::Web => EGRESS_SAMPLE_RATE_WEB,
        _ => EGRESS_SAMPLE_RATE_TELEPHONY,
    };

    let stt = stt_for(&assistant.transcriber, &state.credentials)
        .map_err(|e| ServerError::Upstream(e.to_string()))?;
    let llm = llm_for(&assistant.model, &state.credentials)
        .map_err(|e| ServerError::Upstream(e.to_string()))?;
    let tts = tts_for(&assistant.voice, &state.credentials, egress_rate)
        .map_err(|e| ServerError::Upstream(e.to_string()))?;
    let tools = ToolExecutor::new(assistant.tools.clone())
        .map_err(|e| ServerError::Validation(e.to_string()))?;

    let control: Arc<dyn CallControl> = match (
        &state.twilio,
        call.carrier.get("carrier_call_sid"),
    ) {
        (Some(twilio), Some(sid)) => TwilioCallControl::new(twilio.clone(), sid.clone()),
        _ => Arc::new(NoopCallControl),
    };

    let config = SessionConfig {
        call,
        assistant,
        egress_sample_rate: egress_rate,
        silence_timeout_ceiling_ms: state.settings.session.silence_timeout_ceiling_ms,
        queue_depth: state.settings.session.max_queue_depth,
    };

    Ok(ws
        .max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| {
            run_media_socket(socket, state, config, stt, llm, tts, tools, control)
        }))
}

#[allow(clippy::too_many_arguments)]
async fn run_media_socket(
    socket: WebSocket,
    state: AppState,
    config: SessionConfig,
    stt: Box<dyn voice_engine_providers::SpeechToText>,
    llm: Box<dyn voice_engine_providers::LanguageModel>,
    tts: Box<dyn voice_engine_providers::TextToSpeech>,
    tools: ToolExecutor,
    control: Arc<dyn CallControl>,
) {
    let call_id = config.call.id.clone();
    let (sender, mut receiver) = socket.split();
    let sink = Arc::new(WsMediaSink {
        sender: Arc::new(Mutex::new(sender)),
    });

    let registry = state.registry.clone();
    let deregister_id = call_id.clone();
    let handle = Session::spawn(
        config,
        SessionDeps {
            stt,
            llm,
            tts,
            tools,
            sink: sink.clone(),
            control,
            store: state.store.clone(),
            recorder: state.recorder.clone(),
            on_end: Box::new(move |_| registry.deregister(&deregister_id)),
        },
    );

    if let Err(e) = state.registry.register(handle.clone()) {
        tracing::warn!(call_id = %call_id, "session rejected: {}", e);
        let _ = sink
            .send_event(ServerEvent::Error {
                code: "session-rejected".to_string(),
                message: e.to_string(),
            })
            .await;
        sink.close().await;
        handle.end(voice_engine_engine::end_reason::CLIENT_DISCONNECT).await;
        return;
    }

    // Socket pump: strictly in arrival order into the session queue.
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(frame)) => handle.push_audio(frame),
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(cmd) => handle.control(cmd).await,
                Err(e) => {
                    tracing::debug!(call_id = %call_id, "ignoring malformed control message: {}", e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(call_id = %call_id, "websocket error: {}", e);
                break;
            }
        }
    }

    handle.socket_closed().await;
    handle.wait_ended().await;
    tracing::info!(call_id = %call_id, "media socket closed");
}
