//! Session orchestrator
//!
//! One actor task per call. Every handler (audio frame, control message,
//! playback tick, max-duration tick, end) runs on that task, so session
//! state never needs a lock on the hot path; a small shared snapshot backs
//! the management endpoints.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use voice_engine_core::audio::pcm_duration_ms;
use voice_engine_core::cost::cost_for_duration;
use voice_engine_core::{
    Assistant, Call, CallMessage, CallStatus, ChatMessage, ChatRole, ClientCommand,
    FirstMessageMode, ServerEvent, ToolCall, ToolDefinition, TurnLatency,
};
use voice_engine_persistence::CallStore;
use voice_engine_providers::{LanguageModel, SpeechToText, TextToSpeech};
use voice_engine_tools::ToolExecutor;

use crate::end_reason;
use crate::recording::RecordingWriter;
use crate::sink::{CallControl, MediaSink};
use crate::turn::TurnState;
use crate::vad::VoiceActivityDetector;

/// Input buffer hard cap; one very long utterance should not exhaust memory.
const MAX_INPUT_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Bound on consecutive tool rounds within one user turn.
const MAX_TOOL_ROUNDS: usize = 8;

/// Minimum playback window regardless of synthesized duration, ms.
const MIN_PLAYBACK_MS: u64 = 500;

/// Slack added on top of the computed playback duration, ms.
const PLAYBACK_PADDING_MS: u64 = 200;

/// Static session parameters.
pub struct SessionConfig {
    pub call: Call,
    pub assistant: Assistant,
    pub egress_sample_rate: u32,
    /// Hard ceiling applied to the assistant's silence timeout, ms.
    pub silence_timeout_ceiling_ms: u64,
    /// Depth of the command queue feeding the actor.
    pub queue_depth: usize,
}

/// Everything the actor talks to.
pub struct SessionDeps {
    pub stt: Box<dyn SpeechToText>,
    pub llm: Box<dyn LanguageModel>,
    pub tts: Box<dyn TextToSpeech>,
    pub tools: ToolExecutor,
    pub sink: Arc<dyn MediaSink>,
    pub control: Arc<dyn CallControl>,
    pub store: Arc<dyn CallStore>,
    pub recorder: RecordingWriter,
    /// Invoked exactly once, after teardown completes; deregistration
    /// happens here so it is always the final step.
    pub on_end: Box<dyn FnOnce(&str) + Send + Sync>,
}

/// Commands multiplexed onto the actor queue.
#[derive(Debug)]
pub enum SessionCommand {
    Audio(Vec<u8>),
    Control(ClientCommand),
    SocketClosed,
    End { reason: String },
}

/// Rolling latency sums for the info endpoint.
#[derive(Debug, Default, Clone, Copy)]
struct LatencyStats {
    stt_ms: u64,
    stt_n: u64,
    llm_ms: u64,
    llm_n: u64,
    tts_ms: u64,
    tts_n: u64,
}

/// Averages surfaced by `SessionHandle::info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyAverages {
    pub stt_ms: u64,
    pub llm_ms: u64,
    pub tts_ms: u64,
}

/// Live session snapshot.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub call_id: String,
    pub state: TurnState,
    pub duration_secs: u64,
    pub message_count: usize,
    pub latency: LatencyAverages,
}

struct SessionShared {
    call_id: String,
    state: RwLock<TurnState>,
    message_count: RwLock<usize>,
    latency: Mutex<LatencyStats>,
    started: Instant,
    ended: AtomicBool,
    done: Notify,
}

impl SessionShared {
    fn record_stt(&self, ms: u64) {
        let mut l = self.latency.lock();
        l.stt_ms += ms;
        l.stt_n += 1;
    }
    fn record_llm(&self, ms: u64) {
        let mut l = self.latency.lock();
        l.llm_ms += ms;
        l.llm_n += 1;
    }
    fn record_tts(&self, ms: u64) {
        let mut l = self.latency.lock();
        l.tts_ms += ms;
        l.tts_n += 1;
    }

    fn averages(&self) -> LatencyAverages {
        let l = *self.latency.lock();
        LatencyAverages {
            stt_ms: if l.stt_n > 0 { l.stt_ms / l.stt_n } else { 0 },
            llm_ms: if l.llm_n > 0 { l.llm_ms / l.llm_n } else { 0 },
            tts_ms: if l.tts_n > 0 { l.tts_ms / l.tts_n } else { 0 },
        }
    }
}

/// Cloneable handle to a live session.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn call_id(&self) -> &str {
        &self.shared.call_id
    }

    /// Enqueue one binary audio frame. Frames are dropped (with a warning)
    /// when the session queue is full; back-pressure belongs at the socket.
    pub fn push_audio(&self, frame: Vec<u8>) {
        if let Err(e) = self.cmd_tx.try_send(SessionCommand::Audio(frame)) {
            tracing::warn!(call_id = %self.shared.call_id, "audio frame dropped: {}", e);
        }
    }

    /// Enqueue a parsed client control message.
    pub async fn control(&self, cmd: ClientCommand) {
        let _ = self.cmd_tx.send(SessionCommand::Control(cmd)).await;
    }

    /// Signal that the transport closed underneath the session.
    pub async fn socket_closed(&self) {
        let _ = self.cmd_tx.send(SessionCommand::SocketClosed).await;
    }

    /// Request session end; idempotent on the actor side.
    pub async fn end(&self, reason: &str) {
        let _ = self
            .cmd_tx
            .send(SessionCommand::End {
                reason: reason.to_string(),
            })
            .await;
    }

    pub fn is_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Acquire)
    }

    /// Resolve once teardown has completed.
    pub async fn wait_ended(&self) {
        loop {
            let notified = self.shared.done.notified();
            if self.is_ended() {
                return;
            }
            notified.await;
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            call_id: self.shared.call_id.clone(),
            state: *self.shared.state.read(),
            duration_secs: self.shared.started.elapsed().as_secs(),
            message_count: *self.shared.message_count.read(),
            latency: self.shared.averages(),
        }
    }
}

/// One live call.
pub struct Session;

impl Session {
    /// Spawn the session actor and return its handle.
    ///
    /// The actor runs until `end()` fires for any reason; teardown
    /// finalises the call row, flushes recordings, closes the sink and then
    /// invokes `on_end`.
    pub fn spawn(config: SessionConfig, deps: SessionDeps) -> SessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.queue_depth.max(8));

        let shared = Arc::new(SessionShared {
            call_id: config.call.id.clone(),
            state: RwLock::new(TurnState::Idle),
            message_count: RwLock::new(0),
            latency: Mutex::new(LatencyStats::default()),
            started: Instant::now(),
            ended: AtomicBool::new(false),
            done: Notify::new(),
        });

        let handle = SessionHandle {
            cmd_tx,
            shared: shared.clone(),
        };

        let actor = SessionActor::new(config, deps, shared, cmd_rx);
        tokio::spawn(actor.run());

        handle
    }
}

struct SessionActor {
    call: Call,
    assistant: Assistant,
    egress_rate: u32,
    silence_ceiling_ms: u64,

    stt: Box<dyn SpeechToText>,
    llm: Box<dyn LanguageModel>,
    tts: Box<dyn TextToSpeech>,
    tools: ToolExecutor,
    tool_defs: Vec<ToolDefinition>,
    sink: Arc<dyn MediaSink>,
    control: Arc<dyn CallControl>,
    store: Arc<dyn CallStore>,
    recorder: RecordingWriter,
    on_end: Option<Box<dyn FnOnce(&str) + Send + Sync>>,

    shared: Arc<SessionShared>,
    rx: mpsc::Receiver<SessionCommand>,

    state: TurnState,
    history: Vec<ChatMessage>,
    input_buf: Vec<u8>,
    user_rec: Vec<u8>,
    assistant_rec: Vec<u8>,
    is_speaking: bool,
    silence_start: Option<Instant>,
    synthesis_id: u64,
    playback_deadline: Option<(Instant, u64)>,
    max_deadline: Instant,
    vad: VoiceActivityDetector,
    ended: bool,
    end_reason: String,
}

impl SessionActor {
    fn new(
        config: SessionConfig,
        deps: SessionDeps,
        shared: Arc<SessionShared>,
        rx: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        let tool_defs = deps.tools.definitions();
        let vad = VoiceActivityDetector::from_sensitivity(config.assistant.endpointing_sensitivity);
        let max_deadline = Instant::now()
            + std::time::Duration::from_secs(config.assistant.max_call_duration_secs.max(1));
        let history = vec![ChatMessage::system(config.assistant.system_prompt.clone())];

        Self {
            call: config.call,
            assistant: config.assistant,
            egress_rate: config.egress_sample_rate,
            silence_ceiling_ms: config.silence_timeout_ceiling_ms,
            stt: deps.stt,
            llm: deps.llm,
            tts: deps.tts,
            tools: deps.tools,
            tool_defs,
            sink: deps.sink,
            control: deps.control,
            store: deps.store,
            recorder: deps.recorder,
            on_end: Some(deps.on_end),
            shared,
            rx,
            state: TurnState::Idle,
            history,
            input_buf: Vec::new(),
            user_rec: Vec::new(),
            assistant_rec: Vec::new(),
            is_speaking: false,
            silence_start: None,
            synthesis_id: 0,
            playback_deadline: None,
            max_deadline,
            vad,
            ended: false,
            end_reason: String::new(),
        }
    }

    async fn run(mut self) {
        self.start().await;

        while !self.ended {
            let playback_at = self.playback_deadline.map(|(at, _)| at);
            tokio::select! {
                maybe_cmd = self.rx.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => self.end(end_reason::CLIENT_DISCONNECT).await,
                },
                _ = tokio::time::sleep_until(self.max_deadline) => {
                    self.end(end_reason::MAX_DURATION).await;
                }
                _ = maybe_sleep(playback_at) => {
                    self.on_playback_done().await;
                }
            }
        }

        let reason = self.end_reason.clone();
        if let Some(on_end) = self.on_end.take() {
            on_end(&reason);
        }

        // Deregistration (inside on_end) is the last teardown step; only
        // now does the session report ended to waiters.
        self.shared.ended.store(true, Ordering::Release);
        self.shared.done.notify_waiters();
    }

    async fn start(&mut self) {
        self.call.status = CallStatus::InProgress;
        self.call.started_at = Some(Utc::now());
        if let Err(e) = self.store.upsert_call(&self.call).await {
            tracing::warn!(call_id = %self.call.id, "failed to mark call in-progress: {}", e);
        }

        self.emit(ServerEvent::CallStarted {
            call_id: self.call.id.clone(),
            assistant_id: self.assistant.id.clone(),
            assistant_name: self.assistant.name.clone(),
        })
        .await;

        self.set_state(TurnState::Listening);

        let first = self.assistant.first_message.clone().filter(|m| {
            !m.is_empty() && self.assistant.first_message_mode == FirstMessageMode::AssistantSpeaksFirst
        });

        if let Some(text) = first {
            self.history.push(ChatMessage::assistant(text.clone()));
            self.emit(ServerEvent::AssistantMessage { text: text.clone() }).await;
            self.persist_message(
                CallMessage::new(&self.call.id, ChatRole::Assistant, &text, 0),
            )
            .await;
            self.synthesize_and_play(&text).await;
        }

        tracing::info!(call_id = %self.call.id, assistant = %self.assistant.name, "session started");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        if self.state.is_terminal() {
            return;
        }
        match cmd {
            SessionCommand::Audio(frame) => self.handle_audio(frame).await,
            SessionCommand::Control(ClientCommand::End) => {
                self.end(end_reason::CLIENT_REQUEST).await
            }
            SessionCommand::Control(ClientCommand::Interrupt) => self.handle_interrupt().await,
            SessionCommand::Control(ClientCommand::Config { .. }) => {
                // Reserved for client-side renegotiation.
            }
            SessionCommand::SocketClosed => self.end(end_reason::CLIENT_DISCONNECT).await,
            SessionCommand::End { reason } => self.end(&reason).await,
        }
    }

    async fn handle_audio(&mut self, frame: Vec<u8>) {
        self.user_rec.extend_from_slice(&frame);

        if self.state == TurnState::Speaking && self.assistant.interruption_enabled {
            if self.vad.has_voice(&frame) {
                self.handle_interrupt().await;
                self.buffer_input(&frame);
                self.is_speaking = true;
                self.silence_start = None;
                self.emit(ServerEvent::SpeechStarted).await;
            }
            return;
        }

        self.buffer_input(&frame);

        if self.vad.has_voice(&frame) {
            if !self.is_speaking {
                self.emit(ServerEvent::SpeechStarted).await;
            }
            self.is_speaking = true;
            self.silence_start = None;
            if self.state == TurnState::Idle {
                self.set_state(TurnState::Listening);
            }
        } else if self.is_speaking {
            let now = Instant::now();
            let onset = match self.silence_start {
                Some(at) => at,
                None => {
                    tracing::debug!(call_id = %self.call.id, "endpointing: silence onset");
                    self.silence_start = Some(now);
                    now
                }
            };
            let timeout_ms = self
                .assistant
                .silence_timeout_ms
                .min(self.silence_ceiling_ms);
            if now.duration_since(onset).as_millis() as u64 > timeout_ms {
                self.is_speaking = false;
                self.silence_start = None;
                // With interruption disabled, speech buffered during
                // playback is discarded when the playback window closes;
                // only a listening session starts a turn.
                if self.state == TurnState::Listening {
                    self.emit(ServerEvent::SpeechEnded).await;
                    self.process_user_speech().await;
                }
            }
        }
    }

    fn buffer_input(&mut self, frame: &[u8]) {
        if self.input_buf.len() + frame.len() > MAX_INPUT_BUFFER_BYTES {
            tracing::warn!(call_id = %self.call.id, "input buffer full; dropping audio");
            return;
        }
        self.input_buf.extend_from_slice(frame);
    }

    async fn process_user_speech(&mut self) {
        let audio = std::mem::take(&mut self.input_buf);

        self.emit(ServerEvent::AssistantThinking).await;
        self.set_state(TurnState::Thinking);

        let started = Instant::now();
        let transcript = match self.stt.transcribe(&audio).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(call_id = %self.call.id, "stt failed, turn dropped: {}", e);
                self.emit(ServerEvent::AssistantAudioDone).await;
                self.set_state(TurnState::Listening);
                return;
            }
        };
        let stt_ms = started.elapsed().as_millis() as u64;
        self.shared.record_stt(stt_ms);

        if transcript.is_empty() {
            self.set_state(TurnState::Listening);
            return;
        }

        self.emit(ServerEvent::TranscriptFinal {
            text: transcript.clone(),
        })
        .await;
        self.history.push(ChatMessage::user(transcript.clone()));
        self.persist_message(
            CallMessage::new(&self.call.id, ChatRole::User, &transcript, self.elapsed_ms())
                .with_latency(TurnLatency {
                    stt_ms: Some(stt_ms),
                    ..Default::default()
                }),
        )
        .await;

        self.generate_response().await;
    }

    async fn generate_response(&mut self) {
        for round in 0..MAX_TOOL_ROUNDS {
            let started = Instant::now();
            let response = match self.llm.generate(&self.history, &self.tool_defs).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(call_id = %self.call.id, "llm failed, turn dropped: {}", e);
                    self.emit(ServerEvent::AssistantAudioDone).await;
                    self.set_state(TurnState::Listening);
                    return;
                }
            };
            let llm_ms = started.elapsed().as_millis() as u64;
            self.shared.record_llm(llm_ms);

            if response.has_tool_calls() {
                // The originating assistant message precedes its tool
                // results in the history.
                self.history.push(ChatMessage::assistant_with_tools(
                    response.content.clone(),
                    response.tool_calls.clone(),
                ));

                let finished = self.run_tool_calls(&response.tool_calls).await;
                if finished {
                    // Transfer turns release the floor; an ended session is
                    // already terminal.
                    if !self.ended {
                        self.set_state(TurnState::Listening);
                    }
                    return;
                }
                tracing::debug!(call_id = %self.call.id, round, "re-invoking llm with tool results");
                continue;
            }

            if !response.content.is_empty() {
                self.history.push(ChatMessage::assistant(response.content.clone()));
                self.emit(ServerEvent::AssistantMessage {
                    text: response.content.clone(),
                })
                .await;
                self.persist_message(
                    CallMessage::new(
                        &self.call.id,
                        ChatRole::Assistant,
                        &response.content,
                        self.elapsed_ms(),
                    )
                    .with_latency(TurnLatency {
                        llm_ms: Some(llm_ms),
                        ..Default::default()
                    }),
                )
                .await;
                self.synthesize_and_play(&response.content).await;
            } else {
                self.set_state(TurnState::Listening);
            }
            return;
        }

        tracing::warn!(call_id = %self.call.id, "tool loop exceeded {} rounds", MAX_TOOL_ROUNDS);
        self.set_state(TurnState::Listening);
    }

    /// Execute one batch of tool calls. Returns true when the turn is
    /// finished (call ended or transfer started) and generation must stop.
    async fn run_tool_calls(&mut self, calls: &[ToolCall]) -> bool {
        for call in calls {
            self.emit(ServerEvent::ToolCalled {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .await;

            if call.name == "endCall" {
                self.end(end_reason::ASSISTANT_ENDED).await;
                return true;
            }

            if call.name == "transferCall" {
                let destination = call
                    .arguments
                    .get("destination")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string();
                self.emit(ServerEvent::TransferStarted {
                    destination: destination.clone(),
                })
                .await;
                if let Err(e) = self.control.transfer(&destination).await {
                    tracing::warn!(call_id = %self.call.id, "carrier transfer failed: {}", e);
                }
                return true;
            }

            let result = self.tools.execute(&call.name, call.arguments.clone()).await;

            if result.get("action").and_then(|a| a.as_str()) == Some("dtmf") {
                let digits = result
                    .get("digits")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default();
                if let Err(e) = self.control.send_digits(digits).await {
                    tracing::warn!(call_id = %self.call.id, "dtmf failed: {}", e);
                }
            }

            self.emit(ServerEvent::ToolResult {
                name: call.name.clone(),
                result: result.clone(),
            })
            .await;

            let content = result.to_string();
            self.history
                .push(ChatMessage::tool_result(call.id.clone(), content.clone()));
            self.persist_message(
                CallMessage::new(&self.call.id, ChatRole::Tool, content, self.elapsed_ms())
                    .with_tool(
                        call.name.clone(),
                        Some(call.arguments.clone()),
                        Some(result),
                    ),
            )
            .await;
        }
        false
    }

    async fn synthesize_and_play(&mut self, text: &str) {
        self.set_state(TurnState::Speaking);
        self.synthesis_id += 1;
        let sid = self.synthesis_id;

        let started = Instant::now();
        let audio = match self.tts.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(call_id = %self.call.id, "tts failed, turn dropped: {}", e);
                self.emit(ServerEvent::AssistantAudioDone).await;
                if self.state == TurnState::Speaking {
                    self.set_state(TurnState::Listening);
                }
                return;
            }
        };
        let tts_ms = started.elapsed().as_millis() as u64;

        // Interrupted while the request was in flight: the audio belongs to
        // a stale generation and must not reach the client.
        if self.state != TurnState::Speaking || self.synthesis_id != sid {
            tracing::debug!(call_id = %self.call.id, sid, "discarding superseded synthesis");
            return;
        }
        self.shared.record_tts(tts_ms);

        self.emit(ServerEvent::AssistantSpeaking).await;
        if let Err(e) = self.sink.send_audio(audio.clone()).await {
            tracing::warn!(call_id = %self.call.id, "audio send failed: {}", e);
        }
        self.assistant_rec.extend_from_slice(&audio);

        let duration_ms = pcm_duration_ms(audio.len(), self.egress_rate);
        let delay_ms = MIN_PLAYBACK_MS.max(duration_ms + PLAYBACK_PADDING_MS);
        self.playback_deadline =
            Some((Instant::now() + std::time::Duration::from_millis(delay_ms), sid));
    }

    async fn on_playback_done(&mut self) {
        let Some((_, sid)) = self.playback_deadline.take() else {
            return;
        };
        if self.state == TurnState::Speaking && self.synthesis_id == sid {
            self.set_state(TurnState::Listening);
            self.is_speaking = false;
            self.input_buf.clear();
            self.emit(ServerEvent::AssistantAudioDone).await;
        }
    }

    async fn handle_interrupt(&mut self) {
        if self.state != TurnState::Speaking {
            return;
        }
        // Invalidates any in-flight synthesis and the pending playback tick.
        self.synthesis_id += 1;
        self.playback_deadline = None;
        self.set_state(TurnState::Listening);
        self.emit(ServerEvent::AssistantInterrupted {
            clear_audio: true,
            reason: "user-speech".to_string(),
        })
        .await;
        self.input_buf.clear();
    }

    async fn end(&mut self, reason: &str) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.end_reason = reason.to_string();

        let ended_at = Utc::now();
        self.call.status = CallStatus::Completed;
        self.call.ended_at = Some(ended_at);
        self.call.ended_reason = Some(reason.to_string());
        let duration = self.call.computed_duration_secs().unwrap_or(0);
        self.call.duration_secs = Some(duration);
        let cost = cost_for_duration(duration);
        self.call.cost = Some(cost);

        if let Err(e) = self.store.upsert_call(&self.call).await {
            tracing::error!(call_id = %self.call.id, "failed to finalise call row: {}", e);
        }

        self.emit(ServerEvent::CallEnded {
            reason: reason.to_string(),
            duration_secs: duration,
            cost,
        })
        .await;

        match self
            .recorder
            .write(&self.call.id, &self.user_rec, &self.assistant_rec)
            .await
        {
            Ok((user_uri, assistant_uri)) => {
                self.call.user_recording_uri = Some(user_uri);
                self.call.assistant_recording_uri = Some(assistant_uri);
                if let Err(e) = self.store.upsert_call(&self.call).await {
                    tracing::error!(call_id = %self.call.id, "failed to store recording uris: {}", e);
                }
            }
            Err(e) => {
                tracing::error!(call_id = %self.call.id, "failed to write recordings: {}", e);
            }
        }

        self.sink.close().await;
        self.set_state(TurnState::Terminated);

        tracing::info!(call_id = %self.call.id, reason, duration, "session ended");
    }

    fn set_state(&mut self, next: TurnState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition(next) {
            tracing::warn!(
                call_id = %self.call.id,
                "rejected state transition {} -> {}",
                self.state,
                next
            );
            return;
        }
        self.state = next;
        *self.shared.state.write() = next;
    }

    async fn emit(&self, event: ServerEvent) {
        if let Err(e) = self.sink.send_event(event).await {
            tracing::debug!(call_id = %self.call.id, "event send failed: {}", e);
        }
    }

    async fn persist_message(&self, message: CallMessage) {
        *self.shared.message_count.write() += 1;
        if let Err(e) = self.store.append_message(&message).await {
            tracing::warn!(call_id = %self.call.id, "failed to persist message: {}", e);
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.shared.started.elapsed().as_millis() as u64
    }
}

async fn maybe_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
