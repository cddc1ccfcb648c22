//! End-to-end session tests
//!
//! Drive a full session through scripted providers and a channel-backed
//! media sink: event ordering, endpointing, barge-in, the tool loop,
//! provider-failure recovery, and teardown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use voice_engine_core::audio::samples_to_bytes;
use voice_engine_core::{
    Assistant, Call, CallKind, CallStatus, ChatMessage, ChatRole, ClientCommand, EngineError,
    ServerEvent, ToolCall, ToolDefinition,
};
use voice_engine_engine::{
    end_reason, CallControl, MediaSink, RecordingWriter, Session, SessionConfig, SessionDeps,
    SessionHandle, SessionRegistry, TurnState,
};
use voice_engine_persistence::{CallStore, InMemoryStore};
use voice_engine_providers::{
    LanguageModel, LlmResponse, ProviderError, SpeechToText, TextToSpeech,
};
use voice_engine_tools::ToolExecutor;

// --- scripted providers -------------------------------------------------

struct ScriptedStt {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedStt {
    fn new(script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SpeechToText for ScriptedStt {
    async fn transcribe(&self, _pcm: &[u8]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Ok(String::new()))
    }

    fn provider(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedLlm {
    script: Mutex<VecDeque<LlmResponse>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(script: Vec<LlmResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn content(text: &str) -> LlmResponse {
        LlmResponse {
            content: text.to_string(),
            ..Default::default()
        }
    }

    fn tool(name: &str, arguments: serde_json::Value) -> LlmResponse {
        LlmResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: name.to_string(),
                arguments,
            }],
            usage: None,
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedLlm {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> Result<LlmResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().pop_front().unwrap_or_default())
    }

    fn provider(&self) -> &'static str {
        "scripted"
    }
}

struct FixedTts {
    bytes: usize,
}

#[async_trait]
impl TextToSpeech for FixedTts {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
        Ok(vec![0u8; self.bytes])
    }

    fn sample_rate(&self) -> u32 {
        24_000
    }

    fn provider(&self) -> &'static str {
        "fixed"
    }
}

// --- recording sink and control ----------------------------------------

#[derive(Default)]
struct RecordedSink {
    events: Mutex<Vec<ServerEvent>>,
    audio: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl RecordedSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.kind()).collect()
    }

    fn count(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

#[async_trait]
impl MediaSink for RecordedSink {
    async fn send_event(&self, event: ServerEvent) -> Result<(), EngineError> {
        self.events.lock().push(event);
        Ok(())
    }

    async fn send_audio(&self, pcm: Vec<u8>) -> Result<(), EngineError> {
        self.audio.lock().push(pcm);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct CapturingControl {
    transfers: Mutex<Vec<String>>,
    digits: Mutex<Vec<String>>,
}

#[async_trait]
impl CallControl for CapturingControl {
    async fn transfer(&self, destination: &str) -> Result<(), EngineError> {
        self.transfers.lock().push(destination.to_string());
        Ok(())
    }

    async fn hangup(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn send_digits(&self, digits: &str) -> Result<(), EngineError> {
        self.digits.lock().push(digits.to_string());
        Ok(())
    }
}

// --- harness ------------------------------------------------------------

struct Harness {
    handle: SessionHandle,
    sink: Arc<RecordedSink>,
    store: Arc<InMemoryStore>,
    control: Arc<CapturingControl>,
    registry: Arc<SessionRegistry>,
    call_id: String,
}

fn test_assistant() -> Assistant {
    let mut assistant = Assistant::named("asst-1", "Tester");
    assistant.silence_timeout_ms = 120;
    assistant.max_call_duration_secs = 600;
    assistant
}

fn spawn_session(
    assistant: Assistant,
    stt: Arc<ScriptedStt>,
    llm: Arc<ScriptedLlm>,
    tts_bytes: usize,
) -> Harness {
    let sink = RecordedSink::new();
    let store = InMemoryStore::new();
    let control = Arc::new(CapturingControl::default());
    let registry = SessionRegistry::new(16);

    let call = Call::new("org-1", &assistant.id, CallKind::Web, CallStatus::InProgress);
    let call_id = call.id.clone();

    let recordings = std::env::temp_dir().join(format!("ve-test-{call_id}"));

    let registry_for_end = registry.clone();
    let end_call_id = call_id.clone();
    let handle = Session::spawn(
        SessionConfig {
            call,
            assistant,
            egress_sample_rate: 24_000,
            silence_timeout_ceiling_ms: 1200,
            queue_depth: 64,
        },
        SessionDeps {
            stt: Box::new(stt),
            llm: Box::new(llm),
            tts: Box::new(FixedTts { bytes: tts_bytes }),
            tools: ToolExecutor::new(vec![]).unwrap(),
            sink: sink.clone(),
            control: control.clone(),
            store: store.clone(),
            recorder: RecordingWriter::new(recordings),
            on_end: Box::new(move |_| registry_for_end.deregister(&end_call_id)),
        },
    );
    registry.register(handle.clone()).unwrap();

    Harness {
        handle,
        sink,
        store,
        control,
        registry,
        call_id,
    }
}

fn voice_frame() -> Vec<u8> {
    samples_to_bytes(&vec![2000i16; 640])
}

fn silence_frame() -> Vec<u8> {
    samples_to_bytes(&vec![0i16; 640])
}

async fn wait_for_kind(sink: &RecordedSink, kind: &str, at_least: usize) {
    for _ in 0..400 {
        if sink.count(kind) >= at_least {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("event {kind} (x{at_least}) not observed; saw {:?}", sink.kinds());
}

/// Speak one utterance: a few voiced frames, then silence past the timeout.
async fn speak_utterance(handle: &SessionHandle) {
    for _ in 0..3 {
        handle.push_audio(voice_frame());
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.push_audio(silence_frame());
    tokio::time::sleep(Duration::from_millis(180)).await;
    handle.push_audio(silence_frame());
}

// --- scenarios ----------------------------------------------------------

#[tokio::test]
async fn happy_path_first_message_then_turn() {
    let mut assistant = test_assistant();
    assistant.first_message = Some("Hi.".to_string());

    let h = spawn_session(
        assistant,
        ScriptedStt::new(vec![Ok("what time is it".to_string())]),
        ScriptedLlm::new(vec![ScriptedLlm::content("It is 3 pm.")]),
        4800, // 100 ms at 24 kHz
    );

    // Greeting: message, audio, then the playback timer releases the turn.
    wait_for_kind(&h.sink, "assistant.audio.done", 1).await;
    assert_eq!(h.sink.kinds()[0], "call.started");
    assert_eq!(h.sink.count("assistant.message"), 1);
    assert_eq!(h.sink.audio.lock().len(), 1);

    // One user turn.
    speak_utterance(&h.handle).await;
    wait_for_kind(&h.sink, "assistant.audio.done", 2).await;

    let kinds = h.sink.kinds();
    let speech_started = kinds.iter().position(|k| *k == "speech.started").unwrap();
    let speech_ended = kinds.iter().position(|k| *k == "speech.ended").unwrap();
    let thinking = kinds.iter().position(|k| *k == "assistant.thinking").unwrap();
    let transcript = kinds.iter().position(|k| *k == "transcript.final").unwrap();
    assert!(speech_started < speech_ended);
    assert!(speech_ended < thinking);
    assert!(thinking < transcript);
    assert_eq!(h.sink.count("assistant.message"), 2);

    // Clean client end.
    h.handle.control(ClientCommand::End).await;
    h.handle.wait_ended().await;

    assert_eq!(h.sink.count("call.ended"), 1);
    assert_eq!(h.sink.kinds().last().copied(), Some("call.ended"));
    assert!(h.sink.closed.load(Ordering::SeqCst));
    assert_eq!(h.registry.count(), 0);

    // Persistence: greeting at t=0, then user turn, then reply.
    let messages = h.store.messages_for(&h.call_id).await.unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role, ChatRole::Assistant);
    assert_eq!(messages[0].content, "Hi.");
    assert_eq!(messages[0].timestamp_ms, 0);
    assert_eq!(messages[1].role, ChatRole::User);
    assert_eq!(messages[1].content, "what time is it");
    assert!(messages[1].latency.stt_ms.is_some());
    assert_eq!(messages[2].content, "It is 3 pm.");

    let call = h.store.get_call(&h.call_id).await.unwrap().unwrap();
    assert_eq!(call.status, CallStatus::Completed);
    assert_eq!(call.ended_reason.as_deref(), Some(end_reason::CLIENT_REQUEST));
    assert!(call.cost.is_some());
    assert!(call.user_recording_uri.is_some());
    assert!(call.assistant_recording_uri.is_some());
    assert_eq!(call.duration_secs, call.computed_duration_secs());
}

#[tokio::test]
async fn barge_in_interrupts_playback_and_recovers() {
    let mut assistant = test_assistant();
    assistant.first_message = Some("Let me tell you a very long story.".to_string());

    let h = spawn_session(
        assistant,
        ScriptedStt::new(vec![Ok("stop".to_string())]),
        ScriptedLlm::new(vec![ScriptedLlm::content("Okay.")]),
        96_000, // 2 s at 24 kHz; playback window far exceeds the test
    );

    wait_for_kind(&h.sink, "assistant.speaking", 1).await;

    // User talks over the assistant.
    h.handle.push_audio(voice_frame());
    wait_for_kind(&h.sink, "assistant.interrupted", 1).await;

    // No audio.done for the interrupted synthesis.
    assert_eq!(h.sink.count("assistant.audio.done"), 0);
    assert_eq!(h.handle.info().state, TurnState::Listening);
    {
        let events = h.sink.events.lock();
        let interrupted = events
            .iter()
            .find(|e| e.kind() == "assistant.interrupted")
            .unwrap();
        assert_eq!(
            interrupted.data()["clearAudio"],
            serde_json::Value::Bool(true)
        );
    }

    // The new utterance endpoints and gets a normal reply.
    speak_utterance(&h.handle).await;
    wait_for_kind(&h.sink, "transcript.final", 1).await;
    wait_for_kind(&h.sink, "assistant.audio.done", 1).await;
    assert_eq!(h.sink.count("assistant.message"), 2);

    h.handle.end(end_reason::API_REQUEST).await;
    h.handle.wait_ended().await;
}

#[tokio::test]
async fn transfer_tool_emits_events_and_patches_carrier() {
    let h = spawn_session(
        test_assistant(),
        ScriptedStt::new(vec![Ok("get me a human".to_string())]),
        ScriptedLlm::new(vec![ScriptedLlm::tool(
            "transferCall",
            json!({"destination": "+15551234"}),
        )]),
        4800,
    );

    speak_utterance(&h.handle).await;
    wait_for_kind(&h.sink, "transfer.started", 1).await;

    let kinds = h.sink.kinds();
    let called = kinds.iter().position(|k| *k == "tool.called").unwrap();
    let transfer = kinds.iter().position(|k| *k == "transfer.started").unwrap();
    assert!(called < transfer);
    // No synthesis on a transfer turn.
    assert_eq!(h.sink.count("assistant.speaking"), 0);
    assert_eq!(h.control.transfers.lock().as_slice(), ["+15551234"]);

    h.handle.end(end_reason::API_REQUEST).await;
    h.handle.wait_ended().await;
}

#[tokio::test]
async fn end_call_tool_terminates_session() {
    let h = spawn_session(
        test_assistant(),
        ScriptedStt::new(vec![Ok("goodbye".to_string())]),
        ScriptedLlm::new(vec![ScriptedLlm::tool("endCall", json!({"reason": "done"}))]),
        4800,
    );

    speak_utterance(&h.handle).await;
    h.handle.wait_ended().await;

    assert_eq!(h.sink.count("tool.called"), 1);
    assert_eq!(h.sink.count("call.ended"), 1);
    assert!(h.sink.closed.load(Ordering::SeqCst));

    let call = h.store.get_call(&h.call_id).await.unwrap().unwrap();
    assert_eq!(call.ended_reason.as_deref(), Some(end_reason::ASSISTANT_ENDED));
}

#[tokio::test]
async fn stt_failure_is_a_recoverable_turn() {
    let h = spawn_session(
        test_assistant(),
        ScriptedStt::new(vec![
            Err(ProviderError::Http {
                status: 500,
                body: "upstream".to_string(),
            }),
            Ok("hello again".to_string()),
        ]),
        ScriptedLlm::new(vec![ScriptedLlm::content("Hello!")]),
        4800,
    );

    // Failing turn: audio.done, no message, back to listening.
    speak_utterance(&h.handle).await;
    wait_for_kind(&h.sink, "assistant.audio.done", 1).await;
    assert_eq!(h.sink.count("assistant.message"), 0);
    assert_eq!(h.sink.count("transcript.final"), 0);
    assert_eq!(h.handle.info().state, TurnState::Listening);

    // The call continues and the next turn succeeds.
    speak_utterance(&h.handle).await;
    wait_for_kind(&h.sink, "transcript.final", 1).await;
    wait_for_kind(&h.sink, "assistant.message", 1).await;

    h.handle.end(end_reason::API_REQUEST).await;
    h.handle.wait_ended().await;
}

#[tokio::test]
async fn max_duration_ends_the_call() {
    let mut assistant = test_assistant();
    assistant.max_call_duration_secs = 1;

    let h = spawn_session(
        assistant,
        ScriptedStt::new(vec![]),
        ScriptedLlm::new(vec![]),
        4800,
    );

    tokio::time::timeout(Duration::from_secs(3), h.handle.wait_ended())
        .await
        .expect("session should end at max duration");

    let call = h.store.get_call(&h.call_id).await.unwrap().unwrap();
    assert_eq!(call.ended_reason.as_deref(), Some(end_reason::MAX_DURATION));
    assert_eq!(h.sink.count("call.ended"), 1);
}

#[tokio::test]
async fn empty_transcript_skips_the_llm() {
    let stt = ScriptedStt::new(vec![Ok(String::new())]);
    let llm = ScriptedLlm::new(vec![]);
    let h = spawn_session(test_assistant(), stt.clone(), llm.clone(), 4800);

    speak_utterance(&h.handle).await;
    wait_for_kind(&h.sink, "speech.ended", 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(stt.calls.load(Ordering::SeqCst), 1);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.sink.count("transcript.final"), 0);
    assert!(h.store.messages_for(&h.call_id).await.unwrap().is_empty());
    assert_eq!(h.handle.info().state, TurnState::Listening);

    h.handle.end(end_reason::API_REQUEST).await;
    h.handle.wait_ended().await;
}

#[tokio::test]
async fn silence_timeout_is_capped_at_ceiling() {
    let mut assistant = test_assistant();
    assistant.silence_timeout_ms = 5000;

    let h = spawn_session(
        assistant,
        ScriptedStt::new(vec![Ok("capped".to_string())]),
        ScriptedLlm::new(vec![ScriptedLlm::content("Yes.")]),
        4800,
    );

    h.handle.push_audio(voice_frame());
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.handle.push_audio(silence_frame());
    // Past the 1200 ms ceiling, nowhere near the configured 5 s.
    tokio::time::sleep(Duration::from_millis(1400)).await;
    h.handle.push_audio(silence_frame());

    wait_for_kind(&h.sink, "speech.ended", 1).await;
    wait_for_kind(&h.sink, "transcript.final", 1).await;

    h.handle.end(end_reason::API_REQUEST).await;
    h.handle.wait_ended().await;
}

#[tokio::test]
async fn end_is_idempotent() {
    let h = spawn_session(
        test_assistant(),
        ScriptedStt::new(vec![]),
        ScriptedLlm::new(vec![]),
        4800,
    );

    h.handle.end(end_reason::API_REQUEST).await;
    h.handle.end(end_reason::CLIENT_REQUEST).await;
    h.handle.control(ClientCommand::End).await;
    h.handle.wait_ended().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.sink.count("call.ended"), 1);
    let call = h.store.get_call(&h.call_id).await.unwrap().unwrap();
    assert_eq!(call.ended_reason.as_deref(), Some(end_reason::API_REQUEST));
}

#[tokio::test]
async fn tool_results_feed_a_second_generation() {
    // Tool round (dtmf) followed by a content round.
    let llm = ScriptedLlm::new(vec![
        ScriptedLlm::tool("pressDigits", json!({"digits": "12#"})),
        ScriptedLlm::content("Pressed."),
    ]);
    let h = spawn_session(
        test_assistant(),
        ScriptedStt::new(vec![Ok("press one two pound".to_string())]),
        llm.clone(),
        4800,
    );

    speak_utterance(&h.handle).await;
    wait_for_kind(&h.sink, "assistant.message", 1).await;

    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.sink.count("tool.called"), 1);
    assert_eq!(h.sink.count("tool.result"), 1);
    assert_eq!(h.control.digits.lock().as_slice(), ["12#"]);

    // The tool result was persisted between the two generations.
    let messages = h.store.messages_for(&h.call_id).await.unwrap();
    let tool_msg = messages.iter().find(|m| m.role == ChatRole::Tool).unwrap();
    assert_eq!(tool_msg.tool_name.as_deref(), Some("pressDigits"));

    h.handle.end(end_reason::API_REQUEST).await;
    h.handle.wait_ended().await;
}
