//! Inbound event dispatch and the user's conversation actions.
//!
//! [`Console`] owns everything the user sees (form and transcript) plus the
//! assistant registry. It never touches the network or the audio devices:
//! each operation mutates the view and returns the [`Command`]s the runtime
//! must execute, in order.

use crate::{
    Command,
    assistants::AssistantService,
    audio_utils,
    form::{Control, Form, GENERIC_ASSISTANT_LABEL, InputState},
    transcript::Transcript,
};
use openai_realtime_types::{
    ClientEvent, InputAudioTranscription, Item, ItemType, Response, ServerEvent, SessionConfig,
    TurnDetection,
};
use tracing::{debug, info, warn};

pub const SESSION_STARTED_MARKER: &str = "<< Session Started >>";
pub const CONNECTION_ERROR_MESSAGE: &str = "[Connection error]: Unable to send initial set_inference_config message. Please check your endpoint and authentication details.";
pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Lifecycle of the realtime session, as seen by the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closed,
}

#[derive(Debug)]
pub struct Console {
    pub form: Form,
    pub transcript: Transcript,
    pub assistants: AssistantService,
    state: SessionState,
    latest_input_speech: Option<usize>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(Form::default())
    }
}

impl Console {
    pub fn new(form: Form) -> Self {
        let assistants = AssistantService::new(form.language.clone());
        Self {
            form,
            transcript: Transcript::new(),
            assistants,
            state: SessionState::Idle,
            latest_input_speech: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Enters the connecting state and builds the initial `session.update`:
    /// server VAD, whisper transcription, and the generic assistant for the
    /// selected language, voice and temperature.
    pub fn begin_start(&mut self) -> ClientEvent {
        self.form.set_input_state(InputState::Working);
        self.state = SessionState::Connecting;
        self.latest_input_speech = None;

        self.assistants.language = self.form.language.clone();
        let (instructions, tools) = self.assistants.create_generic_assistant_config();
        self.form.assistant = GENERIC_ASSISTANT_LABEL.to_string();

        ClientEvent::SessionUpdate {
            session: SessionConfig {
                turn_detection: Some(TurnDetection::server_vad()),
                input_audio_transcription: Some(InputAudioTranscription {
                    model: TRANSCRIPTION_MODEL.to_string(),
                }),
                instructions: Some(instructions),
                tools: Some(tools),
                voice: Some(self.form.voice),
                temperature: Some(self.form.temperature),
                ..Default::default()
            },
        }
    }

    /// The connection or the initial configuration failed. No retry.
    pub fn start_failed(&mut self) {
        self.transcript.new_block(CONNECTION_ERROR_MESSAGE);
        self.state = SessionState::Closed;
        self.form.set_input_state(InputState::ReadyToStart);
    }

    pub fn begin_stop(&mut self) {
        self.form.set_input_state(InputState::Working);
    }

    /// The session is gone, after a stop or because the event stream ended.
    pub fn session_closed(&mut self) {
        self.state = SessionState::Closed;
        self.latest_input_speech = None;
        self.form.set_input_state(InputState::ReadyToStart);
    }

    /// Applies one inbound event to the view.
    pub fn handle_event(&mut self, event: ServerEvent) -> Vec<Command> {
        let mut commands = Vec::new();
        let kind = event.kind();
        match event {
            ServerEvent::SessionCreated { session } => {
                info!(session_id = ?session.id, "Session created");
                self.state = SessionState::Active;
                self.form.set_input_state(InputState::ReadyToStop);
                self.transcript.new_block(SESSION_STARTED_MARKER);
                self.transcript.new_block("");
            }
            ServerEvent::ConversationItemCreated { item, .. } => {
                if item.is_user_text_message() {
                    if let Some(id) = item.id.as_deref() {
                        self.transcript.append_message_id(id);
                    }
                }
            }
            ServerEvent::ResponseContentPartAdded { .. } => {
                self.transcript.new_block("");
                self.transcript.append("Assistant: ");
            }
            ServerEvent::ResponseAudioTranscriptDelta { delta, .. } => {
                self.transcript.append(&delta);
            }
            ServerEvent::ResponseAudioDelta { delta, .. } => {
                let samples = audio_utils::decode_i16(&delta);
                if !samples.is_empty() {
                    commands.push(Command::PlayAudio(samples));
                }
            }
            ServerEvent::InputAudioBufferSpeechStarted { .. } => {
                self.latest_input_speech = Some(self.transcript.new_speech_block());
                self.transcript.new_block("");
                commands.push(Command::ClearPlayback);
            }
            ServerEvent::ConversationItemInputAudioTranscriptionCompleted {
                item_id,
                transcript,
                ..
            } => {
                let index = match self.latest_input_speech {
                    Some(index) => index,
                    None => self.transcript.new_speech_block(),
                };
                let text = transcript.replace(['\n', '\r'], "");
                self.transcript
                    .append_to(index, &format!("User (Speech): {} >> {}", text, item_id));
                self.transcript.set_id(index, &item_id);
            }
            ServerEvent::ResponseDone { response } => {
                self.handle_response_done(response, &mut commands);
            }
            ServerEvent::Error { error } => {
                warn!(code = ?error.code, message = %error.message, "Realtime error event");
                self.transcript.new_block(&format!("[Error]: {}", error.message));
            }
            ServerEvent::ConversationItemInputAudioTranscriptionFailed { item_id, error, .. } => {
                warn!(%item_id, message = %error.message, "Input transcription failed");
            }
            ServerEvent::SessionUpdated { .. }
            | ServerEvent::ConversationCreated { .. }
            | ServerEvent::ConversationItemTruncated { .. }
            | ServerEvent::ConversationItemDeleted { .. }
            | ServerEvent::InputAudioBufferCommitted { .. }
            | ServerEvent::InputAudioBufferCleared
            | ServerEvent::InputAudioBufferSpeechStopped { .. }
            | ServerEvent::ResponseCreated { .. }
            | ServerEvent::ResponseOutputItemAdded { .. }
            | ServerEvent::ResponseOutputItemDone { .. }
            | ServerEvent::ResponseContentPartDone { .. }
            | ServerEvent::ResponseTextDelta { .. }
            | ServerEvent::ResponseTextDone { .. }
            | ServerEvent::ResponseAudioTranscriptDone { .. }
            | ServerEvent::ResponseAudioDone { .. }
            | ServerEvent::ResponseFunctionCallArgumentsDelta { .. }
            | ServerEvent::ResponseFunctionCallArgumentsDone { .. }
            | ServerEvent::RateLimitsUpdated { .. }
            | ServerEvent::Unknown => {
                debug!(kind, "Ignoring event");
            }
        }
        commands
    }

    /// Function calls are answered in output order, each answer followed by
    /// its `response.create`. Message items are finalized in place.
    fn handle_response_done(&mut self, response: Response, commands: &mut Vec<Command>) {
        for output in response.output {
            match output.kind {
                ItemType::FunctionCall => {
                    let name = output.name.unwrap_or_default();
                    let arguments = output.arguments.unwrap_or_default();
                    let call_id = output.call_id.unwrap_or_default();
                    info!(tool = %name, %call_id, "Function call requested");

                    let mut reply = self
                        .assistants
                        .get_tool_response(&name, &arguments, &call_id);
                    if let ClientEvent::SessionUpdate { session } = &mut reply {
                        session.voice = Some(self.form.voice);
                        session.temperature = Some(self.form.temperature);
                        self.form.assistant = name;
                    }
                    commands.push(Command::Send(reply));
                    commands.push(Command::Send(ClientEvent::response_create()));
                }
                ItemType::Message => {
                    if let Some(id) = output.id.as_deref() {
                        self.transcript.append_message_id(id);
                    }
                    self.transcript.push_rule();
                }
                ItemType::FunctionCallOutput => {}
            }
        }
    }

    /// Sends typed chat text. The button and the Enter key both land here.
    pub fn send_text(&mut self, input: &str) -> Vec<Command> {
        if !self.form.is_enabled(Control::SendText) {
            warn!("Chat is disabled until the session has started.");
            return Vec::new();
        }
        let input = input.trim();
        if input.is_empty() {
            return Vec::new();
        }
        self.transcript.append(&format!("User: {}", input));
        vec![
            Command::Send(ClientEvent::item_create(Item::user_text(input))),
            Command::Send(ClientEvent::response_create()),
            Command::ClearPlayback,
        ]
    }

    /// Deletes a conversation item and strikes its block.
    pub fn delete_item(&mut self, id: &str) -> Vec<Command> {
        if !self.form.is_enabled(Control::DeleteItem) {
            warn!("Delete is disabled until the session has started.");
            return Vec::new();
        }
        let id = id.trim();
        if id.is_empty() {
            return Vec::new();
        }
        if !self.transcript.mark_deleted(id) {
            debug!(item_id = id, "No block shows this item");
        }
        vec![Command::Send(ClientEvent::ConversationItemDelete {
            item_id: id.to_string(),
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::BlockKind;
    use openai_realtime_types::Voice;
    use serde_json::json;

    fn event(value: serde_json::Value) -> ServerEvent {
        serde_json::from_value(value).expect("valid server event")
    }

    fn started_console() -> Console {
        let mut console = Console::default();
        console.begin_start();
        console.handle_event(event(json!({
            "type": "session.created",
            "session": { "id": "sess_1" }
        })));
        console
    }

    fn sends(commands: &[Command]) -> Vec<&ClientEvent> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::Send(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_begin_start_builds_initial_session_update() {
        let mut console = Console::default();
        console.form.set_voice(Voice::Echo);
        console.form.set_language("German").unwrap();
        console.form.assistant = "Banking_Assistant".into();

        let ClientEvent::SessionUpdate { session } = console.begin_start() else {
            panic!("expected session.update");
        };
        assert_eq!(session.turn_detection, Some(TurnDetection::server_vad()));
        assert_eq!(session.input_audio_transcription.unwrap().model, "whisper-1");
        assert!(session.instructions.unwrap().contains("German"));
        assert_eq!(session.voice, Some(Voice::Echo));
        assert_eq!(session.temperature, Some(0.8));
        assert_eq!(session.tools.unwrap().len(), 2);
        assert_eq!(console.form.assistant, GENERIC_ASSISTANT_LABEL);
        assert_eq!(console.form.input_state(), InputState::Working);
        assert_eq!(console.state(), SessionState::Connecting);
    }

    #[test]
    fn test_session_created_activates_and_marks() {
        let console = started_console();
        assert_eq!(console.state(), SessionState::Active);
        assert_eq!(console.form.input_state(), InputState::ReadyToStop);
        let blocks = console.transcript.blocks();
        assert_eq!(blocks[0].text, SESSION_STARTED_MARKER);
        assert_eq!(blocks[1].text, "");
    }

    #[test]
    fn test_start_failure_shows_message_and_resets() {
        let mut console = Console::default();
        console.begin_start();
        console.start_failed();
        assert_eq!(console.form.input_state(), InputState::ReadyToStart);
        assert_eq!(
            console.transcript.blocks().last().unwrap().text,
            CONNECTION_ERROR_MESSAGE
        );
    }

    #[test]
    fn test_transcript_deltas_concatenate_into_one_region() {
        let mut console = started_console();
        let before = console.transcript.blocks().len();
        console.handle_event(event(json!({
            "type": "response.content_part.added",
            "part": { "type": "audio", "transcript": "" }
        })));
        console.handle_event(event(json!({
            "type": "response.audio_transcript.delta", "delta": "Hel"
        })));
        console.handle_event(event(json!({
            "type": "response.audio_transcript.delta", "delta": "lo"
        })));

        let blocks = console.transcript.blocks();
        assert_eq!(blocks.len(), before + 1);
        assert_eq!(blocks.last().unwrap().text, "Assistant: Hello");
    }

    #[test]
    fn test_audio_delta_forwards_decoded_samples() {
        let mut console = started_console();
        let delta = audio_utils::encode_i16(&[1, -1, 300]);
        let commands = console.handle_event(event(json!({
            "type": "response.audio.delta", "delta": delta
        })));
        assert_eq!(commands, vec![Command::PlayAudio(vec![1, -1, 300])]);

        let commands = console.handle_event(event(json!({
            "type": "response.audio.delta", "delta": "%%%"
        })));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_speech_started_opens_one_user_region_and_clears_playback() {
        let mut console = started_console();
        let speech_before = count_kind(&console, BlockKind::Speech);

        let commands = console.handle_event(event(json!({
            "type": "input_audio_buffer.speech_started",
            "audio_start_ms": 1000,
            "item_id": "item_u1"
        })));

        assert_eq!(commands, vec![Command::ClearPlayback]);
        assert_eq!(count_kind(&console, BlockKind::Speech), speech_before + 1);
    }

    fn count_kind(console: &Console, kind: BlockKind) -> usize {
        console
            .transcript
            .blocks()
            .iter()
            .filter(|b| b.kind == kind)
            .count()
    }

    #[test]
    fn test_input_transcription_fills_latest_speech_block() {
        let mut console = started_console();
        console.handle_event(event(json!({ "type": "input_audio_buffer.speech_started" })));
        // The assistant starts answering before the transcription arrives.
        console.handle_event(event(json!({
            "type": "response.content_part.added",
            "part": { "type": "audio" }
        })));
        console.handle_event(event(json!({
            "type": "conversation.item.input_audio_transcription.completed",
            "item_id": "item_u1",
            "content_index": 0,
            "transcript": "What is my\r\nbalance?\n"
        })));

        let block = console.transcript.find("item_u1").expect("tagged block");
        assert_eq!(block.kind, BlockKind::Speech);
        assert_eq!(block.text, "User (Speech): What is mybalance? >> item_u1");
        assert_eq!(
            console.transcript.blocks().last().unwrap().text,
            "Assistant: "
        );
    }

    #[test]
    fn test_user_text_item_created_records_id() {
        let mut console = started_console();
        console.send_text("hi there");
        console.handle_event(event(json!({
            "type": "conversation.item.created",
            "item": {
                "id": "item_t1",
                "type": "message",
                "role": "user",
                "content": [{ "type": "input_text", "text": "hi there" }]
            }
        })));
        assert_eq!(
            console.transcript.find("item_t1").unwrap().text,
            "User: hi there >> item_t1"
        );

        // Assistant items are not tagged on creation.
        console.handle_event(event(json!({
            "type": "conversation.item.created",
            "item": { "id": "item_a1", "type": "message", "role": "assistant", "content": [] }
        })));
        assert!(console.transcript.find("item_a1").is_none());
    }

    #[test]
    fn test_response_done_function_call_then_message() {
        let mut console = started_console();
        console.handle_event(event(json!({
            "type": "response.content_part.added",
            "part": { "type": "audio" }
        })));
        console.handle_event(event(json!({
            "type": "response.audio_transcript.delta", "delta": "One moment."
        })));
        console.transcript.drain_changes();

        let commands = console.handle_event(event(json!({
            "type": "response.done",
            "response": {
                "id": "resp_1",
                "status": "completed",
                "output": [
                    {
                        "id": "item_fc", "type": "function_call",
                        "name": "get_account_balance", "call_id": "call_7",
                        "arguments": "{\"account_type\":\"checking\"}"
                    },
                    { "id": "item_msg", "type": "message", "role": "assistant", "content": [] }
                ]
            }
        })));

        let sent = sends(&commands);
        assert_eq!(commands.len(), 2);
        assert_eq!(sent[0].kind(), "conversation.item.create");
        assert_eq!(sent[1], &ClientEvent::response_create());

        let message = console.transcript.find("item_msg").unwrap();
        assert_eq!(message.text, "Assistant: One moment. >> item_msg");
        assert_eq!(
            console.transcript.blocks().last().unwrap().kind,
            BlockKind::Rule
        );
    }

    #[test]
    fn test_hand_off_merges_live_voice_and_temperature() {
        let mut console = started_console();
        console.form.set_voice(Voice::Shimmer);
        console.form.set_temperature(1.1).unwrap();

        let commands = console.handle_event(event(json!({
            "type": "response.done",
            "response": {
                "output": [{
                    "type": "function_call", "name": "Banking_Assistant",
                    "call_id": "call_1", "arguments": "{}"
                }]
            }
        })));

        let sent = sends(&commands);
        let ClientEvent::SessionUpdate { session } = sent[0] else {
            panic!("expected session.update");
        };
        assert_eq!(session.voice, Some(Voice::Shimmer));
        assert_eq!(session.temperature, Some(1.1));
        assert_eq!(sent[1], &ClientEvent::response_create());
        assert_eq!(console.form.assistant, "Banking_Assistant");
    }

    #[test]
    fn test_multiple_function_calls_are_answered_in_order() {
        let mut console = started_console();
        let commands = console.handle_event(event(json!({
            "type": "response.done",
            "response": {
                "output": [
                    { "type": "function_call", "name": "get_mobile_plans", "call_id": "a", "arguments": "{}" },
                    { "type": "function_call", "name": "nope", "call_id": "b", "arguments": "{}" }
                ]
            }
        })));
        let sent = sends(&commands);
        assert_eq!(sent.len(), 4);
        let call_ids: Vec<Option<&str>> = sent
            .iter()
            .map(|e| match e {
                ClientEvent::ConversationItemCreate { item, .. } => item.call_id.as_deref(),
                _ => None,
            })
            .collect();
        assert_eq!(call_ids, vec![Some("a"), None, Some("b"), None]);
    }

    #[test]
    fn test_error_event_shows_marker_and_keeps_session() {
        let mut console = started_console();
        let commands = console.handle_event(event(json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "bad item" }
        })));
        assert!(commands.is_empty());
        assert_eq!(console.state(), SessionState::Active);
        assert_eq!(
            console.transcript.blocks().last().unwrap().text,
            "[Error]: bad item"
        );
    }

    #[test]
    fn test_unknown_events_are_ignored() {
        let mut console = started_console();
        let before = console.transcript.blocks().to_vec();
        let commands = console.handle_event(event(json!({ "type": "something.new" })));
        assert!(commands.is_empty());
        assert_eq!(console.transcript.blocks(), before.as_slice());
    }

    #[test]
    fn test_send_text_payload_is_identical_for_same_input() {
        let mut first = started_console();
        let mut second = started_console();
        // One path trims surrounding whitespace from the field, as Enter does.
        let a = first.send_text("book a table");
        let b = second.send_text("  book a table \n");
        assert_eq!(a, b);
        assert_eq!(
            a[0],
            Command::Send(ClientEvent::item_create(Item::user_text("book a table")))
        );
        assert_eq!(a[1], Command::Send(ClientEvent::response_create()));
        assert_eq!(a[2], Command::ClearPlayback);
        assert_eq!(
            first.transcript.blocks().last().unwrap().text,
            "User: book a table"
        );
    }

    #[test]
    fn test_send_text_requires_active_session_and_input() {
        let mut console = Console::default();
        assert!(console.send_text("hello").is_empty());

        let mut console = started_console();
        assert!(console.send_text("   ").is_empty());
    }

    #[test]
    fn test_delete_item_marks_exactly_one_and_sends_once() {
        let mut console = started_console();
        console.transcript.new_block("first");
        console.transcript.append_message_id("item_1");
        console.transcript.new_block("second");
        console.transcript.append_message_id("item_2");

        let commands = console.delete_item(" item_2 ");
        assert_eq!(
            commands,
            vec![Command::Send(ClientEvent::ConversationItemDelete {
                item_id: "item_2".into()
            })]
        );
        let struck: Vec<&str> = console
            .transcript
            .blocks()
            .iter()
            .filter(|b| b.struck)
            .filter_map(|b| b.id.as_deref())
            .collect();
        assert_eq!(struck, vec!["item_2"]);

        assert!(console.delete_item("  ").is_empty());
    }

    #[test]
    fn test_session_closed_resets_form() {
        let mut console = started_console();
        console.begin_stop();
        assert_eq!(console.form.input_state(), InputState::Working);
        console.session_closed();
        assert_eq!(console.form.input_state(), InputState::ReadyToStart);
        assert_eq!(console.state(), SessionState::Closed);
    }
}
