//! The console runtime: one task that owns the view, the session and the
//! devices, driven by user commands, server events and microphone frames.

use crate::{
    audio::{AudioBackend, Player},
    config::Config,
    session::Session,
    ui::{HELP, Renderer, UiCommand},
};
use anyhow::{Result, anyhow};
use console_core::{
    Command, audio_utils::REALTIME_PCM16_SAMPLE_RATE, dispatch::Console, form::Control,
};
use openai_realtime::{Connector, RealtimeTransport};
use openai_realtime_types::{ClientEvent, ServerEvent};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::timeout};
use tracing::{error, info, instrument, warn};

/// How long `/start` waits for the websocket handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct App {
    console: Console,
    session: Option<Session>,
    config: Config,
    connector: Arc<dyn Connector>,
    audio: Arc<dyn AudioBackend>,
    renderer: Box<dyn Renderer>,
    frames_tx: mpsc::UnboundedSender<String>,
    frames_rx: mpsc::UnboundedReceiver<String>,
}

/// Waits for the next server event, or forever when no session is open.
async fn next_event(session: &mut Option<Session>) -> Option<Result<ServerEvent>> {
    match session {
        Some(session) => session.next_event().await,
        None => std::future::pending().await,
    }
}

impl App {
    pub fn new(
        console: Console,
        config: Config,
        connector: Arc<dyn Connector>,
        audio: Arc<dyn AudioBackend>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        Self {
            console,
            session: None,
            config,
            connector,
            audio,
            renderer,
            frames_tx,
            frames_rx,
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Runs until `/quit` or until every UI sender is gone. An open session
    /// is stopped on the way out.
    pub async fn run(&mut self, mut ui_rx: mpsc::Receiver<UiCommand>) -> Result<()> {
        info!("Console ready");
        self.render();
        loop {
            tokio::select! {
                command = ui_rx.recv() => match command {
                    None | Some(UiCommand::Quit) => break,
                    Some(command) => self.handle_ui(command).await,
                },
                event = next_event(&mut self.session) => self.handle_inbound(event).await,
                Some(frame) = self.frames_rx.recv() => self.forward_frame(frame).await,
            }
            self.render();
        }
        if self.session.is_some() {
            self.stop().await;
            self.render();
        }
        info!("Console finished");
        Ok(())
    }

    fn render(&mut self) {
        let changes = self.console.transcript.drain_changes();
        if !changes.is_empty() {
            self.renderer.render(&self.console.transcript, &changes);
        }
    }

    fn notice(&mut self, message: &str) {
        self.renderer.notice(message);
    }

    pub async fn handle_ui(&mut self, command: UiCommand) {
        match command {
            UiCommand::Start => {
                if self.console.form.is_enabled(Control::Start) {
                    self.start().await;
                } else {
                    self.notice("A session is already running.");
                }
            }
            UiCommand::Stop => {
                if self.console.form.is_enabled(Control::Stop) {
                    self.stop().await;
                } else {
                    self.notice("No session is running.");
                }
            }
            UiCommand::SendText(text) => {
                if !self.console.form.is_enabled(Control::SendText) {
                    self.notice("Chat is available once the session has started.");
                    return;
                }
                let commands = self.console.send_text(&text);
                self.execute(commands).await;
            }
            UiCommand::DeleteItem(id) => {
                if !self.console.form.is_enabled(Control::DeleteItem) {
                    self.notice("Items can only be deleted during a session.");
                    return;
                }
                let commands = self.console.delete_item(&id);
                self.execute(commands).await;
            }
            UiCommand::SetVoice(voice) => {
                self.console.form.set_voice(voice);
                self.notice(&format!("Voice: {}", voice));
            }
            UiCommand::SetTemperature(temperature) => {
                match self.console.form.set_temperature(temperature) {
                    Ok(()) => self.notice(&format!("Temperature: {}", temperature)),
                    Err(e) => self.notice(&e.to_string()),
                }
            }
            UiCommand::SetLanguage(language) => match self.console.form.set_language(&language) {
                Ok(()) => self.notice(&format!("Language: {}", self.console.form.language)),
                Err(e) => self.notice(&e.to_string()),
            },
            UiCommand::SetAzure(azure) => match self.console.form.set_azure(azure) {
                Ok(()) => self.notice(&format!("Azure endpoint: {}", on_off(azure))),
                Err(e) => self.notice(&e.to_string()),
            },
            UiCommand::SetChatOnly(chat_only) => {
                match self.console.form.set_chat_only(chat_only) {
                    Ok(()) => self.notice(&format!("Chat only: {}", on_off(chat_only))),
                    Err(e) => self.notice(&e.to_string()),
                }
            }
            UiCommand::Help => self.notice(HELP),
            UiCommand::Quit => {}
        }
    }

    /// Connects and sends the initial configuration.
    #[instrument(skip_all, fields(azure = azure, deployment = %self.config.deployment))]
    async fn open_transport(
        &self,
        azure: bool,
        init: &ClientEvent,
    ) -> Result<Box<dyn RealtimeTransport>> {
        let endpoint = self.config.endpoint(azure)?;
        let mut transport = timeout(
            CONNECT_TIMEOUT,
            self.connector.connect(&endpoint, &self.config.api_key),
        )
        .await
        .map_err(|_| anyhow!("Timed out connecting after {:?}", CONNECT_TIMEOUT))??;
        if let Err(e) = transport.send(init).await {
            let _ = transport.close().await;
            return Err(e.context("Failed to send the initial session.update"));
        }
        Ok(transport)
    }

    /// Connects, sends the initial configuration and brings up audio. Any
    /// failure before the session exists is reported once; there is no retry.
    /// A connection that is already open is closed when audio output fails.
    async fn start(&mut self) {
        let init = self.console.begin_start();
        let azure = self.console.form.azure;

        let mut transport = match self.open_transport(azure, &init).await {
            Ok(transport) => transport,
            Err(e) => {
                error!(error = ?e, "Failed to start the realtime session");
                self.console.start_failed();
                return;
            }
        };

        let mut player = Player::new(self.audio.output_device());
        if let Err(e) = player.init(REALTIME_PCM16_SAMPLE_RATE) {
            error!(error = ?e, "Failed to initialize audio output");
            if let Err(close_err) = transport.close().await {
                warn!(error = ?close_err, "Closing the realtime connection failed");
            }
            self.notice(&format!("Audio output unavailable: {}", e));
            self.console.session_closed();
            return;
        }
        let mut session = Session::new(transport, player, self.frames_tx.clone());

        if !self.console.form.chat_only {
            match self.audio.open_microphone() {
                Ok(stream) => session.start_recording(stream),
                Err(e) => {
                    warn!(error = ?e, "Microphone unavailable, continuing with text only");
                    self.notice(&format!("Microphone unavailable: {}", e));
                }
            }
        }
        info!(recording = session.is_recording(), "Realtime session opened");
        self.session = Some(session);
    }

    /// Stop capture, drop queued audio, close the connection.
    pub async fn stop(&mut self) {
        self.console.begin_stop();
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        while self.frames_rx.try_recv().is_ok() {}
        self.console.session_closed();
        info!("Realtime session closed");
    }

    async fn handle_inbound(&mut self, event: Option<Result<ServerEvent>>) {
        match event {
            Some(Ok(event)) => {
                let commands = self.console.handle_event(event);
                self.execute(commands).await;
            }
            Some(Err(e)) => {
                error!(error = ?e, "Realtime stream failed");
                self.teardown().await;
            }
            None => {
                info!("Realtime stream ended");
                self.teardown().await;
            }
        }
    }

    async fn forward_frame(&mut self, frame: String) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.is_recording() {
            return;
        }
        let event = ClientEvent::InputAudioBufferAppend { audio: frame };
        if let Err(e) = session.send(&event).await {
            warn!(error = ?e, "Failed to send audio frame");
        }
    }

    /// Runs the commands in order against the open session.
    async fn execute(&mut self, commands: Vec<Command>) {
        let Some(session) = self.session.as_mut() else {
            if !commands.is_empty() {
                warn!(count = commands.len(), "No session for commands");
            }
            return;
        };
        for command in commands {
            match command {
                Command::Send(event) => {
                    if let Err(e) = session.send(&event).await {
                        warn!(kind = event.kind(), error = ?e, "Failed to send client event");
                    }
                }
                Command::PlayAudio(samples) => session.play(&samples),
                Command::ClearPlayback => session.clear_playback(),
            }
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
