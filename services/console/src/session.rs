//! One live realtime session: the connection plus the audio adapters built
//! for it.

use crate::audio::{MediaStream, Player, Recorder};
use anyhow::Result;
use openai_realtime::RealtimeTransport;
use openai_realtime_types::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct Session {
    transport: Box<dyn RealtimeTransport>,
    recorder: Recorder,
    player: Player,
}

impl Session {
    /// Wraps an open connection and a started player with a fresh recorder.
    /// Recorded frames are reported on `frames`.
    pub fn new(
        transport: Box<dyn RealtimeTransport>,
        player: Player,
        frames: mpsc::UnboundedSender<String>,
    ) -> Self {
        let recorder = Recorder::new(move |frame| {
            let _ = frames.send(frame);
        });
        Self {
            transport,
            recorder,
            player,
        }
    }

    pub fn start_recording(&mut self, stream: MediaStream) {
        self.recorder.start(stream);
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        debug!(kind = event.kind(), "Sending client event");
        self.transport.send(event).await
    }

    pub async fn next_event(&mut self) -> Option<Result<ServerEvent>> {
        self.transport.next_event().await
    }

    pub fn play(&self, samples: &[i16]) {
        self.player.play(samples);
    }

    pub fn clear_playback(&self) {
        self.player.clear();
    }

    /// Stops capture, drops queued audio and closes the connection.
    pub async fn close(mut self) {
        self.recorder.stop();
        self.player.clear();
        if let Err(e) = self.transport.close().await {
            warn!(error = ?e, "Closing the realtime connection failed");
        }
    }
}
