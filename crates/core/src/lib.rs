pub mod assistants;
pub mod audio_utils;
pub mod dispatch;
pub mod form;
pub mod transcript;

use openai_realtime_types::ClientEvent;

/// Represents commands that the console logic issues to the session runtime.
///
/// This enum decouples event dispatch from the runtime's side effects
/// (network sends and speaker output). Commands must be executed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Send the event on the realtime connection.
    Send(ClientEvent),
    /// Queue PCM16 samples for playback.
    PlayAudio(Vec<i16>),
    /// Drop all queued and playing audio.
    ClearPlayback,
}
