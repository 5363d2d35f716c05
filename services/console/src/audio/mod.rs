//! Microphone capture and speaker playback.
//!
//! - `recorder`: segments a [`MediaStream`] into fixed PCM16 frames.
//! - `player`: FIFO playback queue drained by an [`OutputDevice`].
//! - `native`: `cpal` microphone and speaker (feature `native-audio`).

pub mod player;
pub mod recorder;

#[cfg(feature = "native-audio")]
pub mod native;

pub use player::{NullOutput, OutputDevice, PlaybackQueue, Player};
pub use recorder::{FRAME_SAMPLES, MediaStream, Recorder};

/// Hands out the devices a session needs.
pub trait AudioBackend: Send + Sync {
    /// A fresh output device for a new player.
    fn output_device(&self) -> Box<dyn OutputDevice>;

    /// Opens the microphone as a stream of 24 kHz mono PCM16 chunks.
    fn open_microphone(&self) -> anyhow::Result<MediaStream>;
}

/// Backend for builds without sound hardware: playback is discarded in real
/// time and there is no microphone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioBackend for NullAudio {
    fn output_device(&self) -> Box<dyn OutputDevice> {
        Box::new(NullOutput)
    }

    fn open_microphone(&self) -> anyhow::Result<MediaStream> {
        anyhow::bail!("no microphone available; rebuild with the `native-audio` feature")
    }
}
