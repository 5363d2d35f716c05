//! Turns a stream of PCM16 chunks into base64 frames for
//! `input_audio_buffer.append`.

use console_core::audio_utils;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

/// 100 ms of audio at 24 kHz.
pub const FRAME_SAMPLES: usize = 2400;

/// A live source of 24 kHz mono PCM16 chunks. Dropping it releases the
/// source.
#[derive(Debug)]
pub struct MediaStream {
    chunks: mpsc::Receiver<Vec<i16>>,
}

impl MediaStream {
    /// Creates a stream and the sender its source writes into.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Vec<i16>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { chunks: rx })
    }

    async fn next_chunk(&mut self) -> Option<Vec<i16>> {
        self.chunks.recv().await
    }
}

type FrameCallback = Arc<dyn Fn(String) + Send + Sync>;

pub struct Recorder {
    on_frame: FrameCallback,
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Recorder {
    pub fn new(on_frame: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            on_frame: Arc::new(on_frame),
            active: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Starts segmenting `stream`. A previous stream is released first.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, mut stream: MediaStream) {
        self.stop();

        let active = Arc::new(AtomicBool::new(true));
        self.active = active.clone();
        let on_frame = self.on_frame.clone();

        self.task = Some(tokio::spawn(async move {
            let mut pending: Vec<i16> = Vec::with_capacity(FRAME_SAMPLES * 2);
            while let Some(chunk) = stream.next_chunk().await {
                pending.extend_from_slice(&chunk);
                while pending.len() >= FRAME_SAMPLES {
                    if !active.load(Ordering::Acquire) {
                        return;
                    }
                    let frame: Vec<i16> = pending.drain(..FRAME_SAMPLES).collect();
                    on_frame(audio_utils::encode_i16(&frame));
                }
            }
            debug!(leftover = pending.len(), "Media stream ended");
        }));
        info!("Recording started");
    }

    /// Stops delivering frames and releases the stream. Buffered samples are
    /// discarded.
    pub fn stop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Recording stopped");
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}
