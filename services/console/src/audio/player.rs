//! Speaker output for `response.audio.delta`.

use anyhow::Result;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};
use tracing::{debug, info, warn};

/// Samples waiting to be played, shared between the player and the device
/// callback that drains them.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    samples: Arc<Mutex<VecDeque<i16>>>,
}

impl PlaybackQueue {
    pub fn push(&self, samples: &[i16]) {
        if let Ok(mut queue) = self.samples.lock() {
            queue.extend(samples.iter().copied());
        }
    }

    /// Fills `out` from the front of the queue, padding with silence.
    /// Returns how many queued samples were used.
    pub fn pop_into(&self, out: &mut [i16]) -> usize {
        let Ok(mut queue) = self.samples.lock() else {
            out.fill(0);
            return 0;
        };
        let taken = out.len().min(queue.len());
        for (slot, sample) in out.iter_mut().zip(queue.drain(..taken)) {
            *slot = sample;
        }
        out[taken..].fill(0);
        taken
    }

    /// Drops up to `count` samples from the front of the queue.
    pub fn discard(&self, count: usize) -> usize {
        let Ok(mut queue) = self.samples.lock() else {
            return 0;
        };
        let taken = count.min(queue.len());
        queue.drain(..taken);
        taken
    }

    pub fn clear(&self) {
        if let Ok(mut queue) = self.samples.lock() {
            queue.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A handle that does not keep the queue alive.
    pub fn downgrade(&self) -> WeakPlaybackQueue {
        WeakPlaybackQueue(Arc::downgrade(&self.samples))
    }
}

#[derive(Debug, Clone)]
pub struct WeakPlaybackQueue(Weak<Mutex<VecDeque<i16>>>);

impl WeakPlaybackQueue {
    pub fn upgrade(&self) -> Option<PlaybackQueue> {
        self.0.upgrade().map(|samples| PlaybackQueue { samples })
    }
}

/// A sink that consumes a [`PlaybackQueue`] at a fixed sample rate.
#[cfg_attr(test, mockall::automock)]
pub trait OutputDevice: Send {
    fn start(&mut self, queue: PlaybackQueue, sample_rate: u32) -> Result<()>;
}

/// Consumes queued samples in real time without producing sound.
#[derive(Debug, Default)]
pub struct NullOutput;

impl OutputDevice for NullOutput {
    fn start(&mut self, queue: PlaybackQueue, sample_rate: u32) -> Result<()> {
        let handle = queue.downgrade();
        let per_tick = (sample_rate / 10) as usize;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                ticker.tick().await;
                let Some(queue) = handle.upgrade() else {
                    break;
                };
                queue.discard(per_tick);
            }
            debug!("Null output released");
        });
        Ok(())
    }
}

pub struct Player {
    device: Box<dyn OutputDevice>,
    queue: PlaybackQueue,
    sample_rate: Option<u32>,
}

impl Player {
    pub fn new(device: Box<dyn OutputDevice>) -> Self {
        Self {
            device,
            queue: PlaybackQueue::default(),
            sample_rate: None,
        }
    }

    /// Starts the output device. Only the first call has an effect.
    pub fn init(&mut self, sample_rate: u32) -> Result<()> {
        if let Some(current) = self.sample_rate {
            debug!(current, requested = sample_rate, "Player already initialized");
            return Ok(());
        }
        self.device.start(self.queue.clone(), sample_rate)?;
        self.sample_rate = Some(sample_rate);
        info!(sample_rate, "Player initialized");
        Ok(())
    }

    pub fn play(&self, samples: &[i16]) {
        if self.sample_rate.is_none() {
            warn!(samples = samples.len(), "Dropping audio for uninitialized player");
            return;
        }
        self.queue.push(samples);
    }

    /// Discards everything queued. Playback resumes with the next `play`.
    pub fn clear(&self) {
        let dropped = self.queue.len();
        self.queue.clear();
        if dropped > 0 {
            debug!(dropped, "Playback cleared");
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}
