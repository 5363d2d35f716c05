//! `cpal` microphone and speaker.
//!
//! cpal streams are not `Send` on every host, so each stream lives on its own
//! thread for as long as its consumer is alive.

use super::{AudioBackend, MediaStream, OutputDevice, PlaybackQueue};
use anyhow::{Context, Result, anyhow};
use console_core::audio_utils::{self, REALTIME_PCM16_SAMPLE_RATE};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc as std_mpsc,
    },
    thread,
    time::Duration,
};
use tracing::{error, info, warn};

const RESAMPLER_CHUNK: usize = 480;
const MICROPHONE_QUEUE: usize = 64;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Builds and plays a stream on a dedicated thread, keeping it alive while
/// `alive` holds.
fn spawn_stream<B, A>(name: &str, build: B, alive: A) -> Result<()>
where
    B: FnOnce() -> Result<cpal::Stream> + Send + 'static,
    A: Fn() -> bool + Send + 'static,
{
    let (ready_tx, ready_rx) = std_mpsc::channel();
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let stream = match build().and_then(|s| s.play().map(|_| s).map_err(Into::into)) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            while alive() {
                thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
            info!(thread = %thread_name, "Audio stream released");
        })
        .context("Failed to spawn audio thread")?;

    ready_rx
        .recv()
        .map_err(|_| anyhow!("Audio thread exited before the stream started"))?
}

#[derive(Debug, Default)]
pub struct CpalSpeaker {
    running: Option<Arc<AtomicBool>>,
}

impl OutputDevice for CpalSpeaker {
    fn start(&mut self, queue: PlaybackQueue, sample_rate: u32) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let alive = running.clone();
        spawn_stream(
            "speaker",
            move || {
                let device = cpal::default_host()
                    .default_output_device()
                    .context("No output device available")?;
                let supported = device
                    .supported_output_configs()?
                    .find(|range| {
                        range.sample_format() == cpal::SampleFormat::F32
                            && range.min_sample_rate().0 <= sample_rate
                            && range.max_sample_rate().0 >= sample_rate
                    })
                    .with_context(|| format!("Output device cannot play {} Hz", sample_rate))?
                    .with_sample_rate(cpal::SampleRate(sample_rate));
                let config: cpal::StreamConfig = supported.config();
                let channels = config.channels as usize;
                info!(sample_rate, channels, "Opening speaker");

                let mut mono: Vec<i16> = Vec::new();
                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        mono.resize(data.len() / channels, 0);
                        queue.pop_into(&mut mono);
                        for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                            frame.fill(sample as f32 / 32768.0);
                        }
                    },
                    |err| error!("Speaker stream error: {}", err),
                    None,
                )?;
                Ok(stream)
            },
            move || alive.load(Ordering::Acquire),
        )?;
        self.running = Some(running);
        Ok(())
    }
}

impl Drop for CpalSpeaker {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.store(false, Ordering::Release);
        }
    }
}

/// Default input and output devices of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAudio;

impl AudioBackend for NativeAudio {
    fn output_device(&self) -> Box<dyn OutputDevice> {
        Box::new(CpalSpeaker::default())
    }

    fn open_microphone(&self) -> Result<MediaStream> {
        let (tx, stream) = MediaStream::channel(MICROPHONE_QUEUE);
        let probe = tx.clone();
        spawn_stream(
            "microphone",
            move || {
                let device = cpal::default_host()
                    .default_input_device()
                    .context("No input device available")?;
                let config: cpal::StreamConfig = device.default_input_config()?.config();
                let channels = config.channels as usize;
                let device_rate = config.sample_rate.0;
                info!(device_rate, channels, "Opening microphone");

                let mut resampler = if device_rate == REALTIME_PCM16_SAMPLE_RATE {
                    None
                } else {
                    Some(create_resampler(
                        device_rate as f64,
                        REALTIME_PCM16_SAMPLE_RATE as f64,
                        RESAMPLER_CHUNK,
                    )?)
                };
                let mut pending: Vec<f32> = Vec::new();

                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        pending.extend(
                            data.chunks(channels)
                                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                        );
                        let resampled = match resampler.as_mut() {
                            None => std::mem::take(&mut pending),
                            Some(resampler) => {
                                let mut out = Vec::new();
                                while pending.len() >= resampler.input_frames_next() {
                                    let chunk: Vec<f32> =
                                        pending.drain(..resampler.input_frames_next()).collect();
                                    match resampler.process(&[chunk], None) {
                                        Ok(res) => out.extend_from_slice(&res[0]),
                                        Err(e) => error!("Resampling failed: {}", e),
                                    }
                                }
                                out
                            }
                        };
                        if !resampled.is_empty()
                            && tx
                                .try_send(audio_utils::convert_f32_to_i16(&resampled))
                                .is_err()
                        {
                            warn!("Microphone chunk dropped");
                        }
                    },
                    |err| error!("Microphone stream error: {}", err),
                    None,
                )?;
                Ok(stream)
            },
            move || !probe.is_closed(),
        )?;
        Ok(stream)
    }
}
