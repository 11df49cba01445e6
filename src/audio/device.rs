//! Microphone capture and speaker output through cpal.
//!
//! cpal streams are not `Send`, so each one lives on a dedicated thread that
//! owns it until told to stop. Samples cross into the async side through
//! channels or a mutex-guarded mixer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioCapture, AudioFrame, CaptureConfig};
use super::convert::{downmix_to_mono, resample_linear};
use super::playback::{AudioOutput, DecodedBuffer, OutputClock};
use crate::error::CallError;

fn find_input_device(name: Option<&str>) -> Result<cpal::Device, CallError> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| CallError::Acquisition(format!("no input devices available: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CallError::Acquisition(format!("input device '{name}' not found"))),
        None => host
            .default_input_device()
            .ok_or_else(|| CallError::Acquisition("no default input device available".into())),
    }
}

/// Slices the device stream into fixed frames at the capture rate
struct FrameSlicer {
    device_rate: u32,
    channels: usize,
    config: CaptureConfig,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    sequence: u64,
    tx: mpsc::Sender<AudioFrame>,
    dropped: Arc<AtomicUsize>,
}

impl FrameSlicer {
    fn push<T, F>(&mut self, data: &[T], convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        downmix_to_mono(&mut self.scratch, data, self.channels, convert);
        let resampled = resample_linear(&self.scratch, self.device_rate, self.config.sample_rate);
        self.pending.extend_from_slice(&resampled);

        let frame_samples = self.config.frame_samples();
        while self.pending.len() >= frame_samples {
            let samples: Vec<f32> = self.pending.drain(..frame_samples).collect();
            let frame = AudioFrame {
                samples,
                sample_rate: self.config.sample_rate,
                sequence: self.sequence,
                timestamp_ms: self.sequence * self.config.frame_duration_ms,
            };
            self.sequence += 1;
            if let Err(e) = self.tx.try_send(frame) {
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    mpsc::error::TrySendError::Closed(_) => break,
                }
            }
        }
    }
}

fn build_input_stream(
    device: &cpal::Device,
    config: CaptureConfig,
    tx: mpsc::Sender<AudioFrame>,
    dropped: Arc<AtomicUsize>,
) -> Result<cpal::Stream, CallError> {
    let default_config = device
        .default_input_config()
        .map_err(|e| CallError::Acquisition(format!("input config unavailable: {e}")))?;
    let format = default_config.sample_format();
    let stream_config: StreamConfig = default_config.into();

    let mut slicer = FrameSlicer {
        device_rate: stream_config.sample_rate.0,
        channels: usize::from(stream_config.channels.max(1)),
        config,
        pending: Vec::new(),
        scratch: Vec::new(),
        sequence: 0,
        tx,
        dropped,
    };

    let err_fn = |err| error!("Input stream error: {}", err);

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| slicer.push(data, |s| s),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| slicer.push(data, |s| s as f32 / 32_768.0),
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _| slicer.push(data, |s| (s as f32 - 32_768.0) / 32_768.0),
            err_fn,
            None,
        ),
        other => {
            return Err(CallError::Acquisition(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };

    stream.map_err(|e| CallError::Acquisition(format!("failed to open microphone: {e}")))
}

/// Microphone capture backend
pub struct MicrophoneBackend {
    device_name: Option<String>,
    config: CaptureConfig,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    dropped: Arc<AtomicUsize>,
}

impl MicrophoneBackend {
    pub fn new(device_name: Option<String>, config: CaptureConfig) -> Self {
        Self {
            device_name,
            config,
            stop_tx: None,
            thread: None,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frames discarded because the controller fell behind
    pub fn dropped_frames(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl AudioCapture for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CallError> {
        if self.thread.is_some() {
            return Err(CallError::Acquisition("Already capturing".to_string()));
        }

        let (frame_tx, frame_rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let device_name = self.device_name.clone();
        let config = self.config.clone();
        let dropped = Arc::clone(&self.dropped);

        let thread = std::thread::spawn(move || {
            let opened = find_input_device(device_name.as_deref()).and_then(|device| {
                let stream = build_input_stream(&device, config, frame_tx, dropped)?;
                stream
                    .play()
                    .map_err(|e| CallError::Acquisition(format!("failed to start microphone: {e}")))?;
                Ok((device.name().unwrap_or_else(|_| "unknown".into()), stream))
            });

            match opened {
                Ok((name, stream)) => {
                    let _ = ready_tx.send(Ok(name));
                    // Hold the stream until stop is requested or the backend is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let name = ready_rx
            .await
            .map_err(|_| CallError::Acquisition("capture thread exited".to_string()))??;

        info!("Microphone capture started on '{}'", name);
        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);
        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<(), CallError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
            info!(
                "Microphone capture stopped ({} frames dropped)",
                self.dropped_frames()
            );
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

struct Voice {
    id: u64,
    samples: Arc<[f32]>,
    start_frame: u64,
}

#[derive(Default)]
struct Mixer {
    voices: Vec<Voice>,
}

/// Speaker output mixing scheduled buffers sample-accurately
///
/// The clock is the number of frames the device has rendered.
pub struct DeviceOutput {
    device_rate: u32,
    rendered: Arc<AtomicU64>,
    mixer: Arc<Mutex<Mixer>>,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceOutput {
    pub async fn open() -> Result<Self, CallError> {
        let rendered = Arc::new(AtomicU64::new(0));
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread_rendered = Arc::clone(&rendered);
        let thread_mixer = Arc::clone(&mixer);
        let thread = std::thread::spawn(move || {
            match open_output_stream(thread_rendered, thread_mixer) {
                Ok((rate, stream)) => {
                    let _ = ready_tx.send(Ok(rate));
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            }
        });

        let device_rate = ready_rx
            .await
            .map_err(|_| CallError::Acquisition("output thread exited".to_string()))??;
        info!("Speaker output opened at {}Hz", device_rate);

        Ok(Self {
            device_rate,
            rendered,
            mixer,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

fn open_output_stream(
    rendered: Arc<AtomicU64>,
    mixer: Arc<Mutex<Mixer>>,
) -> Result<(u32, cpal::Stream), CallError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| CallError::Acquisition("no default output device available".into()))?;
    let default_config = device
        .default_output_config()
        .map_err(|e| CallError::Acquisition(format!("output config unavailable: {e}")))?;
    let format = default_config.sample_format();
    let stream_config: StreamConfig = default_config.into();
    let rate = stream_config.sample_rate.0;
    let channels = usize::from(stream_config.channels.max(1));

    let mut render = move |out: &mut [f32]| {
        let frames = out.len() / channels;
        let first = rendered.load(Ordering::Acquire);
        out.iter_mut().for_each(|s| *s = 0.0);

        if let Ok(mut mixer) = mixer.lock() {
            for voice in &mixer.voices {
                for frame in 0..frames {
                    let position = first + frame as u64;
                    if position < voice.start_frame {
                        continue;
                    }
                    let offset = (position - voice.start_frame) as usize;
                    let Some(sample) = voice.samples.get(offset) else {
                        break;
                    };
                    for ch in 0..channels {
                        out[frame * channels + ch] += *sample;
                    }
                }
            }
            let end = first + frames as u64;
            mixer
                .voices
                .retain(|v| v.start_frame + v.samples.len() as u64 > end);
        }

        rendered.store(first + frames as u64, Ordering::Release);
    };

    let err_fn = |err| error!("Output stream error: {}", err);
    let stream = match format {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| render(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => {
            let mut scratch = Vec::new();
            device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    scratch.resize(data.len(), 0.0f32);
                    render(&mut scratch);
                    for (dst, src) in data.iter_mut().zip(&scratch) {
                        *dst = (src.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(CallError::Acquisition(format!(
                "unsupported output format: {other:?}"
            )))
        }
    }
    .map_err(|e| CallError::Acquisition(format!("failed to open speaker: {e}")))?;

    stream
        .play()
        .map_err(|e| CallError::Acquisition(format!("failed to start speaker: {e}")))?;
    Ok((rate, stream))
}

impl OutputClock for DeviceOutput {
    fn now(&self) -> f64 {
        self.rendered.load(Ordering::Acquire) as f64 / self.device_rate as f64
    }
}

impl AudioOutput for DeviceOutput {
    fn play(&mut self, id: u64, buffer: &DecodedBuffer, start_at: f64) -> Result<(), CallError> {
        let samples = resample_linear(&buffer.samples, buffer.sample_rate, self.device_rate);
        let start_frame = (start_at * self.device_rate as f64).round() as u64;
        let mut mixer = self
            .mixer
            .lock()
            .map_err(|_| CallError::Acquisition("output mixer poisoned".to_string()))?;
        mixer.voices.push(Voice {
            id,
            samples: samples.into(),
            start_frame,
        });
        Ok(())
    }

    fn stop(&mut self, id: u64) {
        match self.mixer.lock() {
            Ok(mut mixer) => mixer.voices.retain(|v| v.id != id),
            Err(_) => warn!("Output mixer poisoned, cannot stop buffer {}", id),
        }
    }

    fn close(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The thread exits as soon as it sees the stop signal
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || {
                    let _ = thread.join();
                    info!("Speaker output closed");
                });
            }
            Err(_) => {
                let _ = thread.join();
                info!("Speaker output closed");
            }
        }
    }

    fn name(&self) -> &str {
        "cpal speaker"
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.close();
    }
}
