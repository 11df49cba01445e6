use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioCapture, AudioFrame, CaptureConfig};
use super::convert::{downmix_to_mono, resample_linear};
use crate::error::CallError;

/// WAV file decoded into normalized interleaved samples
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels.max(1) as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono samples at `target_rate`
    pub fn to_mono(&self, target_rate: u32) -> Vec<f32> {
        let mut mono = Vec::with_capacity(self.samples.len() / self.channels.max(1) as usize);
        downmix_to_mono(&mut mono, &self.samples, self.channels as usize, |s| s);
        resample_linear(&mono, self.sample_rate, target_rate)
    }
}

/// Capture backend that replays a WAV file in real time
///
/// Once the file is exhausted it keeps producing silent frames, so the
/// frame clock never stalls mid-call.
pub struct WavFileBackend {
    path: PathBuf,
    config: CaptureConfig,
    task: Option<JoinHandle<()>>,
}

impl WavFileBackend {
    pub fn new(path: PathBuf, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioCapture for WavFileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CallError> {
        if self.task.is_some() {
            return Err(CallError::Acquisition("Already capturing".to_string()));
        }

        let audio = AudioFile::open(&self.path)
            .map_err(|e| CallError::Acquisition(format!("{e:#}")))?;
        let samples = audio.to_mono(self.config.sample_rate);

        let frame_samples = self.config.frame_samples();
        let frame_ms = self.config.frame_duration_ms.max(1);
        let sample_rate = self.config.sample_rate;
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            let mut offset = 0usize;
            let mut sequence = 0u64;

            loop {
                ticker.tick().await;

                let mut block = vec![0.0f32; frame_samples];
                if offset < samples.len() {
                    let end = (offset + frame_samples).min(samples.len());
                    block[..end - offset].copy_from_slice(&samples[offset..end]);
                    offset = end;
                }

                let frame = AudioFrame {
                    samples: block,
                    sample_rate,
                    sequence,
                    timestamp_ms: sequence * frame_ms,
                };
                if tx.send(frame).await.is_err() {
                    debug!("Frame receiver dropped, file replay finished");
                    break;
                }
                sequence += 1;
            }
        });

        self.task = Some(task);
        info!(
            "File capture started: {} ({} samples per frame)",
            self.path.display(),
            frame_samples
        );

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CallError> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped: {}", self.path.display());
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        "WAV file replay"
    }
}
