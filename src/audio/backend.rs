use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::CallError;

/// Mono audio block pulled from a capture device
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Normalized samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Monotonically increasing index, starting at 0 for each capture
    pub sequence: u64,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Frame length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate frames are delivered at (will resample if needed)
    pub sample_rate: u32,
    /// Length of every frame in milliseconds
    pub frame_duration_ms: u64,
    /// Frames buffered between the device and the controller
    pub channel_capacity: usize,
}

impl CaptureConfig {
    /// Samples per frame at the configured rate
    pub fn frame_samples(&self) -> usize {
        ((self.sample_rate as u64 * self.frame_duration_ms) / 1000).max(1) as usize
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,     // live agent expects 16kHz input
            frame_duration_ms: 100, // 100ms frames
            channel_capacity: 64,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal input device (feature `device`)
/// - File: replays a WAV file in real time (testing, scripted calls)
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Returns a channel receiver that yields frames at a fixed rate until
    /// `stop` is called.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CallError>;

    /// Stop capturing and release the device. Calling it twice is a no-op.
    async fn stop(&mut self) -> Result<(), CallError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Microphone input, optionally a named device
    Microphone { device: Option<String> },
    /// File input (for testing/scripted calls)
    File(PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create a capture backend for the given source
    pub fn create(
        source: &AudioSource,
        config: CaptureConfig,
    ) -> Result<Box<dyn AudioCapture>, CallError> {
        match source {
            AudioSource::Microphone { device } => {
                #[cfg(feature = "device")]
                {
                    use super::device::MicrophoneBackend;
                    Ok(Box::new(MicrophoneBackend::new(device.clone(), config)))
                }

                #[cfg(not(feature = "device"))]
                {
                    let _ = (device, config);
                    Err(CallError::Acquisition(
                        "microphone capture requires the `device` feature".to_string(),
                    ))
                }
            }

            AudioSource::File(path) => {
                use super::file::WavFileBackend;
                Ok(Box::new(WavFileBackend::new(path.clone(), config)))
            }
        }
    }
}
