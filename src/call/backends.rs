use crate::audio::{
    AudioBackendFactory, AudioCapture, AudioOutput, AudioSource, CaptureConfig, HeadlessOutput,
};
use crate::config::{AppConfig, OutputTarget};
use crate::error::CallError;
use crate::live::{LiveClient, SessionTransport};

/// Creates fresh devices and a fresh stream for every call attempt
#[async_trait::async_trait]
pub trait CallBackends: Send + Sync {
    /// Capture source delivering frames in `config`'s format
    fn capture(&self, config: &CaptureConfig) -> Result<Box<dyn AudioCapture>, CallError>;

    /// Open the playback output; may wait on the device
    async fn output(&self) -> Result<Box<dyn AudioOutput>, CallError>;

    fn transport(&self) -> Box<dyn SessionTransport>;
}

/// Backends built from application configuration
pub struct DefaultBackends {
    source: AudioSource,
    output: OutputTarget,
    live_url: String,
    api_key: Option<String>,
}

impl DefaultBackends {
    pub fn new(app: &AppConfig, source: AudioSource) -> Self {
        Self {
            source,
            output: app.audio.output,
            live_url: app.live.url.clone(),
            api_key: app.live.resolved_api_key(),
        }
    }
}

#[async_trait::async_trait]
impl CallBackends for DefaultBackends {
    fn capture(&self, config: &CaptureConfig) -> Result<Box<dyn AudioCapture>, CallError> {
        AudioBackendFactory::create(&self.source, config.clone())
    }

    async fn output(&self) -> Result<Box<dyn AudioOutput>, CallError> {
        match self.output {
            OutputTarget::Headless => Ok(Box::new(HeadlessOutput::new())),
            OutputTarget::Device => {
                #[cfg(feature = "device")]
                {
                    Ok(Box::new(crate::audio::device::DeviceOutput::open().await?))
                }

                #[cfg(not(feature = "device"))]
                {
                    Err(CallError::Acquisition(
                        "speaker output requires the `device` feature".to_string(),
                    ))
                }
            }
        }
    }

    fn transport(&self) -> Box<dyn SessionTransport> {
        Box::new(LiveClient::new(self.live_url.clone(), self.api_key.clone()))
    }
}
