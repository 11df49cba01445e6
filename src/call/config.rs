use crate::audio::{CaptureConfig, DEFAULT_VAD_THRESHOLD};
use crate::config::AppConfig;
use crate::live::SessionConfig;

/// Configuration for one simulated call
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// Unique call identifier (e.g., "call-5f0c...")
    pub session_id: String,

    /// Parameters sent to the agent when the stream opens
    pub session: SessionConfig,

    /// Microphone frame format
    pub capture: CaptureConfig,

    /// RMS level a frame must exceed to be sent
    pub vad_threshold: f32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            session_id: format!("call-{}", uuid::Uuid::new_v4()),
            session: SessionConfig::default(),
            capture: CaptureConfig::default(),
            vad_threshold: DEFAULT_VAD_THRESHOLD,
        }
    }
}

impl CallConfig {
    pub fn from_app(app: &AppConfig, system_prompt: impl Into<String>) -> Self {
        Self {
            session: SessionConfig {
                system_prompt: system_prompt.into(),
                model: app.live.model.clone(),
                voice: app.live.voice.clone(),
                input_sample_rate: app.audio.input_sample_rate,
                output_sample_rate: app.audio.output_sample_rate,
            },
            capture: app.audio.capture_config(),
            vad_threshold: app.audio.vad_threshold,
            ..Self::default()
        }
    }
}
