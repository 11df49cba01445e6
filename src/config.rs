use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::{CaptureConfig, DEFAULT_VAD_THRESHOLD};

/// Environment variable consulted when `live.api_key` is empty
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub live: LiveConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "callcoach".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub voice: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            api_key: String::new(),
            model: "models/gemini-2.0-flash-live-001".to_string(),
            voice: Some("Puck".to_string()),
        }
    }
}

impl LiveConfig {
    /// Configured key, falling back to the environment
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
    }
}

/// Where agent audio is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputTarget {
    /// Clock only, no sound
    Headless,
    /// Default speaker (feature `device`)
    Device,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub frame_duration_ms: u64,
    pub vad_threshold: f32,
    pub channel_capacity: usize,
    pub output: OutputTarget,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            frame_duration_ms: 100,
            vad_threshold: DEFAULT_VAD_THRESHOLD,
            channel_capacity: 64,
            output: OutputTarget::Headless,
        }
    }
}

impl AudioConfig {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.input_sample_rate,
            frame_duration_ms: self.frame_duration_ms,
            channel_capacity: self.channel_capacity,
        }
    }
}

impl AppConfig {
    /// Load from `path` (extension optional, file optional) layered with
    /// `CALLCOACH__SECTION__KEY` environment variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CALLCOACH").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {path}"))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
