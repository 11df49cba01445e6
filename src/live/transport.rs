use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::messages::DEFAULT_OUTPUT_RATE;
use crate::audio::EncodedAudioChunk;
use crate::call::Role;
use crate::error::CallError;

/// Parameters negotiated when the stream opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// System instruction the agent plays along with
    pub system_prompt: String,

    /// Model identifier, e.g. "models/gemini-2.0-flash-live-001"
    pub model: String,

    /// Prebuilt voice name, agent default when unset
    pub voice: Option<String>,

    /// Rate of the PCM16 audio we send; frames at other rates are resampled
    pub input_sample_rate: u32,

    /// Rate assumed for agent audio that does not name its own
    pub output_sample_rate: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            model: "models/gemini-2.0-flash-live-001".to_string(),
            voice: None,
            input_sample_rate: 16000,
            output_sample_rate: DEFAULT_OUTPUT_RATE,
        }
    }
}

/// Event pushed by the live agent stream
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Stream accepted the session setup and is ready for audio
    Opened,
    /// Synthesized PCM16 little-endian audio
    AudioChunk { bytes: Vec<u8>, sample_rate: u32 },
    /// Incremental transcript text for one speaker
    TranscriptDelta { role: Role, text: String },
    /// The user talked over queued agent audio
    Interrupted,
    /// Stream closed by the remote side
    Closed,
    /// Stream failed
    Error { message: String },
}

/// Bidirectional stream to a remote conversational audio agent
#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open the stream; every received event is pushed into `events` in
    /// arrival order until `Closed` or `Error`
    async fn connect(
        &mut self,
        config: &SessionConfig,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), CallError>;

    /// Queue audio for sending. Failures arrive later as `ServerEvent::Error`.
    fn send(&self, chunk: EncodedAudioChunk);

    /// End the stream. Calling it twice is a no-op.
    async fn close(&mut self);

    fn is_connected(&self) -> bool;

    fn name(&self) -> &str;
}
