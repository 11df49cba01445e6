pub mod audio;
pub mod call;
pub mod coach;
pub mod config;
pub mod error;
pub mod http;
pub mod live;

pub use audio::{
    AudioBackendFactory, AudioCapture, AudioFrame, AudioOutput, AudioSource, CaptureConfig,
    EncodedAudioChunk, OutputClock, PlaybackScheduler, VoiceActivityGate,
};
pub use call::{
    CallBackends, CallConfig, CallHandle, CallOutcome, CallSessionController, CallSnapshot,
    CallState, DefaultBackends, Role, TranscriptAssembler, TranscriptMessage,
};
pub use config::AppConfig;
pub use error::CallError;
pub use http::{create_router, AppState};
pub use live::{LiveClient, ServerEvent, SessionConfig, SessionTransport};
