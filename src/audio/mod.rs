pub mod backend;
pub mod convert;
pub mod file;
pub mod meter;
pub mod playback;
pub mod vad;

#[cfg(feature = "device")]
pub mod device;

pub use backend::{AudioBackendFactory, AudioCapture, AudioFrame, AudioSource, CaptureConfig};
pub use convert::{decode_pcm16, encode_pcm16, resample_linear, EncodedAudioChunk};
pub use file::{AudioFile, WavFileBackend};
pub use meter::{rms, LoudnessMeter};
pub use playback::{
    AudioOutput, DecodedBuffer, HeadlessOutput, OutputClock, PlaybackItem, PlaybackScheduler,
};
pub use vad::{GateDecision, VoiceActivityGate, DEFAULT_VAD_THRESHOLD};
