//! Voice activity gate deciding which captured frames go upstream.
//!
//! The gate is a plain energy threshold with no hysteresis or debounce, so a
//! signal hovering at the threshold flickers between forwarded and suppressed.
//! Keep it memoryless: the remote agent does its own turn detection.

use super::backend::AudioFrame;
use super::meter::rms;

/// RMS level above which a frame counts as speech
pub const DEFAULT_VAD_THRESHOLD: f32 = 0.01;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Forward,
    Suppress,
}

/// Stateless per-frame energy gate
#[derive(Debug, Clone, Copy)]
pub struct VoiceActivityGate {
    threshold: f32,
}

impl VoiceActivityGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Forward iff `rms(samples) > threshold`; the boundary is exclusive
    pub fn decide_samples(&self, samples: &[f32]) -> GateDecision {
        if rms(samples) > self.threshold {
            GateDecision::Forward
        } else {
            GateDecision::Suppress
        }
    }

    pub fn decide(&self, frame: &AudioFrame) -> GateDecision {
        self.decide_samples(&frame.samples)
    }
}

impl Default for VoiceActivityGate {
    fn default() -> Self {
        Self::new(DEFAULT_VAD_THRESHOLD)
    }
}
