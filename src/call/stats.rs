use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters for one call attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CallStats {
    /// Connection attempts made, including retries
    pub attempts: u32,

    /// When the current attempt entered `Connecting`
    pub started_at: Option<DateTime<Utc>>,

    /// When the stream reported open
    pub connected_at: Option<DateTime<Utc>>,

    /// Seconds spent connected, filled in at hangup
    pub connected_secs: f64,

    /// Frames delivered by the capture device
    pub frames_captured: u64,

    /// Frames that passed the gate and were sent
    pub frames_forwarded: u64,

    /// Frames held back by the gate or by mute
    pub frames_suppressed: u64,

    /// Audio chunks received from the agent
    pub chunks_received: u64,

    /// Audio chunks skipped because they could not be decoded
    pub chunks_dropped: u64,

    /// Decoded audio chunks the playback output refused
    pub chunks_rejected: u64,

    /// Interruption events handled
    pub interruptions: u64,
}

impl CallStats {
    /// Fresh counters for a new attempt, keeping the attempt count
    pub fn next_attempt(&self) -> Self {
        Self {
            attempts: self.attempts + 1,
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn mark_connected(&mut self) {
        self.connected_at = Some(Utc::now());
    }

    pub fn mark_finished(&mut self) {
        if let Some(connected_at) = self.connected_at {
            let duration = Utc::now().signed_duration_since(connected_at);
            self.connected_secs = duration.num_milliseconds() as f64 / 1000.0;
        }
    }
}
