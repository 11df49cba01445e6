//! Gap-less scheduling of received agent audio.
//!
//! A single cursor tracks where the next buffer starts on the output clock.
//! Buffers are laid end to end as long as they arrive in time; an
//! interruption stops everything in flight and snaps the cursor back to now.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::convert::decode_pcm16;
use crate::error::CallError;

/// Source of playback time, in seconds
pub trait OutputClock: Send {
    fn now(&self) -> f64;
}

/// Audio sink able to start buffers at a clock time and cut them off
pub trait AudioOutput: OutputClock {
    /// Queue `buffer` to start at `start_at` on this output's clock
    fn play(&mut self, id: u64, buffer: &DecodedBuffer, start_at: f64) -> Result<(), CallError>;

    /// Stop a buffer immediately, whether started or still pending
    fn stop(&mut self, id: u64);

    /// Release the output device
    fn close(&mut self);

    fn name(&self) -> &str;
}

/// Decoded mono audio ready for output
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
}

impl DecodedBuffer {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A buffer owned by the scheduler until it finishes or is cancelled
#[derive(Debug, Clone)]
pub struct PlaybackItem {
    pub id: u64,
    pub buffer: DecodedBuffer,
    pub scheduled_start: f64,
}

impl PlaybackItem {
    pub fn end_time(&self) -> f64 {
        self.scheduled_start + self.buffer.duration_secs()
    }
}

pub struct PlaybackScheduler {
    output: Box<dyn AudioOutput>,
    next_start_time: f64,
    active: Vec<PlaybackItem>,
    next_id: u64,
}

impl PlaybackScheduler {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        let next_start_time = output.now();
        info!("Playback scheduler ready on {}", output.name());
        Self {
            output,
            next_start_time,
            active: Vec::new(),
            next_id: 0,
        }
    }

    /// Decode a PCM16 chunk and schedule it
    ///
    /// Undecodable chunks are logged and skipped with `CallError::Decode`;
    /// the call carries on.
    pub fn enqueue_pcm16(
        &mut self,
        bytes: &[u8],
        sample_rate: u32,
    ) -> Result<PlaybackItem, CallError> {
        let samples = decode_pcm16(bytes).map_err(|e| {
            warn!("Skipping audio chunk: {}", e);
            e
        })?;

        self.schedule(DecodedBuffer {
            samples: samples.into(),
            sample_rate,
        })
    }

    /// Schedule a decoded buffer right after the previous one
    pub fn schedule(&mut self, buffer: DecodedBuffer) -> Result<PlaybackItem, CallError> {
        self.reap_finished();

        let now = self.output.now();
        let start = self.next_start_time.max(now);
        let id = self.next_id;
        self.next_id += 1;

        if let Err(e) = self.output.play(id, &buffer, start) {
            warn!("Output rejected buffer {}: {}", id, e);
            return Err(e);
        }

        let item = PlaybackItem {
            id,
            buffer,
            scheduled_start: start,
        };
        self.next_start_time = item.end_time();
        debug!(
            "Scheduled buffer {} at {:.3}s ({:.3}s long)",
            id,
            start,
            item.buffer.duration_secs()
        );
        self.active.push(item.clone());

        Ok(item)
    }

    /// Hard-cut everything in flight; returns how many buffers were dropped
    pub fn interrupt(&mut self) -> usize {
        let dropped = self.active.len();
        for item in self.active.drain(..) {
            self.output.stop(item.id);
        }
        self.next_start_time = self.output.now();
        if dropped > 0 {
            info!("Playback interrupted, {} buffers cancelled", dropped);
        }
        dropped
    }

    /// Drop buffers whose playback has naturally completed
    pub fn reap_finished(&mut self) {
        let now = self.output.now();
        self.active.retain(|item| item.end_time() > now);
    }

    pub fn active(&self) -> &[PlaybackItem] {
        &self.active
    }

    pub fn active_count(&mut self) -> usize {
        self.reap_finished();
        self.active.len()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn now(&self) -> f64 {
        self.output.now()
    }

    /// Cancel pending audio and release the output
    pub fn close(&mut self) {
        self.interrupt();
        self.output.close();
    }
}

/// Output with a wall clock and no sound
///
/// Used by the HTTP server and by builds without device support.
pub struct HeadlessOutput {
    epoch: Instant,
    closed: bool,
}

impl HeadlessOutput {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            closed: false,
        }
    }
}

impl Default for HeadlessOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputClock for HeadlessOutput {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl AudioOutput for HeadlessOutput {
    fn play(&mut self, id: u64, buffer: &DecodedBuffer, start_at: f64) -> Result<(), CallError> {
        if self.closed {
            return Err(CallError::Acquisition("output closed".to_string()));
        }
        debug!(
            "Headless output: buffer {} ({} samples) at {:.3}s",
            id,
            buffer.samples.len(),
            start_at
        );
        Ok(())
    }

    fn stop(&mut self, _id: u64) {}

    fn close(&mut self) {
        self.closed = true;
    }

    fn name(&self) -> &str {
        "headless"
    }
}
