use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Weight of the newest frame in the smoothed level
const SMOOTHING: f32 = 0.2;

/// Root-mean-square amplitude of a block of normalized samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt()
}

/// Smoothed microphone loudness for presentation
///
/// Cheap to clone; all clones share one level.
#[derive(Clone, Debug)]
pub struct LoudnessMeter {
    level_bits: Arc<AtomicU32>,
}

impl LoudnessMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(0.0f32.to_bits())),
        }
    }

    /// Fold one frame's RMS into the smoothed level and return it
    pub fn observe(&self, frame_rms: f32) -> f32 {
        let previous = self.level();
        let next = previous * (1.0 - SMOOTHING) + frame_rms * SMOOTHING;
        self.level_bits.store(next.to_bits(), Ordering::Relaxed);
        next
    }

    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.level_bits.store(0.0f32.to_bits(), Ordering::Relaxed);
    }
}

impl Default for LoudnessMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_empty_is_zero() {
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        assert!((rms(&[0.5; 160]) - 0.5).abs() < 1e-6);
        assert!((rms(&[-0.5, 0.5, -0.5, 0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_meter_smooths_towards_input() {
        let meter = LoudnessMeter::new();
        let first = meter.observe(1.0);
        assert!((first - 0.2).abs() < 1e-6);
        let second = meter.observe(1.0);
        assert!((second - 0.36).abs() < 1e-6);
        assert_eq!(meter.clone().level(), second);
    }

    #[test]
    fn test_meter_reset() {
        let meter = LoudnessMeter::new();
        meter.observe(0.8);
        meter.reset();
        assert_eq!(meter.level(), 0.0);
    }
}
