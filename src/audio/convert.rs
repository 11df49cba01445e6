// PCM conversions between capture, wire and playback formats

use crate::error::CallError;

/// Fixed-width little-endian PCM16 payload sent to the live agent
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedAudioChunk {
    /// Little-endian i16 samples
    pub bytes: Vec<u8>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl EncodedAudioChunk {
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            bytes: encode_pcm16(samples),
            sample_rate,
        }
    }

    /// Wire mime type, e.g. `audio/pcm;rate=16000`
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Encode normalized samples as PCM16 little-endian bytes (clamped)
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .flat_map(|s| s.to_le_bytes())
        .collect()
}

/// Decode PCM16 little-endian bytes into normalized samples
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>, CallError> {
    if bytes.is_empty() {
        return Err(CallError::Decode("empty audio payload".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(CallError::Decode(format!(
            "PCM16 payload has odd length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32_768.0)
        .collect())
}

/// Average interleaved channels down to mono
pub fn downmix_to_mono<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

/// Linear-interpolation resampler
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}
