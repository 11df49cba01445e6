// Integration tests for WAV file capture
//
// Fixtures are written on the fly with hound so the tests do not depend on
// checked-in audio.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use callcoach::audio::{AudioBackendFactory, AudioFile, AudioSource, CaptureConfig};
use callcoach::CallError;
use tempfile::TempDir;

fn write_wav(dir: &Path, name: &str, sample_rate: u32, channels: u16, samples: &[i16]) -> Result<PathBuf> {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(path)
}

fn fast_frames() -> CaptureConfig {
    CaptureConfig {
        sample_rate: 16000,
        frame_duration_ms: 10,
        channel_capacity: 8,
    }
}

#[test]
fn test_audio_file_open() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "stereo.wav", 8000, 2, &[16384; 1600])?;

    let audio = AudioFile::open(&path)?;

    assert_eq!(audio.sample_rate, 8000);
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.samples.len(), 1600);
    assert!((audio.duration_seconds - 0.1).abs() < 1e-9);
    assert!(audio.path.contains("stereo.wav"));

    // 16384 / 32768
    assert!(audio.samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    let result = AudioFile::open("/nonexistent/path/to/audio.wav");
    assert!(result.is_err(), "Opening nonexistent file should fail");
}

#[test]
fn test_to_mono_downmixes_and_resamples() -> Result<()> {
    let dir = TempDir::new()?;
    // Left at +0.5, right silent
    let interleaved: Vec<i16> = (0..3200).map(|i| if i % 2 == 0 { 16384 } else { 0 }).collect();
    let path = write_wav(dir.path(), "left.wav", 32000, 2, &interleaved)?;

    let mono = AudioFile::open(&path)?.to_mono(16000);

    assert_eq!(mono.len(), 800);
    assert!(mono.iter().all(|&s| (s - 0.25).abs() < 1e-3));

    Ok(())
}

#[tokio::test]
async fn test_file_backend_emits_fixed_frames_then_silence() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_wav(dir.path(), "short.wav", 16000, 1, &[16384; 200])?;

    let mut backend = AudioBackendFactory::create(&AudioSource::File(path), fast_frames())?;
    let mut frames = backend.start().await?;
    assert!(backend.is_capturing());

    let mut received = Vec::new();
    for _ in 0..3 {
        let frame = tokio::time::timeout(Duration::from_secs(1), frames.recv())
            .await?
            .expect("frame");
        received.push(frame);
    }

    for (i, frame) in received.iter().enumerate() {
        assert_eq!(frame.sequence, i as u64);
        assert_eq!(frame.timestamp_ms, i as u64 * 10);
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.samples.len(), 160);
    }

    assert!(received[0].samples.iter().all(|&s| s > 0.4));
    assert!(received[1].samples[..40].iter().all(|&s| s > 0.4));
    assert!(received[1].samples[40..].iter().all(|&s| s == 0.0));
    assert!(received[2].samples.iter().all(|&s| s == 0.0));

    backend.stop().await?;
    assert!(!backend.is_capturing());

    // Drain whatever was buffered; the channel closes once the replay task is gone
    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        while frames.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "frame channel should close after stop");

    // Stopping twice is fine
    backend.stop().await?;

    Ok(())
}

#[tokio::test]
async fn test_file_backend_missing_file_is_acquisition_error() -> Result<()> {
    let mut backend = AudioBackendFactory::create(
        &AudioSource::File(PathBuf::from("/nonexistent/call.wav")),
        fast_frames(),
    )?;

    let result = backend.start().await;
    assert!(matches!(result, Err(CallError::Acquisition(_))));
    assert!(!backend.is_capturing());

    Ok(())
}
