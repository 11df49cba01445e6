use std::io::Write;

use anyhow::Result;
use callcoach::call::CallConfig;
use callcoach::config::{AppConfig, OutputTarget};
use tempfile::Builder;

#[test]
fn test_missing_file_yields_defaults() -> Result<()> {
    let cfg = AppConfig::load("/nonexistent/callcoach")?;

    assert_eq!(cfg.service.http.port, 8787);
    assert_eq!(cfg.audio.input_sample_rate, 16000);
    assert_eq!(cfg.audio.output_sample_rate, 24000);
    assert_eq!(cfg.audio.frame_duration_ms, 100);
    assert_eq!(cfg.audio.vad_threshold, 0.01);
    assert_eq!(cfg.audio.output, OutputTarget::Headless);
    assert!(cfg.live.url.starts_with("wss://"));
    Ok(())
}

#[test]
fn test_file_overrides_defaults() -> Result<()> {
    let mut file = Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        r#"
[service.http]
port = 9000

[live]
api_key = "from-file"
voice = "Kore"

[audio]
vad_threshold = 0.02
frame_duration_ms = 20
"#
    )?;

    let path = file.path().to_string_lossy().to_string();
    let cfg = AppConfig::load(&path)?;

    assert_eq!(cfg.service.http.port, 9000);
    assert_eq!(cfg.service.http.bind, "127.0.0.1");
    assert_eq!(cfg.live.voice.as_deref(), Some("Kore"));
    assert_eq!(cfg.live.resolved_api_key().as_deref(), Some("from-file"));
    assert_eq!(cfg.audio.vad_threshold, 0.02);
    assert_eq!(cfg.audio.capture_config().frame_samples(), 320);
    Ok(())
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    std::env::set_var("CALLCOACH__SERVICE__NAME", "coach-from-env");
    let cfg = AppConfig::load("/nonexistent/callcoach")?;
    std::env::remove_var("CALLCOACH__SERVICE__NAME");

    assert_eq!(cfg.service.name, "coach-from-env");
    Ok(())
}

#[test]
fn test_call_config_from_app() {
    let mut app = AppConfig::default();
    app.audio.vad_threshold = 0.03;
    app.live.voice = Some("Charon".to_string());

    let call = CallConfig::from_app(&app, "Play a skeptical buyer.");

    assert!(call.session_id.starts_with("call-"));
    assert_eq!(call.session.system_prompt, "Play a skeptical buyer.");
    assert_eq!(call.session.voice.as_deref(), Some("Charon"));
    assert_eq!(call.session.input_sample_rate, 16000);
    assert_eq!(call.session.output_sample_rate, 24000);
    assert_eq!(call.capture.sample_rate, call.session.input_sample_rate);
    assert_eq!(call.capture.frame_samples(), 1600);
    assert_eq!(call.vad_threshold, 0.03);

    let other = CallConfig::from_app(&app, "");
    assert_ne!(call.session_id, other.session_id);
}
