use base64::Engine;
use callcoach::audio::EncodedAudioChunk;
use callcoach::call::Role;
use callcoach::live::messages::{
    ClientMessage, RealtimeInput, ServerMessage, Setup, DEFAULT_OUTPUT_RATE,
};
use callcoach::live::{ServerEvent, SessionConfig};

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[test]
fn test_setup_serialization() {
    let config = SessionConfig {
        system_prompt: "You are Kari, a busy CFO.".to_string(),
        voice: Some("Puck".to_string()),
        ..SessionConfig::default()
    };

    let json = serde_json::to_value(ClientMessage::Setup(Setup::from_config(&config))).unwrap();
    let setup = &json["setup"];

    assert_eq!(setup["model"], "models/gemini-2.0-flash-live-001");
    assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
    assert_eq!(
        setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
        "Puck"
    );
    assert_eq!(
        setup["systemInstruction"]["parts"][0]["text"],
        "You are Kari, a busy CFO."
    );
    assert!(setup["inputAudioTranscription"].is_object());
    assert!(setup["outputAudioTranscription"].is_object());
}

#[test]
fn test_setup_without_prompt_or_voice() {
    let json = serde_json::to_string(&ClientMessage::Setup(Setup::from_config(
        &SessionConfig::default(),
    )))
    .unwrap();

    assert!(!json.contains("systemInstruction"));
    assert!(!json.contains("speechConfig"));
}

#[test]
fn test_realtime_input_serialization() {
    let chunk = EncodedAudioChunk::from_samples(&[0.0, 0.5], 16000);
    let json = serde_json::to_value(ClientMessage::RealtimeInput(RealtimeInput::from_chunk(&chunk)))
        .unwrap();

    let audio = &json["realtimeInput"]["audio"];
    assert_eq!(audio["mimeType"], "audio/pcm;rate=16000");
    assert_eq!(audio["data"], b64(&chunk.bytes));
}

#[test]
fn test_server_content_event_order() {
    let json = format!(
        r#"{{
            "serverContent": {{
                "interrupted": true,
                "inputTranscription": {{"text": "hello"}},
                "modelTurn": {{"parts": [
                    {{"inlineData": {{"mimeType": "audio/pcm;rate=24000", "data": "{}"}}}}
                ]}},
                "outputTranscription": {{"text": "Hei"}}
            }}
        }}"#,
        b64(&[1, 0, 2, 0])
    );

    let msg: ServerMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(
        msg.into_events(DEFAULT_OUTPUT_RATE),
        vec![
            ServerEvent::Interrupted,
            ServerEvent::TranscriptDelta {
                role: Role::User,
                text: "hello".to_string()
            },
            ServerEvent::AudioChunk {
                bytes: vec![1, 0, 2, 0],
                sample_rate: 24000
            },
            ServerEvent::TranscriptDelta {
                role: Role::Model,
                text: "Hei".to_string()
            },
        ]
    );
}

#[test]
fn test_audio_rate_falls_back_to_configured_rate() {
    let json = format!(
        r#"{{"serverContent": {{"modelTurn": {{"parts": [
            {{"inlineData": {{"mimeType": "audio/pcm", "data": "{}"}}}}
        ]}}}}}}"#,
        b64(&[0, 0])
    );

    let msg: ServerMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(
        msg.into_events(22050),
        vec![ServerEvent::AudioChunk {
            bytes: vec![0, 0],
            sample_rate: 22050
        }]
    );
}

#[test]
fn test_text_parts_and_empty_transcripts_are_ignored() {
    let json = r#"{
        "serverContent": {
            "modelTurn": {"parts": [{"text": "thinking..."}]},
            "outputTranscription": {"text": ""},
            "turnComplete": true
        }
    }"#;

    let msg: ServerMessage = serde_json::from_str(json).unwrap();
    assert!(msg.into_events(DEFAULT_OUTPUT_RATE).is_empty());
}
