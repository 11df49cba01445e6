use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::messages::{ClientMessage, RealtimeInput, ServerMessage, Setup};
use super::transport::{ServerEvent, SessionConfig, SessionTransport};
use crate::audio::EncodedAudioChunk;
use crate::error::CallError;

/// Outbound messages queued while the socket is slow; about 6s of 100ms frames
pub const OUTBOUND_CAPACITY: usize = 64;

/// How long `close` waits for queued messages to flush before giving up
pub const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// WebSocket client for the live conversational agent
pub struct LiveClient {
    url: String,
    api_key: Option<String>,
    outbound: Option<mpsc::Sender<Message>>,
    events: Option<mpsc::UnboundedSender<ServerEvent>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
    dropped: AtomicU64,
}

impl LiveClient {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            outbound: None,
            events: None,
            reader: None,
            writer: None,
            dropped: AtomicU64::new(0),
        }
    }

    /// Endpoint with the API key appended as a query parameter
    pub fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", self.url, sep, key)
            }
            None => self.url.clone(),
        }
    }

    /// Audio chunks discarded because the outbound queue was full
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Translate one raw payload into events
fn dispatch(payload: &[u8], default_rate: u32, events: &mpsc::UnboundedSender<ServerEvent>) {
    match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(msg) => {
            for event in msg.into_events(default_rate) {
                let _ = events.send(event);
            }
        }
        Err(e) => warn!("Failed to parse live agent message: {}", e),
    }
}

fn close_event(frame: Option<CloseFrame<'static>>) -> ServerEvent {
    match frame {
        Some(frame) if frame.code != CloseCode::Normal => ServerEvent::Error {
            message: format!(
                "stream closed with code {}: {}",
                u16::from(frame.code),
                frame.reason
            ),
        },
        _ => ServerEvent::Closed,
    }
}

#[async_trait::async_trait]
impl SessionTransport for LiveClient {
    async fn connect(
        &mut self,
        config: &SessionConfig,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), CallError> {
        if self.outbound.is_some() {
            return Err(CallError::Connection("Already connected".to_string()));
        }

        info!("Connecting to live agent at {}", self.url);

        let (socket, _response) = tokio_tungstenite::connect_async(self.endpoint())
            .await
            .map_err(|e| CallError::Connection(format!("websocket handshake failed: {e}")))?;
        let (mut sink, mut stream) = socket.split();

        let setup = serde_json::to_string(&ClientMessage::Setup(Setup::from_config(config)))
            .map_err(|e| CallError::Connection(format!("failed to encode setup: {e}")))?;
        sink.send(Message::Text(setup))
            .await
            .map_err(|e| CallError::Connection(format!("failed to send setup: {e}")))?;

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);

        let writer_events = events.clone();
        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    error!("Failed to send to live agent: {}", e);
                    let _ = writer_events.send(ServerEvent::Error {
                        message: format!("send failed: {e}"),
                    });
                    return;
                }
            }
            let _ = sink.close().await;
            debug!("Live agent writer stopped");
        });

        let reader_events = events.clone();
        let default_rate = config.output_sample_rate;
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        dispatch(text.as_bytes(), default_rate, &reader_events)
                    }
                    Ok(Message::Binary(bytes)) => dispatch(&bytes, default_rate, &reader_events),
                    Ok(Message::Close(frame)) => {
                        info!("Live agent closed the stream");
                        let _ = reader_events.send(close_event(frame));
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Live agent stream error: {}", e);
                        let _ = reader_events.send(ServerEvent::Error {
                            message: e.to_string(),
                        });
                        return;
                    }
                }
            }
            let _ = reader_events.send(ServerEvent::Closed);
        });

        self.outbound = Some(out_tx);
        self.events = Some(events);
        self.reader = Some(reader);
        self.writer = Some(writer);
        self.dropped.store(0, Ordering::Relaxed);

        info!("Live agent stream established, awaiting setup acknowledgement");
        Ok(())
    }

    fn send(&self, chunk: EncodedAudioChunk) {
        let (Some(outbound), Some(events)) = (&self.outbound, &self.events) else {
            warn!("Dropping audio chunk: live agent stream not connected");
            return;
        };

        let payload = match serde_json::to_string(&ClientMessage::RealtimeInput(
            RealtimeInput::from_chunk(&chunk),
        )) {
            Ok(payload) => payload,
            Err(e) => {
                let _ = events.send(ServerEvent::Error {
                    message: format!("failed to encode audio: {e}"),
                });
                return;
            }
        };

        match outbound.try_send(Message::Text(payload)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 50 == 1 {
                    warn!(
                        "Live agent is not keeping up, {} audio chunks dropped",
                        dropped
                    );
                }
            }
            Err(TrySendError::Closed(_)) => {
                let _ = events.send(ServerEvent::Error {
                    message: "live agent writer stopped".to_string(),
                });
            }
        }
    }

    async fn close(&mut self) {
        let Some(outbound) = self.outbound.take() else {
            return;
        };

        info!("Closing live agent stream");
        if outbound.try_send(Message::Close(None)).is_err() {
            debug!("Outbound queue full or closed, skipping close frame");
        }
        drop(outbound);

        if let Some(mut writer) = self.writer.take() {
            match tokio::time::timeout(CLOSE_GRACE, &mut writer).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Live agent writer task failed: {}", e),
                Err(_) => {
                    warn!(
                        "Live agent did not drain within {:?}, abandoning the socket",
                        CLOSE_GRACE
                    );
                    writer.abort();
                }
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.events = None;
    }

    fn is_connected(&self) -> bool {
        self.outbound.is_some()
    }

    fn name(&self) -> &str {
        "live agent websocket"
    }
}
