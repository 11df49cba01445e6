// Scripted stand-ins for the microphone, the speaker and the live agent
//
// Each double reports what happened to it through a shared monitor so tests
// can check for leaked devices and sent audio after the controller is done.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use callcoach::audio::{
    AudioCapture, AudioFrame, AudioOutput, CaptureConfig, DecodedBuffer, EncodedAudioChunk,
    OutputClock,
};
use callcoach::call::{CallBackends, CallConfig, CallHandle, CallSessionController, CallState};
use callcoach::live::{ServerEvent, SessionConfig, SessionTransport};
use callcoach::CallError;
use tokio::sync::mpsc;

pub const TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Capture
// ============================================================================

#[derive(Default)]
pub struct CaptureMonitor {
    sender: Mutex<Option<mpsc::Sender<AudioFrame>>>,
    capturing: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    sequence: AtomicUsize,
    config: Mutex<Option<CaptureConfig>>,
}

impl CaptureMonitor {
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Format the controller asked for on the last attempt
    pub fn config(&self) -> Option<CaptureConfig> {
        self.config.lock().unwrap().clone()
    }

    /// Deliver a frame of `len` samples all equal to `level`
    pub async fn push(&self, level: f32, len: usize) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("capture not started"))?;
        let sample_rate = self.config().map_or(16000, |config| config.sample_rate);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) as u64;
        sender
            .send(AudioFrame {
                samples: vec![level; len],
                sample_rate,
                sequence,
                timestamp_ms: sequence * 100,
            })
            .await
            .map_err(|_| anyhow!("controller dropped the frame channel"))
    }
}

pub struct ScriptedCapture {
    monitor: Arc<CaptureMonitor>,
}

#[async_trait]
impl AudioCapture for ScriptedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CallError> {
        let (tx, rx) = mpsc::channel(64);
        *self.monitor.sender.lock().unwrap() = Some(tx);
        self.monitor.capturing.store(true, Ordering::SeqCst);
        self.monitor.starts.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CallError> {
        self.monitor.sender.lock().unwrap().take();
        self.monitor.capturing.store(false, Ordering::SeqCst);
        self.monitor.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.monitor.is_capturing()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Output
// ============================================================================

/// Playback clock that only moves when told to
#[derive(Default)]
pub struct ClockMonitor {
    now: Mutex<f64>,
    played: Mutex<Vec<(u64, f64)>>,
    stopped: Mutex<Vec<u64>>,
    closes: AtomicUsize,
    rejecting: AtomicBool,
}

impl ClockMonitor {
    /// Make the output refuse every buffer from now on
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn set_now(&self, now: f64) {
        *self.now.lock().unwrap() = now;
    }

    pub fn played(&self) -> Vec<(u64, f64)> {
        self.played.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<u64> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct ManualClockOutput {
    monitor: Arc<ClockMonitor>,
}

impl OutputClock for ManualClockOutput {
    fn now(&self) -> f64 {
        *self.monitor.now.lock().unwrap()
    }
}

impl AudioOutput for ManualClockOutput {
    fn play(&mut self, id: u64, _buffer: &DecodedBuffer, start_at: f64) -> Result<(), CallError> {
        if self.monitor.rejecting.load(Ordering::SeqCst) {
            return Err(CallError::Acquisition("output unplugged".to_string()));
        }
        self.monitor.played.lock().unwrap().push((id, start_at));
        Ok(())
    }

    fn stop(&mut self, id: u64) {
        self.monitor.stopped.lock().unwrap().push(id);
    }

    fn close(&mut self) {
        self.monitor.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "manual-clock"
    }
}

// ============================================================================
// Transport
// ============================================================================

/// How the next `connect` behaves
#[derive(Debug, Clone)]
pub enum ConnectMode {
    /// Connect and report the stream open straight away
    Open,
    /// Connect but wait for the test to send `Opened`
    Silent,
    /// Never finish connecting
    Hang,
    /// Refuse the connection
    Fail(String),
}

#[derive(Default)]
pub struct TransportMonitor {
    events: Mutex<Option<mpsc::UnboundedSender<ServerEvent>>>,
    sent: Mutex<Vec<EncodedAudioChunk>>,
    connected: AtomicBool,
    connects: AtomicUsize,
    closes: AtomicUsize,
    last_session: Mutex<Option<SessionConfig>>,
}

impl TransportMonitor {
    /// Push an event as if the agent sent it
    pub fn emit(&self, event: ServerEvent) -> Result<()> {
        let events = self.events.lock().unwrap();
        let tx = events.as_ref().ok_or_else(|| anyhow!("transport not connected"))?;
        tx.send(event).map_err(|_| anyhow!("controller dropped the event channel"))
    }

    pub fn sent(&self) -> Vec<EncodedAudioChunk> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn last_session(&self) -> Option<SessionConfig> {
        self.last_session.lock().unwrap().clone()
    }
}

pub struct ScriptedTransport {
    monitor: Arc<TransportMonitor>,
    mode: ConnectMode,
}

#[async_trait]
impl SessionTransport for ScriptedTransport {
    async fn connect(
        &mut self,
        session: &SessionConfig,
        events: mpsc::UnboundedSender<ServerEvent>,
    ) -> Result<(), CallError> {
        self.monitor.connects.fetch_add(1, Ordering::SeqCst);
        *self.monitor.last_session.lock().unwrap() = Some(session.clone());

        match &self.mode {
            ConnectMode::Fail(reason) => return Err(CallError::Connection(reason.clone())),
            ConnectMode::Hang => std::future::pending::<()>().await,
            ConnectMode::Open => {
                let _ = events.send(ServerEvent::Opened);
            }
            ConnectMode::Silent => {}
        }

        *self.monitor.events.lock().unwrap() = Some(events);
        self.monitor.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn send(&self, chunk: EncodedAudioChunk) {
        if self.monitor.is_connected() {
            self.monitor.sent.lock().unwrap().push(chunk);
        }
    }

    async fn close(&mut self) {
        self.monitor.events.lock().unwrap().take();
        self.monitor.connected.store(false, Ordering::SeqCst);
        self.monitor.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.monitor.is_connected()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Backends
// ============================================================================

#[derive(Default)]
pub struct TestBackends {
    pub capture: Arc<CaptureMonitor>,
    pub clock: Arc<ClockMonitor>,
    pub transport: Arc<TransportMonitor>,
    /// Per-attempt connect behaviour, `Open` once exhausted
    modes: Mutex<VecDeque<ConnectMode>>,
    /// Per-attempt microphone failures
    capture_failures: Mutex<VecDeque<String>>,
    /// Speaker opens that never finish
    stalled_outputs: AtomicUsize,
}

impl TestBackends {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_modes(modes: impl IntoIterator<Item = ConnectMode>) -> Arc<Self> {
        let backends = Self::default();
        backends.modes.lock().unwrap().extend(modes);
        Arc::new(backends)
    }

    pub fn fail_capture_once(&self, reason: &str) {
        self.capture_failures.lock().unwrap().push_back(reason.to_string());
    }

    /// Make the next speaker open wait forever
    pub fn stall_output_once(&self) {
        self.stalled_outputs.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CallBackends for TestBackends {
    fn capture(&self, config: &CaptureConfig) -> Result<Box<dyn AudioCapture>, CallError> {
        *self.capture.config.lock().unwrap() = Some(config.clone());
        if let Some(reason) = self.capture_failures.lock().unwrap().pop_front() {
            return Err(CallError::Acquisition(reason));
        }
        Ok(Box::new(ScriptedCapture {
            monitor: Arc::clone(&self.capture),
        }))
    }

    async fn output(&self) -> Result<Box<dyn AudioOutput>, CallError> {
        let stalled = self
            .stalled_outputs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(Box::new(ManualClockOutput {
            monitor: Arc::clone(&self.clock),
        }))
    }

    fn transport(&self) -> Box<dyn SessionTransport> {
        let mode = self
            .modes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectMode::Open);
        Box::new(ScriptedTransport {
            monitor: Arc::clone(&self.transport),
            mode,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Spawn a controller over `backends`
pub fn spawn_call(
    backends: Arc<TestBackends>,
) -> (CallHandle, tokio::task::JoinHandle<callcoach::call::CallOutcome>) {
    spawn_call_with(
        CallConfig {
            session_id: "call-test".to_string(),
            ..CallConfig::default()
        },
        backends,
    )
}

pub fn spawn_call_with(
    config: CallConfig,
    backends: Arc<TestBackends>,
) -> (CallHandle, tokio::task::JoinHandle<callcoach::call::CallOutcome>) {
    let (controller, handle) = CallSessionController::new(config, backends);
    (handle, tokio::spawn(controller.run()))
}

pub async fn wait_for_state(handle: &CallHandle, state: CallState) -> Result<()> {
    let mut states = handle.watch_state();
    tokio::time::timeout(TIMEOUT, states.wait_for(|s| *s == state))
        .await
        .map_err(|_| anyhow!("timed out waiting for {state}, still {}", handle.state()))??;
    Ok(())
}

/// Poll `check` until it holds or the timeout passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> Result<()> {
    tokio::time::timeout(TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| anyhow!("condition not reached in time"))
}

/// Start a call and wait until the agent stream is open
pub async fn connected_call() -> Result<(
    Arc<TestBackends>,
    CallHandle,
    tokio::task::JoinHandle<callcoach::call::CallOutcome>,
)> {
    let backends = TestBackends::new();
    let (handle, task) = spawn_call(Arc::clone(&backends));
    handle.start().await?;
    wait_for_state(&handle, CallState::Connected).await?;
    Ok((backends, handle, task))
}

/// PCM16 little-endian bytes for `samples` samples at a fixed level
pub fn pcm16(samples: usize, level: i16) -> Vec<u8> {
    std::iter::repeat(level.to_le_bytes())
        .take(samples)
        .flatten()
        .collect()
}
