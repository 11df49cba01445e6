use std::future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use super::backends::CallBackends;
use super::config::CallConfig;
use super::resources::{acquire, Acquired, CallResources};
use super::state::{CallSession, CallState};
use super::stats::CallStats;
use super::transcript::{TranscriptAssembler, TranscriptMessage};
use crate::audio::{
    resample_linear, rms, AudioFrame, EncodedAudioChunk, GateDecision, LoudnessMeter,
    VoiceActivityGate,
};
use crate::error::CallError;
use crate::live::ServerEvent;

const INBOX_CAPACITY: usize = 16;

/// User-level operations on a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Hangup,
    SetMuted(bool),
    ToggleMute,
    Retry,
    Cancel,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Hangup => "hang up",
            Command::SetMuted(_) | Command::ToggleMute => "mute",
            Command::Retry => "retry",
            Command::Cancel => "cancel",
        }
    }
}

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<CallState, CallError>>,
}

enum HandleMsg {
    Command(Request),
    Snapshot(oneshot::Sender<CallSnapshot>),
}

/// Point-in-time view of a call for display
#[derive(Debug, Clone, Serialize)]
pub struct CallSnapshot {
    pub id: String,
    pub state: CallState,
    pub muted: bool,
    pub error: Option<String>,
    pub loudness: f32,
    pub transcript: Vec<TranscriptMessage>,
    pub active_playback: usize,
    pub stats: CallStats,
}

/// What a finished call hands back
#[derive(Debug, Clone, Serialize)]
pub struct CallOutcome {
    pub session_id: String,
    pub transcript: Vec<TranscriptMessage>,
    pub stats: CallStats,
    /// Last failure seen, if the call ended from `Error`
    pub error: Option<String>,
}

/// Cloneable remote control for a running controller
#[derive(Clone)]
pub struct CallHandle {
    id: String,
    tx: mpsc::Sender<HandleMsg>,
    state: watch::Receiver<CallState>,
    meter: LoudnessMeter,
}

impl CallHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn start(&self) -> Result<CallState, CallError> {
        self.command(Command::Start).await
    }

    pub async fn hangup(&self) -> Result<CallState, CallError> {
        self.command(Command::Hangup).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<CallState, CallError> {
        self.command(Command::SetMuted(muted)).await
    }

    pub async fn toggle_mute(&self) -> Result<CallState, CallError> {
        self.command(Command::ToggleMute).await
    }

    pub async fn retry(&self) -> Result<CallState, CallError> {
        self.command(Command::Retry).await
    }

    pub async fn cancel(&self) -> Result<CallState, CallError> {
        self.command(Command::Cancel).await
    }

    pub async fn command(&self, command: Command) -> Result<CallState, CallError> {
        let operation = command.name();
        let gone = CallError::State {
            operation,
            state: CallState::Ended,
        };

        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(HandleMsg::Command(Request { command, reply }))
            .await
            .is_err()
        {
            return Err(gone);
        }
        rx.await.unwrap_or(Err(gone))
    }

    pub async fn snapshot(&self) -> Result<CallSnapshot, CallError> {
        let gone = CallError::State {
            operation: "inspect",
            state: CallState::Ended,
        };

        let (reply, rx) = oneshot::channel();
        if self.tx.send(HandleMsg::Snapshot(reply)).await.is_err() {
            return Err(gone);
        }
        rx.await.map_err(|_| gone)
    }

    /// Last published state
    pub fn state(&self) -> CallState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CallState> {
        self.state.clone()
    }

    /// Smoothed microphone level, 0 while muted
    pub fn loudness(&self) -> f32 {
        self.meter.level()
    }
}

/// Setup running in the background
struct Pending {
    task: JoinHandle<Result<Acquired, CallError>>,
    cancel: watch::Sender<bool>,
    /// Held back until setup completes so `Opened` cannot outrun it
    events: mpsc::UnboundedReceiver<ServerEvent>,
}

enum Step {
    Frame(Option<AudioFrame>),
    Event(Option<ServerEvent>),
    Acquired(Result<Result<Acquired, CallError>, JoinError>),
    Inbox(Option<HandleMsg>),
}

/// Drives one call through its lifecycle
///
/// All call state is owned by the `run` loop. Microphone frames, agent
/// events, setup completion and user commands arrive on channels and are
/// handled one at a time, in that priority order.
pub struct CallSessionController {
    config: CallConfig,
    backends: Arc<dyn CallBackends>,
    session: CallSession,
    transcript: TranscriptAssembler,
    gate: VoiceActivityGate,
    meter: LoudnessMeter,
    stats: CallStats,
    resources: CallResources,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    events: Option<mpsc::UnboundedReceiver<ServerEvent>>,
    pending: Option<Pending>,
    state_tx: watch::Sender<CallState>,
    inbox: mpsc::Receiver<HandleMsg>,
    last_error: Option<String>,
}

async fn next_frame(frames: &mut Option<mpsc::Receiver<AudioFrame>>) -> Option<AudioFrame> {
    match frames {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn next_event(events: &mut Option<mpsc::UnboundedReceiver<ServerEvent>>) -> Option<ServerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn setup_done(pending: &mut Option<Pending>) -> Result<Result<Acquired, CallError>, JoinError> {
    match pending {
        Some(p) => (&mut p.task).await,
        None => future::pending().await,
    }
}

impl CallSessionController {
    pub fn new(config: CallConfig, backends: Arc<dyn CallBackends>) -> (Self, CallHandle) {
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let (state_tx, state_rx) = watch::channel(CallState::Idle);
        let meter = LoudnessMeter::new();

        let handle = CallHandle {
            id: config.session_id.clone(),
            tx,
            state: state_rx,
            meter: meter.clone(),
        };

        let controller = Self {
            session: CallSession::new(config.session_id.clone()),
            gate: VoiceActivityGate::new(config.vad_threshold),
            config,
            backends,
            transcript: TranscriptAssembler::new(),
            meter,
            stats: CallStats::default(),
            resources: CallResources::default(),
            frames: None,
            events: None,
            pending: None,
            state_tx,
            inbox,
            last_error: None,
        };

        (controller, handle)
    }

    /// Run until the call is `Ended` or every handle is dropped
    pub async fn run(mut self) -> CallOutcome {
        info!("Call {} ready", self.session.id);

        while self.session.state() != CallState::Ended {
            let step = tokio::select! {
                biased;
                frame = next_frame(&mut self.frames) => Step::Frame(frame),
                event = next_event(&mut self.events) => Step::Event(event),
                done = setup_done(&mut self.pending) => Step::Acquired(done),
                msg = self.inbox.recv() => Step::Inbox(msg),
            };

            match step {
                Step::Frame(Some(frame)) => self.on_frame(frame),
                Step::Frame(None) => self.fail_live("microphone stream ended").await,
                Step::Event(event) => self.on_event(event).await,
                Step::Acquired(result) => self.on_setup_done(result),
                Step::Inbox(Some(HandleMsg::Command(request))) => {
                    let result = self.on_command(request.command).await;
                    self.publish_state();
                    let _ = request.reply.send(result);
                }
                Step::Inbox(Some(HandleMsg::Snapshot(reply))) => {
                    let _ = reply.send(self.snapshot());
                }
                Step::Inbox(None) => {
                    info!("All handles dropped, hanging up call {}", self.session.id);
                    if let Err(e) = self.on_command(Command::Hangup).await {
                        warn!("Hangup failed: {}", e);
                        break;
                    }
                }
            }

            self.publish_state();
        }

        self.finish()
    }

    fn on_frame(&mut self, frame: AudioFrame) {
        self.stats.frames_captured += 1;

        let level = if self.session.muted { 0.0 } else { rms(&frame.samples) };
        self.meter.observe(level);

        if self.session.state() != CallState::Connected {
            return;
        }

        if self.session.muted || self.gate.decide(&frame) == GateDecision::Suppress {
            self.stats.frames_suppressed += 1;
            return;
        }

        match self.resources.transport() {
            Some(transport) => {
                let rate = self.config.session.input_sample_rate;
                let samples = resample_linear(&frame.samples, frame.sample_rate, rate);
                transport.send(EncodedAudioChunk::from_samples(&samples, rate));
                self.stats.frames_forwarded += 1;
            }
            None => warn!("Dropping frame {}: no transport", frame.sequence),
        }
    }

    async fn on_event(&mut self, event: Option<ServerEvent>) {
        let Some(event) = event else {
            self.fail_live("event stream ended").await;
            return;
        };

        match event {
            ServerEvent::Opened => {
                if self.session.state() == CallState::Connecting {
                    if let Err(e) = self.session.transition("open", CallState::Connected) {
                        warn!("{}", e);
                        return;
                    }
                    self.stats.mark_connected();
                } else {
                    debug!("Ignoring open while {}", self.session.state());
                }
            }
            ServerEvent::AudioChunk { bytes, sample_rate } => {
                self.stats.chunks_received += 1;
                if let Some(playback) = self.resources.playback_mut() {
                    match playback.enqueue_pcm16(&bytes, sample_rate) {
                        Ok(_) => {}
                        Err(CallError::Decode(_)) => self.stats.chunks_dropped += 1,
                        Err(_) => self.stats.chunks_rejected += 1,
                    }
                }
            }
            ServerEvent::TranscriptDelta { role, text } => {
                if self.transcript.append(role, &text) {
                    debug!("New {:?} message in call {}", role, self.session.id);
                }
            }
            ServerEvent::Interrupted => {
                self.stats.interruptions += 1;
                if let Some(playback) = self.resources.playback_mut() {
                    playback.interrupt();
                }
            }
            ServerEvent::Closed => self.fail_live("connection closed by remote").await,
            ServerEvent::Error { message } => self.fail_live(&message).await,
        }
    }

    fn on_setup_done(&mut self, result: Result<Result<Acquired, CallError>, JoinError>) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match result {
            Ok(Ok(acquired)) => {
                info!("Call {} resources acquired, waiting for stream", self.session.id);
                self.resources = acquired.resources;
                self.frames = Some(acquired.frames);
                self.events = Some(pending.events);
            }
            Ok(Err(e)) => self.fail(e),
            Err(e) => self.fail(CallError::Acquisition(format!("setup task failed: {e}"))),
        }
    }

    async fn on_command(&mut self, command: Command) -> Result<CallState, CallError> {
        let state = self.session.state();
        match command {
            Command::Start => {
                self.session.transition("start", CallState::Connecting)?;
                self.begin_attempt();
            }
            Command::Retry => {
                if state != CallState::Error {
                    return Err(CallError::State {
                        operation: "retry",
                        state,
                    });
                }
                self.session.transition("retry", CallState::Connecting)?;
                self.begin_attempt();
            }
            Command::Hangup => {
                if state == CallState::Ended {
                    return Err(CallError::State {
                        operation: "hang up",
                        state,
                    });
                }
                if state.holds_resources() {
                    self.teardown().await;
                    self.stats.mark_finished();
                }
                self.session.transition("hangup", CallState::Ended)?;
            }
            Command::Cancel => {
                if state != CallState::Error {
                    return Err(CallError::State {
                        operation: "cancel",
                        state,
                    });
                }
                self.session.transition("cancel", CallState::Ended)?;
            }
            Command::SetMuted(_) | Command::ToggleMute => {
                if !state.holds_resources() {
                    return Err(CallError::State {
                        operation: "mute",
                        state,
                    });
                }
                self.session.muted = match command {
                    Command::SetMuted(muted) => muted,
                    _ => !self.session.muted,
                };
                info!(
                    "Call {} {}",
                    self.session.id,
                    if self.session.muted { "muted" } else { "unmuted" }
                );
            }
        }

        Ok(self.session.state())
    }

    /// Kick off setup for a fresh attempt
    fn begin_attempt(&mut self) {
        self.stats = self.stats.next_attempt();
        self.transcript = TranscriptAssembler::new();
        self.session.muted = false;
        self.meter.reset();
        self.last_error = None;

        info!(
            "Call {} connecting (attempt {})",
            self.session.id, self.stats.attempts
        );

        let (events_tx, events) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(acquire(
            Arc::clone(&self.backends),
            self.config.capture.clone(),
            self.config.session.clone(),
            events_tx,
            cancel_rx,
        ));

        self.pending = Some(Pending {
            task,
            cancel,
            events,
        });
    }

    /// Abandon any setup in flight and release everything held
    async fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            let _ = pending.cancel.send(true);
            match pending.task.await {
                Ok(Ok(acquired)) => {
                    debug!("Setup finished after cancel, releasing");
                    acquired.resources.release().await;
                }
                Ok(Err(e)) => debug!("Setup abandoned: {}", e),
                Err(e) => warn!("Setup task failed: {}", e),
            }
        }

        self.frames = None;
        self.events = None;

        let resources = std::mem::take(&mut self.resources);
        if !resources.is_empty() {
            resources.release().await;
        }
    }

    /// Setup failure: nothing is held, just record it
    fn fail(&mut self, error: CallError) {
        warn!(
            "Call {} failed: {} (retryable: {})",
            self.session.id,
            error,
            error.is_retryable()
        );
        let message = error.to_string();
        if let Err(e) = self.session.fail(message.clone()) {
            warn!("{}", e);
            return;
        }
        self.last_error = Some(message);
    }

    /// Failure while live: release everything, then enter `Error`
    async fn fail_live(&mut self, reason: &str) {
        if !self.session.state().holds_resources() {
            debug!("Ignoring failure while {}: {}", self.session.state(), reason);
            return;
        }
        self.teardown().await;
        self.stats.mark_finished();
        self.fail(CallError::Connection(reason.to_string()));
    }

    fn snapshot(&mut self) -> CallSnapshot {
        CallSnapshot {
            id: self.session.id.clone(),
            state: self.session.state(),
            muted: self.session.muted,
            error: self.session.error().map(str::to_string),
            loudness: self.meter.level(),
            transcript: self.transcript.messages().to_vec(),
            active_playback: self
                .resources
                .playback_mut()
                .map_or(0, |playback| playback.active_count()),
            stats: self.stats.clone(),
        }
    }

    fn publish_state(&self) {
        let state = self.session.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    fn finish(self) -> CallOutcome {
        info!(
            "Call {} finished with {} transcript messages",
            self.session.id,
            self.transcript.len()
        );

        CallOutcome {
            session_id: self.session.id,
            transcript: self.transcript.into_messages(),
            stats: self.stats,
            error: self.last_error,
        }
    }
}
