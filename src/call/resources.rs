use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::backends::CallBackends;
use crate::audio::{AudioCapture, AudioFrame, CaptureConfig, PlaybackScheduler};
use crate::error::CallError;
use crate::live::{ServerEvent, SessionConfig, SessionTransport};

/// Everything a live call holds: capture device, agent stream, playback
///
/// Fields fill in one by one during setup, so `release` copes with any
/// subset being present.
#[derive(Default)]
pub struct CallResources {
    capture: Option<Box<dyn AudioCapture>>,
    playback: Option<PlaybackScheduler>,
    transport: Option<Box<dyn SessionTransport>>,
}

/// Result of a completed setup
pub struct Acquired {
    pub resources: CallResources,
    pub frames: mpsc::Receiver<AudioFrame>,
}

impl CallResources {
    pub fn transport(&self) -> Option<&dyn SessionTransport> {
        self.transport.as_deref()
    }

    pub fn playback_mut(&mut self) -> Option<&mut PlaybackScheduler> {
        self.playback.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.capture.is_none() && self.playback.is_none() && self.transport.is_none()
    }

    /// Stop capture, cut playback and close the stream
    pub async fn release(mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.close();
        }
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.stop().await {
                warn!("Failed to stop {}: {}", capture.name(), e);
            }
        }
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        info!("Call resources released");
    }
}

/// Resolves once the cancel flag is raised or its sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}

/// Run `fut` unless the cancel flag is raised first
async fn until_cancelled<F: Future>(fut: F, cancel: &mut watch::Receiver<bool>) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => None,
        out = fut => Some(out),
    }
}

/// Acquire microphone, playback output and agent stream, in that order
///
/// On failure or cancellation whatever was already acquired is released
/// before returning.
pub async fn acquire(
    backends: Arc<dyn CallBackends>,
    capture_config: CaptureConfig,
    session: SessionConfig,
    events: mpsc::UnboundedSender<ServerEvent>,
    mut cancel: watch::Receiver<bool>,
) -> Result<Acquired, CallError> {
    let mut resources = CallResources::default();

    let capture = resources.capture.insert(backends.capture(&capture_config)?);
    let started = until_cancelled(capture.start(), &mut cancel).await;
    let frames = match started {
        Some(Ok(frames)) => frames,
        Some(Err(e)) => {
            resources.release().await;
            return Err(e);
        }
        None => {
            resources.release().await;
            return Err(CallError::Cancelled);
        }
    };

    match until_cancelled(backends.output(), &mut cancel).await {
        Some(Ok(output)) => resources.playback = Some(PlaybackScheduler::new(output)),
        Some(Err(e)) => {
            resources.release().await;
            return Err(e);
        }
        None => {
            resources.release().await;
            return Err(CallError::Cancelled);
        }
    }

    let transport = resources.transport.insert(backends.transport());
    let connected = until_cancelled(transport.connect(&session, events), &mut cancel).await;
    match connected {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            resources.release().await;
            return Err(e);
        }
        None => {
            resources.release().await;
            return Err(CallError::Cancelled);
        }
    }

    Ok(Acquired { resources, frames })
}
