use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CallError;

/// Lifecycle state of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Idle,
    Connecting,
    Connected,
    Error,
    Ended,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Connecting => "connecting",
            CallState::Connected => "connected",
            CallState::Error => "error",
            CallState::Ended => "ended",
        }
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Idle, Ended)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connecting, Ended)
                | (Connected, Error)
                | (Connected, Ended)
                | (Error, Connecting)
                | (Error, Ended)
        )
    }

    /// States in which devices or the stream may be held
    pub fn holds_resources(self) -> bool {
        matches!(self, CallState::Connecting | CallState::Connected)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one call a controller owns
#[derive(Debug, Clone)]
pub struct CallSession {
    pub id: String,
    state: CallState,
    pub muted: bool,
    error: Option<String>,
}

impl CallSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: CallState::Idle,
            muted: false,
            error: None,
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Message shown while in `Error`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Move to `next`, rejecting illegal edges
    pub fn transition(&mut self, operation: &'static str, next: CallState) -> Result<(), CallError> {
        if !self.state.can_transition_to(next) {
            return Err(CallError::State {
                operation,
                state: self.state,
            });
        }

        info!("Call {}: {} -> {} ({})", self.id, self.state, next, operation);
        self.state = next;
        if next != CallState::Error {
            self.error = None;
        }
        Ok(())
    }

    /// Enter `Error` keeping `message` for display
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CallError> {
        self.transition("fail", CallState::Error)?;
        self.error = Some(message.into());
        Ok(())
    }
}
