use thiserror::Error;

use crate::call::CallState;

/// Errors raised at call component boundaries
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    /// Capture device or playback output could not be acquired
    #[error("Audio device unavailable: {0}")]
    Acquisition(String),

    /// The live agent stream failed to open or dropped
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A received audio chunk could not be decoded
    #[error("Undecodable audio chunk: {0}")]
    Decode(String),

    /// Operation attempted in a state that does not allow it
    #[error("Cannot {operation} while call is {state}")]
    State {
        operation: &'static str,
        state: CallState,
    },

    /// Acquisition abandoned because the call was hung up
    #[error("Call setup cancelled")]
    Cancelled,
}

impl CallError {
    /// Whether re-entering `Connecting` can plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallError::Acquisition(_) | CallError::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_failures_are_retryable() {
        assert!(CallError::Acquisition("mic denied".into()).is_retryable());
        assert!(CallError::Connection("refused".into()).is_retryable());
        assert!(!CallError::Decode("odd length".into()).is_retryable());
        assert!(!CallError::Cancelled.is_retryable());
    }

    #[test]
    fn test_state_error_message() {
        let err = CallError::State {
            operation: "retry",
            state: CallState::Connected,
        };
        assert_eq!(err.to_string(), "Cannot retry while call is connected");
    }
}
