use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The salesperson on the microphone
    User,
    /// The simulated customer
    Model,
}

/// One speaker turn of the call transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub text: String,
    /// When the first delta of this message arrived
    pub timestamp: DateTime<Utc>,
}

/// Merges incremental per-role text deltas into discrete messages
///
/// Deltas are taken in arrival order: the same role continuing appends to
/// the last message, any role change starts a new one.
#[derive(Debug, Default, Clone)]
pub struct TranscriptAssembler {
    messages: Vec<TranscriptMessage>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the delta started a new message
    pub fn append(&mut self, role: Role, delta: &str) -> bool {
        if let Some(last) = self.messages.last_mut() {
            if last.role == role {
                last.text.push_str(delta);
                return false;
            }
        }

        self.messages.push(TranscriptMessage {
            role,
            text: delta.to_string(),
            timestamp: Utc::now(),
        });
        true
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<TranscriptMessage> {
        self.messages
    }
}

/// Tracks which messages of a live transcript have been shown
///
/// Every attempt starts a fresh transcript, so a new attempt number resets
/// the position.
#[derive(Debug, Default)]
pub struct TranscriptFeed {
    attempt: u32,
    shown: usize,
}

impl TranscriptFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete messages not shown yet; the last message may still grow
    pub fn complete<'a>(
        &mut self,
        attempt: u32,
        transcript: &'a [TranscriptMessage],
    ) -> &'a [TranscriptMessage] {
        self.sync(attempt);
        let complete = transcript.len().saturating_sub(1);
        if complete <= self.shown {
            return &[];
        }
        let fresh = &transcript[self.shown..complete];
        self.shown = complete;
        fresh
    }

    /// Everything not shown yet, once the call is over
    pub fn rest<'a>(
        &mut self,
        attempt: u32,
        transcript: &'a [TranscriptMessage],
    ) -> &'a [TranscriptMessage] {
        self.sync(attempt);
        let rest = transcript.get(self.shown..).unwrap_or(&[]);
        self.shown = transcript.len();
        rest
    }

    fn sync(&mut self, attempt: u32) {
        if attempt != self.attempt {
            self.attempt = attempt;
            self.shown = 0;
        }
    }
}
