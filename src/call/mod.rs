//! One simulated sales call: state machine, transcript and resources
//!
//! `CallSessionController` owns everything and is driven through a
//! `CallHandle`.

pub mod backends;
pub mod config;
pub mod controller;
pub mod resources;
pub mod state;
pub mod stats;
pub mod transcript;

pub use backends::{CallBackends, DefaultBackends};
pub use config::CallConfig;
pub use controller::{CallHandle, CallOutcome, CallSessionController, CallSnapshot, Command};
pub use resources::CallResources;
pub use state::{CallSession, CallState};
pub use stats::CallStats;
pub use transcript::{Role, TranscriptAssembler, TranscriptFeed, TranscriptMessage};
