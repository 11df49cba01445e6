//! HTTP API for driving practice calls
//!
//! - GET /health - Health check
//! - POST /calls - Start a call
//! - GET /calls/:id/status - Snapshot of a call
//! - GET /calls/:id/transcript - Transcript so far
//! - POST /calls/:id/mute - Set or toggle mute
//! - POST /calls/:id/retry - Retry a failed call
//! - POST /calls/:id/hangup - End a call and return its outcome

mod handlers;
mod routes;
mod state;

pub use handlers::{MuteRequest, StartCallRequest, StartCallResponse};
pub use routes::create_router;
pub use state::{AppState, BackendsFactory, CallEntry};
