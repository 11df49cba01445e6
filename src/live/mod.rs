//! Streaming link to the remote conversational audio agent
//!
//! - `transport`: the `SessionTransport` contract and `ServerEvent`
//! - `messages`: JSON wire format
//! - `client`: WebSocket implementation

pub mod client;
pub mod messages;
pub mod transport;

pub use client::LiveClient;
pub use messages::{ClientMessage, RealtimeInput, ServerMessage, Setup};
pub use transport::{ServerEvent, SessionConfig, SessionTransport};
