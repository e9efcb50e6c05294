//! Client for the OpenAI Realtime API over WebSocket.
//!
//! - `types`: client and server event shapes.
//! - `client`: connection setup and the [`RealtimeSession`] transport.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ConnectionState, RealtimeClient, RealtimeSession, RealtimeTransport};
pub use error::RealtimeError;
pub use types::{ClientEvent, ServerEvent};
