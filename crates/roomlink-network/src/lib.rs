//! Network layer for Roomlink
//!
//! Frames room messages as MessagePack arrays and carries them over a
//! WebSocket. The room itself only sees the [`Transport`] trait and the
//! stream of [`TransportEvent`]s.

pub mod protocol;
pub mod transport;
pub mod websocket;

pub use protocol::{Message, Protocol};
pub use transport::{ReadyState, Transport, TransportConfig, TransportEvent};
pub use websocket::WebSocketTransport;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Codec error: {0}")]
    Codec(#[from] roomlink_state::StateError),
}
