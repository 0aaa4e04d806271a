//! Transport abstraction for room connections
//!
//! A room owns exactly one transport. Outbound frames go through the
//! [`Transport`] trait; inbound traffic arrives as [`TransportEvent`]s that
//! the host feeds to the room in order.

use crate::NetworkError;
use bytes::Bytes;
use std::time::Duration;

/// Connection status, mirroring the WebSocket ready states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closing => 2,
            ReadyState::Closed => 3,
        }
    }
}

/// Something that happened on the connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake finished, frames may flow
    Open,
    /// A raw inbound frame
    Message(Bytes),
    /// The connection is gone. Delivered once, whoever closed it.
    Close,
}

/// Outbound half of a connection
pub trait Transport {
    /// Queue a frame for delivery
    fn send(&mut self, frame: Bytes) -> Result<(), NetworkError>;

    /// Start closing. Completion is reported later as [`TransportEvent::Close`].
    fn close(&mut self);

    fn ready_state(&self) -> ReadyState;
}

/// Configuration for transport layer
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long to wait for the WebSocket handshake
    pub connect_timeout: Duration,
    /// Largest inbound message accepted
    pub max_message_size: usize,
    /// Inbound events buffered before the reader waits on the host
    pub event_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            max_message_size: 16 * 1024 * 1024, // 16 MB
            event_capacity: 256,
        }
    }
}
