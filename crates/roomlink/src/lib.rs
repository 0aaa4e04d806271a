//! Roomlink: client side of a multiplayer room session
//!
//! A [`Room`] consumes frames from a transport, keeps the authoritative
//! state in sync through snapshots and Fossil delta patches, and raises
//! lifecycle events to the application.

pub mod client;
pub mod clock;
pub mod room;

pub use clock::{Clock, MonotonicTime, TimeSource};
pub use room::{Room, RoomPhase};

pub use roomlink_network::{ReadyState, Transport, TransportConfig, TransportEvent};
pub use roomlink_state::{DataChange, ListenerId, Operation, Signal, StateContainer, Value};

use roomlink_network::NetworkError;
use roomlink_state::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("Room already has a transport")]
    AlreadyConnected,

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}
