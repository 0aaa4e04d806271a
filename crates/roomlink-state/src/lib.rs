//! Room state handling for Roomlink
//!
//! Holds the pieces a room needs to keep its authoritative state in sync:
//! the MessagePack codec used for baselines, the Fossil delta format the
//! server patches with, an observable state container and typed signals.

pub mod codec;
pub mod container;
pub mod delta;
pub mod signal;

pub use container::{Captures, DataChange, Operation, StateContainer};
pub use signal::{ListenerId, Signal};

/// Structured value exchanged with the server.
pub use rmpv::Value;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Malformed delta: {0}")]
    DeltaError(String),

    #[error("State divergence detected: {0}")]
    StateDivergence(String),
}
