//! Room session state machine
//!
//! A room goes `Unbound -> Joining -> Joined -> Left`. Transport events are
//! fed in through [`Room::handle_event`]; the room decodes frames, keeps the
//! serialized baseline that patches are computed against, tracks clocks and
//! raises lifecycle signals.

use crate::clock::{Clock, MonotonicTime, TimeSource};
use crate::RoomError;
use roomlink_network::{Message, ReadyState, Transport, TransportEvent};
use roomlink_state::{codec, delta, Signal, StateContainer, Value};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Where a room is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Constructed, no transport yet
    Unbound,
    /// Transport bound, waiting for it to open
    Joining,
    /// Transport open, frames are dispatched
    Joined,
    /// Transport closed
    Left,
}

pub struct Room {
    id: Option<Value>,
    name: String,
    phase: RoomPhase,

    state: StateContainer,
    previous_state: Vec<u8>,

    clock: Clock,
    remote_clock: Clock,
    last_patch_time: Option<f64>,
    ping: Option<Duration>,
    time: Box<dyn TimeSource>,

    transport: Option<Box<dyn Transport>>,

    on_join: Signal<()>,
    on_update: Signal<Value>,
    on_data: Signal<Value>,
    on_error: Signal<Value>,
    on_leave: Signal<()>,
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_time_source(name, MonotonicTime::new())
    }

    /// Create a room that reads "now" from `time`
    pub fn with_time_source(name: impl Into<String>, time: impl TimeSource + 'static) -> Self {
        Self {
            id: None,
            name: name.into(),
            phase: RoomPhase::Unbound,
            state: StateContainer::new(codec::empty_state()),
            previous_state: codec::empty_baseline(),
            clock: Clock::new(),
            remote_clock: Clock::new(),
            last_patch_time: None,
            ping: None,
            time: Box::new(time),
            transport: None,
            on_join: Signal::new(),
            on_update: Signal::new(),
            on_data: Signal::new(),
            on_error: Signal::new(),
            on_leave: Signal::new(),
        }
    }

    /// Bind the transport this room talks through.
    ///
    /// Fails if a transport is already bound. A room that has left may be
    /// connected again.
    pub fn connect(&mut self, transport: impl Transport + 'static) -> Result<(), RoomError> {
        if self.transport.is_some() {
            return Err(RoomError::AlreadyConnected);
        }

        self.transport = Some(Box::new(transport));
        self.phase = RoomPhase::Joining;
        debug!("Room {} joining", self.name);
        Ok(())
    }

    /// Process one event from the bound transport
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<(), RoomError> {
        match event {
            TransportEvent::Open => {
                if self.phase != RoomPhase::Joining {
                    debug!("Room {} ignoring open while {:?}", self.name, self.phase);
                    return Ok(());
                }
                self.phase = RoomPhase::Joined;
                debug!("Room {} joined", self.name);
                self.on_join.dispatch(&());
                Ok(())
            }
            TransportEvent::Close => {
                self.phase = RoomPhase::Left;
                self.transport = None;
                self.clock.stop();
                debug!("Room {} left", self.name);
                self.on_leave.dispatch(&());
                self.remove_all_listeners();
                Ok(())
            }
            TransportEvent::Message(frame) => {
                if self.phase != RoomPhase::Joined {
                    debug!(
                        "Room {} dropping frame received while {:?}",
                        self.name, self.phase
                    );
                    return Ok(());
                }
                self.handle_message(&frame)
            }
        }
    }

    fn handle_message(&mut self, frame: &[u8]) -> Result<(), RoomError> {
        match Message::from_bytes(frame)? {
            Message::JoinRoom { room_id } => self.set_id(room_id),
            Message::JoinError { error } => {
                debug!("Room {} join error: {}", self.name, error);
                self.on_error.dispatch(&error);
            }
            Message::RoomState {
                state,
                remote_current_time,
                remote_elapsed_time,
            } => self.set_state(state, remote_current_time, remote_elapsed_time)?,
            Message::RoomStatePatch { patch } => self.patch(&patch)?,
            Message::RoomData { data } => self.on_data.dispatch(&data),
            Message::LeaveRoom => self.leave(),
            Message::Ignored { code } => {
                debug!("Room {} ignoring frame with code {:?}", self.name, code);
            }
        }
        Ok(())
    }

    /// Replace the state with a full snapshot and make it the new baseline.
    ///
    /// The remote clock is only overwritten when both times are given.
    pub fn set_state(
        &mut self,
        state: Value,
        remote_current_time: Option<f64>,
        remote_elapsed_time: Option<f64>,
    ) -> Result<(), RoomError> {
        let encoded = codec::encode(&state)?;
        self.previous_state = encoded;
        self.state.set(state);

        if let (Some(current), Some(elapsed)) = (remote_current_time, remote_elapsed_time) {
            self.remote_clock.set_remote(current, elapsed);
        }

        self.clock.start(self.time.now());

        trace!(
            "Room {} snapshot, baseline {} bytes",
            self.name,
            self.previous_state.len()
        );
        self.on_update.dispatch(self.state.data());
        Ok(())
    }

    /// Apply a Fossil delta to the current baseline
    pub fn patch(&mut self, binary_patch: &[u8]) -> Result<(), RoomError> {
        let patch_time = self.time.now();
        if let Some(last) = self.last_patch_time {
            // Saturating cast: a clock step backwards reads as zero
            self.ping = Some(Duration::from_nanos(
                ((patch_time - last) * 1_000_000.0) as u64,
            ));
        }
        self.last_patch_time = Some(patch_time);

        self.clock.tick(patch_time);

        let next = delta::apply(&self.previous_state, binary_patch)?;
        let state = codec::decode(&next)?;
        self.previous_state = next;
        self.state.set(state);

        trace!(
            "Room {} patched with {} bytes, ping {:?}",
            self.name,
            binary_patch.len(),
            self.ping
        );
        self.on_update.dispatch(self.state.data());
        Ok(())
    }

    /// Close the transport if the server ever confirmed the join.
    ///
    /// The Leave signal fires once the transport reports `Close`.
    pub fn leave(&mut self) {
        match (&self.id, self.transport.as_mut()) {
            (Some(_), Some(transport)) => {
                debug!("Room {} leaving", self.name);
                transport.close();
            }
            _ => debug!("Room {} has no confirmed join, nothing to leave", self.name),
        }
    }

    /// Send application data to the room.
    ///
    /// Dropped with a warning when the transport is not open.
    pub fn send(&mut self, data: Value) -> Result<(), RoomError> {
        let room_id = self.id.clone().unwrap_or(Value::Nil);

        match self.transport.as_mut() {
            Some(transport) if transport.ready_state() == ReadyState::Open => {
                let frame = Message::RoomData { data }.to_bytes(&room_id)?;
                transport.send(frame)?;
            }
            _ => warn!("Room {} ({}) is not connected.", self.name, room_id),
        }
        Ok(())
    }

    /// Drop every lifecycle listener and every state listener
    pub fn remove_all_listeners(&mut self) {
        self.on_join.remove_all();
        self.on_update.remove_all();
        self.on_data.remove_all();
        self.on_error.remove_all();
        self.on_leave.remove_all();
        self.state.remove_all_listeners();
    }

    /// Set the server-assigned id. `Nil` clears it.
    pub fn set_id(&mut self, id: Value) {
        debug!("Room {} assigned id {}", self.name, id);
        self.id = match id {
            Value::Nil => None,
            id => Some(id),
        };
    }

    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Current authoritative state
    pub fn state(&self) -> &Value {
        self.state.data()
    }

    /// The state container, for fine-grained change listeners
    pub fn container(&mut self) -> &mut StateContainer {
        &mut self.state
    }

    /// Serialized baseline the next patch applies to
    pub fn previous_state(&self) -> &[u8] {
        &self.previous_state
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn remote_clock(&self) -> &Clock {
        &self.remote_clock
    }

    /// Interval between the last two patches
    pub fn ping(&self) -> Option<Duration> {
        self.ping
    }

    pub fn is_connected(&self) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|t| t.ready_state() == ReadyState::Open)
    }

    pub fn on_join(&mut self) -> &mut Signal<()> {
        &mut self.on_join
    }

    pub fn on_update(&mut self) -> &mut Signal<Value> {
        &mut self.on_update
    }

    pub fn on_data(&mut self) -> &mut Signal<Value> {
        &mut self.on_data
    }

    pub fn on_error(&mut self) -> &mut Signal<Value> {
        &mut self.on_error
    }

    pub fn on_leave(&mut self) -> &mut Signal<()> {
        &mut self.on_leave
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("state", self.state.data())
            .field("ping", &self.ping)
            .finish_non_exhaustive()
    }
}
