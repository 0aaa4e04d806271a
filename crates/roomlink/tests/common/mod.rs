//! Shared helpers for room integration tests

#![allow(dead_code)]

use bytes::Bytes;
use roomlink::{ReadyState, Room, TimeSource, Transport, TransportEvent, Value};
use roomlink_network::{Message, NetworkError};
use roomlink_state::{codec, delta};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// What a [`FakeTransport`] has been asked to do
#[derive(Debug)]
pub struct TransportLog {
    pub sent: Vec<Bytes>,
    pub close_calls: usize,
    pub ready_state: ReadyState,
}

/// In-memory transport whose log stays readable after the room takes it
#[derive(Clone)]
pub struct FakeTransport {
    log: Rc<RefCell<TransportLog>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(TransportLog {
                sent: Vec::new(),
                close_calls: 0,
                ready_state: ReadyState::Connecting,
            })),
        }
    }

    pub fn set_ready_state(&self, state: ReadyState) {
        self.log.borrow_mut().ready_state = state;
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.log.borrow().sent.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.log.borrow().close_calls
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, frame: Bytes) -> Result<(), NetworkError> {
        self.log.borrow_mut().sent.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        let mut log = self.log.borrow_mut();
        log.close_calls += 1;
        log.ready_state = ReadyState::Closing;
    }

    fn ready_state(&self) -> ReadyState {
        self.log.borrow().ready_state
    }
}

/// Hand-driven time source
#[derive(Clone, Default)]
pub struct ManualTime {
    now: Rc<Cell<f64>>,
}

impl ManualTime {
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Lifecycle events seen by a room's listeners, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Seen {
    Join,
    Update(Value),
    Data(Value),
    Error(Value),
    Leave,
}

/// Subscribe to all five lifecycle signals and record what fires
pub fn record_events(room: &mut Room) -> Rc<RefCell<Vec<Seen>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));

    let log = seen.clone();
    room.on_join().add(move |_| log.borrow_mut().push(Seen::Join));
    let log = seen.clone();
    room.on_update()
        .add(move |state| log.borrow_mut().push(Seen::Update(state.clone())));
    let log = seen.clone();
    room.on_data()
        .add(move |data| log.borrow_mut().push(Seen::Data(data.clone())));
    let log = seen.clone();
    room.on_error()
        .add(move |error| log.borrow_mut().push(Seen::Error(error.clone())));
    let log = seen.clone();
    room.on_leave().add(move |_| log.borrow_mut().push(Seen::Leave));

    seen
}

/// A room that has been connected to a fake transport and opened
pub fn joined_room(name: &str) -> (Room, FakeTransport, ManualTime) {
    let time = ManualTime::new(0.0);
    let transport = FakeTransport::new();
    let mut room = Room::with_time_source(name, time.clone());

    room.connect(transport.clone()).unwrap();
    transport.set_ready_state(ReadyState::Open);
    room.handle_event(TransportEvent::Open).unwrap();

    (room, transport, time)
}

pub fn map(entries: &[(&str, Value)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| (Value::from(*k), v.clone()))
            .collect(),
    )
}

pub fn frame(items: Vec<Value>) -> TransportEvent {
    let bytes = codec::encode(&Value::Array(items)).unwrap();
    TransportEvent::Message(Bytes::from(bytes))
}

pub fn snapshot_frame(room_id: i64, state: Value, current: f64, elapsed: f64) -> TransportEvent {
    let msg = Message::RoomState {
        state,
        remote_current_time: Some(current),
        remote_elapsed_time: Some(elapsed),
    };
    TransportEvent::Message(msg.to_bytes(&Value::from(room_id)).unwrap())
}

/// Patch frame turning `from` into `to`, as the server would diff them
pub fn patch_frame(room_id: i64, from: &Value, to: &Value) -> TransportEvent {
    let patch = delta::create(&codec::encode(from).unwrap(), &codec::encode(to).unwrap());
    let msg = Message::RoomStatePatch { patch };
    TransportEvent::Message(msg.to_bytes(&Value::from(room_id)).unwrap())
}
