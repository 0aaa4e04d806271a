//! Room protocol message definitions and framing
//!
//! Every frame is a MessagePack array `[code, roomId, ...payload]`. The
//! element order is part of the protocol.

use crate::NetworkError;
use bytes::Bytes;
use roomlink_state::{codec, Value};

/// Message codes understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
    UserId = 1,
    JoinRoom = 10,
    JoinError = 11,
    LeaveRoom = 12,
    RoomData = 13,
    RoomState = 14,
    RoomStatePatch = 15,
    BadRequest = 50,
}

impl Protocol {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Self::UserId),
            10 => Some(Self::JoinRoom),
            11 => Some(Self::JoinError),
            12 => Some(Self::LeaveRoom),
            13 => Some(Self::RoomData),
            14 => Some(Self::RoomState),
            15 => Some(Self::RoomStatePatch),
            50 => Some(Self::BadRequest),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A decoded room frame
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Server confirmed the join and assigned the room id
    JoinRoom { room_id: Value },

    /// Server refused the join
    JoinError { error: Value },

    /// Server asks the client to leave
    LeaveRoom,

    /// Application payload
    RoomData { data: Value },

    /// Full state snapshot with the server clock at snapshot time
    RoomState {
        state: Value,
        remote_current_time: Option<f64>,
        remote_elapsed_time: Option<f64>,
    },

    /// Fossil delta against the previous serialized state
    RoomStatePatch { patch: Vec<u8> },

    /// Recognised but not acted on by a room, or not a room frame at all
    Ignored { code: Option<u64> },
}

fn element(items: &[Value], index: usize) -> Value {
    items.get(index).cloned().unwrap_or(Value::Nil)
}

fn time_value(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(n) => n
            .as_i64()
            .map(|n| n as f64)
            .or_else(|| n.as_u64().map(|n| n as f64)),
        Value::F32(n) => Some(*n as f64),
        Value::F64(n) => Some(*n),
        _ => None,
    }
}

/// Patches arrive either as MessagePack binary or as an array of byte values
fn patch_bytes(value: Value) -> Result<Vec<u8>, NetworkError> {
    match value {
        Value::Binary(bytes) => Ok(bytes),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| {
                        NetworkError::ProtocolError(format!("Invalid patch byte: {item}"))
                    })
            })
            .collect(),
        other => Err(NetworkError::ProtocolError(format!(
            "Patch payload must be binary, got {other}"
        ))),
    }
}

impl Message {
    /// Deserialize a frame from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, NetworkError> {
        Self::from_value(codec::decode(bytes)?)
    }

    /// Interpret an already decoded frame
    pub fn from_value(value: Value) -> Result<Self, NetworkError> {
        let items = match value {
            Value::Array(items) => items,
            _ => return Ok(Message::Ignored { code: None }),
        };

        let code = items.first().and_then(Value::as_u64);
        let protocol = match code.and_then(Protocol::from_code) {
            Some(protocol) => protocol,
            None => return Ok(Message::Ignored { code }),
        };

        let msg = match protocol {
            Protocol::JoinRoom => Message::JoinRoom {
                room_id: element(&items, 1),
            },
            Protocol::JoinError => Message::JoinError {
                error: element(&items, 2),
            },
            Protocol::LeaveRoom => Message::LeaveRoom,
            Protocol::RoomData => Message::RoomData {
                data: element(&items, 2),
            },
            Protocol::RoomState => Message::RoomState {
                state: element(&items, 2),
                remote_current_time: time_value(&element(&items, 3)),
                remote_elapsed_time: time_value(&element(&items, 4)),
            },
            Protocol::RoomStatePatch => Message::RoomStatePatch {
                patch: patch_bytes(element(&items, 2))?,
            },
            Protocol::UserId | Protocol::BadRequest => Message::Ignored { code },
        };

        Ok(msg)
    }

    /// Build the frame value for this message, addressed to `room_id`
    pub fn to_value(&self, room_id: &Value) -> Value {
        let frame = |protocol: Protocol, payload: Vec<Value>| {
            let mut items = vec![Value::from(protocol.code()), room_id.clone()];
            items.extend(payload);
            Value::Array(items)
        };

        match self {
            Message::JoinRoom { room_id } => Value::Array(vec![
                Value::from(Protocol::JoinRoom.code()),
                room_id.clone(),
            ]),
            Message::JoinError { error } => frame(Protocol::JoinError, vec![error.clone()]),
            Message::LeaveRoom => frame(Protocol::LeaveRoom, vec![]),
            Message::RoomData { data } => frame(Protocol::RoomData, vec![data.clone()]),
            Message::RoomState {
                state,
                remote_current_time,
                remote_elapsed_time,
            } => frame(
                Protocol::RoomState,
                vec![
                    state.clone(),
                    remote_current_time.map(Value::from).unwrap_or(Value::Nil),
                    remote_elapsed_time.map(Value::from).unwrap_or(Value::Nil),
                ],
            ),
            Message::RoomStatePatch { patch } => {
                frame(Protocol::RoomStatePatch, vec![Value::Binary(patch.clone())])
            }
            Message::Ignored { code } => {
                Value::Array(vec![code.map(Value::from).unwrap_or(Value::Nil)])
            }
        }
    }

    /// Serialize this message addressed to `room_id`
    pub fn to_bytes(&self, room_id: &Value) -> Result<Bytes, NetworkError> {
        Ok(Bytes::from(codec::encode(&self.to_value(room_id))?))
    }
}
