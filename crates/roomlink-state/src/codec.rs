//! MessagePack codec for room values
//!
//! Baselines are kept in the exact byte form the server diffs against, so
//! everything goes through `rmpv` rather than a typed schema.

use crate::StateError;
use rmpv::Value;

/// Encode a value into MessagePack bytes
pub fn encode(value: &Value) -> Result<Vec<u8>, StateError> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value)
        .map_err(|e| StateError::SerializationError(e.to_string()))?;
    Ok(buf)
}

/// Decode the first MessagePack value in `bytes`
pub fn decode(bytes: &[u8]) -> Result<Value, StateError> {
    let mut reader = bytes;
    rmpv::decode::read_value(&mut reader)
        .map_err(|e| StateError::DeserializationError(e.to_string()))
}

/// The state a room starts from before any snapshot arrives
pub fn empty_state() -> Value {
    Value::Map(Vec::new())
}

/// Encoded form of [`empty_state`]: a MessagePack fixmap of length 0
pub fn empty_baseline() -> Vec<u8> {
    vec![0x80]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_value_survives_encoding() {
        let value = Value::Map(vec![
            (Value::from("hp"), Value::from(100)),
            (
                Value::from("items"),
                Value::Array(vec![Value::from("sword"), Value::Nil, Value::from(1.5)]),
            ),
            (Value::from("blob"), Value::Binary(vec![0, 1, 2, 255])),
        ]);

        let bytes = encode(&value).unwrap();
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let bytes = encode(&Value::from("a fairly long string value")).unwrap();
        let result = decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(StateError::DeserializationError(_))));
    }

    #[test]
    fn test_empty_baseline_matches_encoder() {
        assert_eq!(encode(&empty_state()).unwrap(), empty_baseline());
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(decode(&[]).is_err());
    }
}
