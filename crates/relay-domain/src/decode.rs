use crate::error::DecodeError;
use crate::record::SensorMessage;

/// Decode a raw subscription payload into a sensor message.
///
/// The payload is interpreted as UTF-8 text, then as JSON; the top-level
/// value must be an object. Pure parse, no side effects.
pub fn decode(payload: &[u8]) -> Result<SensorMessage, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let value: serde_json::Value = serde_json::from_str(text)?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(DecodeError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_nested_sensor_payload() {
        let message = decode(br#"{"SI7021":{"Temperature":21.5,"Humidity":40}}"#).unwrap();
        let group = message.get("SI7021").unwrap().as_object().unwrap();
        assert_eq!(group.get("Temperature").unwrap().as_f64(), Some(21.5));
        assert_eq!(group.get("Humidity").unwrap().as_i64(), Some(40));
    }

    #[test]
    fn test_decodes_empty_object() {
        let message = decode(b"{}").unwrap();
        assert!(message.is_empty());
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let result = decode(&[0xff, 0xfe, 0x80]);
        assert!(matches!(result, Err(DecodeError::InvalidUtf8(_))));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = decode(b"not json");
        assert!(matches!(result, Err(DecodeError::MalformedJson(_))));
    }

    #[test]
    fn test_rejects_non_object_top_level() {
        assert!(matches!(decode(b"[1,2,3]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode(b"42"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode(b"\"text\""), Err(DecodeError::NotAnObject)));
    }
}
