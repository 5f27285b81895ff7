//! Record payload decoding

use crate::domain::Envelope;
use serde_json::Deserializer;

/// Payload could not be parsed into an [`Envelope`]
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to decode envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decode envelope: empty payload")]
    Empty,
}

/// Decode a raw record payload.
///
/// Only the first JSON value is read; anything after it is ignored. Missing
/// fields decode to their zero values. A malformed payload will never parse
/// differently on redelivery, so callers treat every `DecodeError` as
/// skippable.
pub fn decode(payload: &[u8]) -> Result<Envelope, DecodeError> {
    match Deserializer::from_slice(payload).into_iter::<Envelope>().next() {
        Some(envelope) => Ok(envelope?),
        None => Err(DecodeError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const VALID: &str = r#"{
        "id": "e1",
        "payload": {
            "type": "create",
            "message": {
                "id": "m1",
                "clientId": "c1",
                "content": "hi",
                "sender": {"id": "s1", "username": "u"},
                "sentAt": "2024-03-01T12:00:00Z",
                "receivedAt": "2024-03-01T12:00:01.250+00:00",
                "location": {"long": 10.0, "lat": 20.0}
            }
        }
    }"#;

    #[test]
    fn test_decode_valid_envelope() {
        let envelope = decode(VALID.as_bytes()).unwrap();

        assert_eq!(envelope.id, "e1");
        assert_eq!(envelope.payload.kind, "create");

        let message = &envelope.payload.message;
        assert_eq!(message.id, "m1");
        assert_eq!(message.client_id, "c1");
        assert_eq!(message.content, "hi");
        assert_eq!(message.sender.id, "s1");
        assert_eq!(message.sender.username, "u");
        assert_eq!(
            message.sent_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(message.received_at.timestamp_millis() % 1000, 250);
        assert_eq!(message.location.long, 10.0);
        assert_eq!(message.location.lat, 20.0);
    }

    #[test]
    fn test_decode_converts_offsets_to_utc() {
        let payload = VALID.replace("2024-03-01T12:00:00Z", "2024-03-01T14:00:00+02:00");
        let envelope = decode(payload.as_bytes()).unwrap();

        assert_eq!(
            envelope.payload.message.sent_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let payload = VALID.replace(r#""id": "e1","#, r#""id": "e1", "traceId": "abc","#);
        assert!(decode(payload.as_bytes()).is_ok());
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(decode(b"{not json").is_err());
    }

    #[test]
    fn test_decode_rejects_empty_payload() {
        assert!(matches!(decode(b""), Err(DecodeError::Empty)));
        assert!(matches!(decode(b"  \n"), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_decode_zero_fills_missing_fields() {
        let payload = VALID
            .replace(r#""clientId": "c1","#, "")
            .replace(r#""location": {"long": 10.0, "lat": 20.0}"#, r#""channel": "general""#);
        let envelope = decode(payload.as_bytes()).unwrap();

        let message = &envelope.payload.message;
        assert_eq!(message.id, "m1");
        assert_eq!(message.client_id, "");
        assert_eq!(message.location.to_wkt_point(), "POINT (0.000000 0.000000)");
    }

    #[test]
    fn test_decode_missing_sender_id_is_empty() {
        let payload = VALID.replace(r#""id": "s1", "#, "");
        let envelope = decode(payload.as_bytes()).unwrap();

        assert_eq!(envelope.payload.message.sender.id, "");
        assert_eq!(envelope.payload.message.sender.username, "u");
    }

    #[test]
    fn test_decode_ignores_trailing_data() {
        let payload = format!("{}\n{{\"id\": \"e2\"}} trailing", VALID);
        let envelope = decode(payload.as_bytes()).unwrap();
        assert_eq!(envelope.id, "e1");
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(decode(br#""text""#), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_decode_rejects_bad_timestamp() {
        let payload = VALID.replace("2024-03-01T12:00:00Z", "yesterday");
        assert!(decode(payload.as_bytes()).is_err());
    }
}
