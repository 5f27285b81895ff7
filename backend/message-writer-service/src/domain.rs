//! Wire types for chat messages published to the message topic

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sender {
    pub id: String,
    pub username: String,
}

/// Geographic position attached to a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub long: f64,
    pub lat: f64,
}

impl Location {
    /// Well-known-text point literal, longitude first.
    pub fn to_wkt_point(&self) -> String {
        format!("POINT ({:.6} {:.6})", self.long, self.lat)
    }
}

/// Chat message as written by the producer.
///
/// Absent fields take their zero value (empty strings, the Unix epoch, the
/// origin point) and are left for the store to accept or reject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub client_id: String,
    pub content: String,
    pub sender: Sender,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub location: Location,
}

/// Action discriminator plus the business payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: Message,
}

/// Outer record read from the topic.
///
/// `id` is assigned by the producer and is never regenerated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub id: String,
    pub payload: MessagePayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wkt_point_uses_six_decimals() {
        let location = Location {
            long: 10.0,
            lat: 20.0,
        };
        assert_eq!(location.to_wkt_point(), "POINT (10.000000 20.000000)");
    }

    #[test]
    fn test_wkt_point_keeps_sign() {
        let location = Location {
            long: -73.5,
            lat: 45.125,
        };
        assert_eq!(location.to_wkt_point(), "POINT (-73.500000 45.125000)");
    }

    #[test]
    fn test_default_location_is_origin() {
        assert_eq!(
            Location::default().to_wkt_point(),
            "POINT (0.000000 0.000000)"
        );
    }
}
