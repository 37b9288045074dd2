//! WebSocket message types.
//!
//! Every server frame is one flat JSON envelope:
//! `{type, data?, clientId?, area?, message?, timestamp}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    gateway::subscription::Bounds,
    models::{DriverStatus, LiveBus},
    types::{ClientId, DriverId},
};

// ============================================================================
// Client → Server Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { area: String, bounds: Bounds },
    Unsubscribe { area: String },
    Ping,
}

// ============================================================================
// Server → Client Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Connection,
    InitialLocations,
    LocationUpdate,
    DriverStatus,
    Subscribed,
    Unsubscribed,
    Pong,
    Error,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Payload of a `driver_status` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatusEvent {
    pub driver_id: DriverId,
    pub bus_id: Option<String>,
    pub route_id: Option<String>,
    pub status: DriverStatus,
    pub changed_at: DateTime<Utc>,
}

impl Envelope {
    fn new(kind: MessageType, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            data: None,
            client_id: None,
            area: None,
            message: None,
            timestamp: now,
        }
    }

    pub fn connection(client_id: ClientId, now: DateTime<Utc>) -> Self {
        Self {
            client_id: Some(client_id.to_string()),
            message: Some("Connected to bus tracking gateway".into()),
            ..Self::new(MessageType::Connection, now)
        }
    }

    pub fn initial_locations(area: &str, buses: &[LiveBus], now: DateTime<Utc>) -> Self {
        Self {
            area: Some(area.to_string()),
            data: serde_json::to_value(buses).ok(),
            ..Self::new(MessageType::InitialLocations, now)
        }
    }

    pub fn location_update(bus: &LiveBus, now: DateTime<Utc>) -> Self {
        Self {
            data: serde_json::to_value(bus).ok(),
            ..Self::new(MessageType::LocationUpdate, now)
        }
    }

    pub fn driver_status(event: &DriverStatusEvent, now: DateTime<Utc>) -> Self {
        Self {
            data: serde_json::to_value(event).ok(),
            ..Self::new(MessageType::DriverStatus, now)
        }
    }

    pub fn subscribed(area: &str, bounds: &Bounds, now: DateTime<Utc>) -> Self {
        Self {
            area: Some(area.to_string()),
            data: serde_json::to_value(bounds).ok(),
            ..Self::new(MessageType::Subscribed, now)
        }
    }

    pub fn unsubscribed(area: &str, now: DateTime<Utc>) -> Self {
        Self {
            area: Some(area.to_string()),
            ..Self::new(MessageType::Unsubscribed, now)
        }
    }

    pub fn pong(now: DateTime<Utc>) -> Self {
        Self::new(MessageType::Pong, now)
    }

    pub fn error(code: &str, message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            message: Some(message.into()),
            data: Some(serde_json::json!({ "code": code })),
            ..Self::new(MessageType::Error, now)
        }
    }

    pub fn shutdown(now: DateTime<Utc>) -> Self {
        Self {
            message: Some("Server is shutting down".into()),
            ..Self::new(MessageType::Shutdown, now)
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_wire_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"subscribe","area":"downtown","bounds":{"north":14.7,"south":14.5,"east":121.1,"west":120.9},"timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .expect("subscribe");
        assert!(matches!(msg, ClientMessage::Subscribe { ref area, .. } if area == "downtown"));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"unsubscribe","area":"downtown"}"#).expect("unsub");
        assert_eq!(
            msg,
            ClientMessage::Unsubscribe {
                area: "downtown".into()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).expect("ping");
        assert_eq!(msg, ClientMessage::Ping);
    }

    #[test]
    fn envelope_omits_absent_fields() {
        let now = Utc::now();
        let json: Value = serde_json::from_str(&Envelope::pong(now).to_json().expect("json"))
            .expect("parse");
        assert_eq!(json["type"], "pong");
        assert!(json.get("data").is_none());
        assert!(json.get("clientId").is_none());
        assert!(json["timestamp"].is_string());

        let connection = Envelope::connection(ClientId::new(), now);
        let json = serde_json::to_value(&connection).expect("json");
        assert_eq!(json["type"], "connection");
        assert!(json["clientId"].is_string());
    }

    #[test]
    fn error_envelope_carries_code() {
        let json = serde_json::to_value(Envelope::error("INVALID_MESSAGE", "bad", Utc::now()))
            .expect("json");
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "bad");
        assert_eq!(json["data"]["code"], "INVALID_MESSAGE");
    }
}
