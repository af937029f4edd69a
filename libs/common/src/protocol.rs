//! Realtime wire protocol: framed JSON text messages over the WebSocket
//! channel, shared by the server gateway and the dashboard client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Close codes
// ---------------------------------------------------------------------------

/// Application close code sent when the bearer credential is missing or
/// invalid. Clients must treat this as terminal (re-authenticate) rather
/// than entering the reconnect loop.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// A request received from a dashboard client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientRequest {
    /// One-shot pull of the full appointment list plus a fresh stats
    /// snapshot, answered with [`ServerEvent::InitialData`].
    FetchInitialData,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// The store operation that triggered a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// An immutable push message describing one state change. Record payloads
/// are carried as raw JSON values — the client never needs the server's
/// model types to apply them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    /// Response to [`ClientRequest::FetchInitialData`].
    InitialData {
        appointments: Vec<Value>,
        stats: StatsSnapshot,
        timestamp: DateTime<Utc>,
    },
    /// Full refresh pushed when the store reports a change on the
    /// appointments table.
    RealtimeUpdate {
        appointments: Vec<Value>,
        stats: StatsSnapshot,
        event: ChangeOp,
        timestamp: DateTime<Utc>,
    },
    AppointmentCreated {
        appointment: Value,
    },
    AppointmentUpdate {
        appointment: Value,
    },
    NewAppointment {
        data: Value,
    },
    NewMessage {
        message: Value,
    },
    NewPayment {
        payment: Value,
    },
    PaymentUpdated {
        payment: Value,
    },
    PatientUpdated {
        patient: Value,
    },
}

// ---------------------------------------------------------------------------
// Stats snapshot
// ---------------------------------------------------------------------------

/// Month-over-month trend percentages, signed, possibly fractional.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsTrends {
    pub appointments: f64,
    pub patients: f64,
    pub video_consultations: f64,
    pub pending_appointments: f64,
}

/// Point-in-time aggregate of the dashboard summary counters for the
/// current calendar month, with trends against the previous month.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_appointments: i64,
    pub total_patients: i64,
    pub video_consultations: i64,
    pub pending_appointments: i64,
    pub trends: StatsTrends,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_request_wire_tag() {
        let req: ClientRequest =
            serde_json::from_value(json!({ "type": "FETCH_INITIAL_DATA" })).unwrap();
        assert!(matches!(req, ClientRequest::FetchInitialData));
    }

    #[test]
    fn appointment_created_payload_field_is_appointment() {
        let event = ServerEvent::AppointmentCreated {
            appointment: json!({ "id": "apt_1" }),
        };
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "APPOINTMENT_CREATED");
        assert_eq!(wire["appointment"]["id"], "apt_1");
    }

    #[test]
    fn new_appointment_payload_field_is_data() {
        let event = ServerEvent::NewAppointment {
            data: json!({ "id": "apt_2" }),
        };
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "NEW_APPOINTMENT");
        assert_eq!(wire["data"]["id"], "apt_2");
    }

    #[test]
    fn payment_events_carry_payment_field() {
        let created = ServerEvent::NewPayment {
            payment: json!({ "id": "pay_1" }),
        };
        let updated = ServerEvent::PaymentUpdated {
            payment: json!({ "id": "pay_1", "status": "paid" }),
        };
        assert_eq!(serde_json::to_value(&created).unwrap()["type"], "NEW_PAYMENT");
        assert_eq!(
            serde_json::to_value(&updated).unwrap()["type"],
            "PAYMENT_UPDATED"
        );
    }

    #[test]
    fn realtime_update_wire_shape() {
        let event = ServerEvent::RealtimeUpdate {
            appointments: vec![json!({ "id": "apt_1" })],
            stats: StatsSnapshot::default(),
            event: ChangeOp::Insert,
            timestamp: Utc::now(),
        };
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "REALTIME_UPDATE");
        assert_eq!(wire["event"], "INSERT");
        assert_eq!(wire["stats"]["totalAppointments"], 0);
        assert_eq!(wire["stats"]["trends"]["videoConsultations"], 0.0);
        assert!(wire["timestamp"].is_string());
    }

    #[test]
    fn initial_data_round_trips() {
        let event = ServerEvent::InitialData {
            appointments: vec![],
            stats: StatsSnapshot::default(),
            timestamp: Utc::now(),
        };
        let wire = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&wire).unwrap();
        assert!(matches!(back, ServerEvent::InitialData { .. }));
    }
}
