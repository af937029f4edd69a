//! Local dashboard view, kept consistent by applying gateway events.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use clinic_common::protocol::{ServerEvent, StatsSnapshot};

/// Dashboard state shared between the connection task and the UI layer.
pub type SharedDashboard = Arc<Mutex<DashboardState>>;

/// The client's local copy of the data the dashboard renders.
///
/// Snapshot events (`INITIAL_DATA`, `REALTIME_UPDATE`) replace the
/// appointment list and stats wholesale — whatever arrives last wins, there
/// are no sequence numbers. Single-item events patch their list in place.
#[derive(Debug, Default)]
pub struct DashboardState {
    /// False while no connection is open; drives the "connecting" indicator.
    pub connected: bool,
    pub appointments: Vec<Value>,
    pub stats: Option<StatsSnapshot>,
    pub patients: Vec<Value>,
    pub payments: Vec<Value>,
    pub messages: Vec<Value>,
}

impl DashboardState {
    pub fn shared() -> SharedDashboard {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Apply one server event to the local view.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::InitialData {
                appointments,
                stats,
                ..
            }
            | ServerEvent::RealtimeUpdate {
                appointments,
                stats,
                ..
            } => {
                self.appointments = appointments;
                self.stats = Some(stats);
            }
            ServerEvent::AppointmentCreated { appointment }
            | ServerEvent::AppointmentUpdate { appointment }
            | ServerEvent::NewAppointment { data: appointment } => {
                upsert_by_id(&mut self.appointments, appointment);
            }
            ServerEvent::PatientUpdated { patient } => {
                upsert_by_id(&mut self.patients, patient);
            }
            ServerEvent::NewPayment { payment } | ServerEvent::PaymentUpdated { payment } => {
                upsert_by_id(&mut self.payments, payment);
            }
            ServerEvent::NewMessage { message } => {
                self.messages.push(message);
            }
        }
    }
}

/// Replace the record with a matching `id`, or append when none matches.
fn upsert_by_id(list: &mut Vec<Value>, record: Value) {
    let id = record.get("id").and_then(Value::as_str).map(str::to_owned);
    match id {
        Some(id) => {
            if let Some(existing) = list
                .iter_mut()
                .find(|r| r.get("id").and_then(Value::as_str) == Some(id.as_str()))
            {
                *existing = record;
            } else {
                list.push(record);
            }
        }
        // No identity to match on — treat as an append.
        None => list.push(record),
    }
}
