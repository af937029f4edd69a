//! Broadcast hub: fan out one event to every registered connection.
//!
//! The hub owns the registry of live connections. Write-path route handlers
//! publish through it; each gateway task owns the receiving half of its
//! connection's channel and forwards frames to the socket.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use clinic_common::protocol::ServerEvent;

/// Shared registry of live realtime connections. Cloneable via `Arc` in
/// `AppState`; `publish` is safe to call concurrently with
/// register/unregister.
pub struct BroadcastHub {
    connections: DashMap<String, mpsc::UnboundedSender<Arc<str>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add a connection to the registry. Returns its id and the receiving
    /// half the gateway task forwards to the socket.
    pub fn register(&self) -> (String, mpsc::UnboundedReceiver<Arc<str>>) {
        let id = clinic_common::id::prefixed_ulid(clinic_common::id::prefix::CONNECTION);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id.clone(), tx);
        (id, rx)
    }

    /// Serialize the event once and attempt delivery to every registered
    /// connection. A connection whose channel is no longer open is skipped
    /// (and dropped from the registry); one failed send never affects the
    /// others and never propagates to the caller. At most one delivery
    /// attempt per connection per call; no queuing or retry.
    pub fn publish(&self, event: &ServerEvent) {
        let frame: Arc<str> = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(err) => {
                tracing::error!(?err, "failed to serialize event, dropping broadcast");
                return;
            }
        };

        let mut closed = Vec::new();
        for entry in self.connections.iter() {
            if entry.value().send(frame.clone()).is_err() {
                tracing::debug!(conn_id = %entry.key(), "connection not open, skipping");
                closed.push(entry.key().clone());
            }
        }

        // Removal happens after iteration so a dead entry can't stall the
        // fan-out or deadlock a shard.
        for id in closed {
            self.connections.remove(&id);
        }
    }

    /// Remove a connection from the registry. Idempotent.
    pub fn unregister(&self, id: &str) {
        self.connections.remove(id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn created_event(id: &str) -> ServerEvent {
        ServerEvent::AppointmentCreated {
            appointment: json!({ "id": id }),
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_registered_connection() {
        let hub = BroadcastHub::new();
        let (_id_a, mut rx_a) = hub.register();
        let (_id_b, mut rx_b) = hub.register();
        let (_id_c, mut rx_c) = hub.register();

        hub.publish(&created_event("apt_1"));

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            let frame = rx.recv().await.unwrap();
            let wire: serde_json::Value = serde_json::from_str(&frame).unwrap();
            assert_eq!(wire["type"], "APPOINTMENT_CREATED");
            assert_eq!(wire["appointment"]["id"], "apt_1");
        }
    }

    #[tokio::test]
    async fn closed_connection_is_skipped_without_affecting_others() {
        let hub = BroadcastHub::new();
        let (_id_a, mut rx_a) = hub.register();
        let (_id_b, rx_b) = hub.register();
        let (_id_c, mut rx_c) = hub.register();

        // Simulate a connection whose socket died: its receiver is gone.
        drop(rx_b);

        hub.publish(&created_event("apt_2"));

        assert!(rx_a.recv().await.is_some());
        assert!(rx_c.recv().await.is_some());
        // The dead entry is pruned from the registry.
        assert_eq!(hub.connection_count(), 2);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let hub = BroadcastHub::new();
        let (id, _rx) = hub.register();
        assert_eq!(hub.connection_count(), 1);

        hub.unregister(&id);
        let after_first = hub.connection_count();
        hub.unregister(&id);
        let after_second = hub.connection_count();

        assert_eq!(after_first, 0);
        assert_eq!(after_second, 0);
    }

    #[tokio::test]
    async fn unregistered_connection_receives_nothing() {
        let hub = BroadcastHub::new();
        let (id, mut rx) = hub.register();

        hub.unregister(&id);
        hub.publish(&created_event("apt_3"));

        // Sender dropped on unregister, so the channel reports closure
        // rather than delivering the frame.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn publish_order_is_preserved_per_connection() {
        let hub = BroadcastHub::new();
        let (_id, mut rx) = hub.register();

        hub.publish(&created_event("apt_first"));
        hub.publish(&created_event("apt_second"));

        let first: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["appointment"]["id"], "apt_first");
        assert_eq!(second["appointment"]["id"], "apt_second");
    }
}
