//! Store change notifications.
//!
//! Stand-in for the datastore's own change stream: write-path handlers call
//! [`ChangeFeed::notify`] after a mutation commits, and every gateway
//! connection holds its own subscription (receiver). Slow receivers that
//! fall behind skip notifications (`RecvError::Lagged`).

use tokio::sync::broadcast;

use clinic_common::protocol::ChangeOp;

/// Capacity of the notification channel.
const FEED_CAPACITY: usize = 256;

/// Table names the feed reports on.
pub const APPOINTMENTS_TABLE: &str = "appointments";

/// One row-level change on a watched table.
#[derive(Debug, Clone)]
pub struct TableChange {
    pub table: &'static str,
    pub op: ChangeOp,
}

/// The change-notification stream. Cloneable — stored in AppState.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<TableChange>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Subscribe to change notifications. Each gateway connection calls
    /// this exactly once; dropping the receiver releases the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<TableChange> {
        self.sender.subscribe()
    }

    /// Report a committed change. No receivers is not an error.
    pub fn notify(&self, table: &'static str, op: ChangeOp) {
        let _ = self.sender.send(TableChange { table, op });
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
