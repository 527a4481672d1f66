use super::registry::ConnectionRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Announces the full online-user set to every known connection
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Push a `presenceSnapshot` to all connections, best effort.
    ///
    /// Returns how many pushes were accepted. A closed connection is skipped
    /// without affecting the rest.
    pub fn announce(&self) -> usize {
        let outcome = self.registry.broadcast_presence();
        for id in &outcome.closed {
            debug!("[Presence] connection {} already closed", id);
        }

        info!(
            "[Presence] {} user(s) online, announced to {}/{} connection(s)",
            outcome.online, outcome.delivered, outcome.connections
        );
        outcome.delivered
    }
}
