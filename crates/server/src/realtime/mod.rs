//! Presence and message fan-out.
//!
//! - [`ConnectionRegistry`]: user -> live connection handles
//! - [`PresenceBroadcaster`]: full online set to every connection on change
//! - [`DeliveryRouter`]: one event to every connection of one user
//!
//! [`RealtimeHub`] ties them together behind the lifecycle hooks the
//! connection layer calls.

pub mod presence;
pub mod registry;
pub mod router;

pub use presence::PresenceBroadcaster;
pub use registry::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, EventReceiver, PresenceBroadcast,
};
pub use router::DeliveryRouter;

use crate::models::ServerEvent;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct RealtimeHub {
    registry: Arc<ConnectionRegistry>,
    presence: PresenceBroadcaster,
    router: DeliveryRouter,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            presence: PresenceBroadcaster::new(registry.clone()),
            router: DeliveryRouter::new(registry.clone()),
            registry,
        }
    }

    /// Connection established. Anonymous handles only receive broadcasts.
    pub fn on_connect(&self, handle: ConnectionHandle) {
        match handle.user_id() {
            Some(user_id) => {
                info!("[Realtime] {} connected ({})", user_id, handle.id());
                self.registry.register(user_id, handle.clone());
            }
            None => {
                info!("[Realtime] anonymous connection {}", handle.id());
                self.registry.register_anonymous(handle);
            }
        }
        self.presence.announce();
    }

    /// Connection gone. Safe to call more than once for the same handle.
    pub fn on_disconnect(&self, handle: &ConnectionHandle) {
        if let Some(user_id) = self.registry.unregister(handle) {
            info!("[Realtime] {} disconnected ({})", user_id, handle.id());
        }
        self.presence.announce();
    }

    /// Deliver if online
    pub fn deliver(&self, user_id: &str, event: &ServerEvent) -> usize {
        self.router.deliver(user_id, event)
    }

    pub fn online_user_ids(&self) -> BTreeSet<String> {
        self.registry.online_user_ids()
    }

    pub fn router(&self) -> &DeliveryRouter {
        &self.router
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
