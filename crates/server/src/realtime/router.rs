use super::registry::ConnectionRegistry;
use crate::models::ServerEvent;
use std::sync::Arc;
use tracing::debug;

/// Routes one event to exactly the live connections of one user.
///
/// Offline recipients are not queued for: the event is dropped and the
/// durable copy, if any, lives in the message store.
#[derive(Clone)]
pub struct DeliveryRouter {
    registry: Arc<ConnectionRegistry>,
}

impl DeliveryRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Push `event` to every connection of `recipient_id`.
    ///
    /// Returns the number of accepted pushes; zero when the user is offline.
    pub fn deliver(&self, recipient_id: &str, event: &ServerEvent) -> usize {
        let connections = self.registry.connections_for(recipient_id);
        if connections.is_empty() {
            debug!(
                "[Router] {} offline, dropping {}",
                recipient_id,
                event.kind()
            );
            return 0;
        }

        let delivered = connections
            .iter()
            .filter(|conn| conn.push(event.clone()))
            .count();

        debug!(
            "[Router] {} -> {} ({}/{} connection(s))",
            event.kind(),
            recipient_id,
            delivered,
            connections.len()
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageContent, MessageEvent};
    use crate::realtime::registry::ConnectionHandle;
    use chrono::Utc;

    fn message(text: &str) -> ServerEvent {
        ServerEvent::NewMessage(MessageEvent {
            record_id: uuid::Uuid::new_v4().to_string(),
            sender_id: "alice".into(),
            recipient_id: "bob".into(),
            content: MessageContent::text(text),
            created_at: Utc::now(),
        })
    }

    #[test]
    fn test_fan_out_to_every_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (c1, mut rx1) = ConnectionHandle::new(Some("bob".into()));
        let (c2, mut rx2) = ConnectionHandle::new(Some("bob".into()));
        let (other, mut rx_other) = ConnectionHandle::new(Some("alice".into()));
        registry.register("bob", c1);
        registry.register("bob", c2);
        registry.register("alice", other);

        let router = DeliveryRouter::new(registry);
        let event = message("hello");
        assert_eq!(router.deliver("bob", &event), 2);

        assert_eq!(rx1.try_recv().unwrap(), event);
        assert_eq!(rx2.try_recv().unwrap(), event);
        assert!(rx1.try_recv().is_err());
        assert!(rx_other.try_recv().is_err());
    }

    #[test]
    fn test_offline_recipient_is_dropped_silently() {
        let router = DeliveryRouter::new(Arc::new(ConnectionRegistry::new()));
        assert_eq!(router.deliver("nobody", &message("hello")), 0);
    }

    #[test]
    fn test_connection_closed_after_snapshot_fails_alone() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (c1, rx1) = ConnectionHandle::new(Some("bob".into()));
        let (c2, mut rx2) = ConnectionHandle::new(Some("bob".into()));
        registry.register("bob", c1);
        registry.register("bob", c2);
        drop(rx1);

        let router = DeliveryRouter::new(registry);
        assert_eq!(router.deliver("bob", &message("hello")), 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_per_connection_order_is_preserved() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (c1, mut rx1) = ConnectionHandle::new(Some("bob".into()));
        registry.register("bob", c1);
        let router = DeliveryRouter::new(registry);

        let events: Vec<_> = (0..5).map(|i| message(&format!("m{}", i))).collect();
        for event in &events {
            router.deliver("bob", event);
        }
        for event in &events {
            assert_eq!(&rx1.try_recv().unwrap(), event);
        }
    }
}
