//! Best-effort domain event publishing over NATS.

use crate::domain::events::DomainEvent;

/// Publishes [`DomainEvent`]s as JSON on their subject. Without a NATS
/// connection events are only traced. Failures are logged and never
/// surface to the caller.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self {
        Self { nats }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Connect to NATS, falling back to a disabled publisher on failure.
    pub async fn connect(url: &str) -> Self {
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(url, "Connected to NATS");
                Self::new(Some(client))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "NATS unavailable, domain events will not be published");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.nats.is_some()
    }

    pub async fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        let Some(client) = &self.nats else {
            tracing::debug!(subject, ?event, "domain event (publishing disabled)");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(subject, error = %e, "failed to serialize domain event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
            tracing::warn!(subject, error = %e, "failed to publish domain event");
        }
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").field("enabled", &self.is_enabled()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn disabled_publisher_swallows_events() {
        let publisher = EventPublisher::disabled();
        assert!(!publisher.is_enabled());
        publisher.publish(DomainEvent::Order(OrderEvent::Delivered { order_id: Uuid::nil() })).await;
        assert_eq!(format!("{publisher:?}"), "EventPublisher { enabled: false }");
    }
}
