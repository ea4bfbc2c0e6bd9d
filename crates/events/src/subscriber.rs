use async_trait::async_trait;

use crate::{EventEnvelope, EventType};

/// Error a subscriber may hand back to the bus.
///
/// The bus only logs it; nothing is propagated to the publisher.
pub type HandlerError = anyhow::Error;

/// A named consumer of published events.
///
/// Implementations should be:
/// - **Self-contained**: catch and log their own failures; returning `Err` (or
///   panicking) is tolerated by the bus but only ever ends up in a log line
/// - **Idempotent**: the same envelope may be handed over again by a replay
/// - **Stable in their interest**: `subscribed_event_types` is read once, when
///   the subscriber is registered
///
/// ```ignore
/// struct StreakTracker { /* ... */ }
///
/// #[async_trait]
/// impl EventSubscriber for StreakTracker {
///     fn subscribed_event_types(&self) -> &[EventType] {
///         &[EventType::UserLogin]
///     }
///
///     async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
///         // update streak read model...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Event types this subscriber wants delivered.
    fn subscribed_event_types(&self) -> &[EventType];

    /// Identity used in logs and failure reports.
    fn subscriber_id(&self) -> Option<&str> {
        None
    }

    fn is_interested_in(&self, event_type: EventType) -> bool {
        self.subscribed_event_types().contains(&event_type)
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError>;
}

/// Log label for a subscriber without an explicit id.
pub(crate) const ANONYMOUS_SUBSCRIBER: &str = "anonymous";

pub(crate) fn subscriber_label(subscriber: &dyn EventSubscriber) -> &str {
    subscriber.subscriber_id().unwrap_or(ANONYMOUS_SUBSCRIBER)
}
