//! Event publishing/subscription abstraction (mechanics only).
//!
//! This module provides the **event bus pattern**: a pub/sub mechanism that
//! decouples use cases (publishers) from feature handlers (achievements, the
//! activity feed, ...).
//!
//! ## Design Philosophy
//!
//! The event bus is intentionally **lightweight**:
//!
//! - **In-process**: subscribers are plain objects registered at bootstrap
//! - **No persistence**: nothing survives a restart, subscriptions are rebuilt on start
//! - **No ordering guarantees**: subscribers of one event run concurrently
//! - **Failure isolation**: a failing subscriber never affects its siblings or the publisher
//!
//! ## Why isolate failures?
//!
//! The operation that produced an event (completing a lesson, logging in) has
//! already happened when the event is published. A bug in achievement
//! bookkeeping must not make that operation look failed, and must not stop the
//! activity feed from seeing the same event.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{EventEnvelope, EventSubscriber, EventType};

/// Why a single subscriber did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// `handle` returned an error.
    Error(String),
    /// `handle` panicked (synchronously or while being polled).
    Panic(String),
}

/// A subscriber failure observed (and swallowed) during one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    pub subscriber: String,
    pub kind: FailureKind,
}

/// Outcome of one `publish` call.
///
/// Purely informational: publishers are free to ignore it. It never turns a
/// subscriber failure into a publisher failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub event_id: Uuid,
    pub event_type: EventType,
    /// Number of subscribers whose `handle` was invoked.
    pub invoked: usize,
    pub failures: Vec<SubscriberFailure>,
}

impl PublishReport {
    pub fn new(event: &EventEnvelope, invoked: usize) -> Self {
        Self {
            event_id: event.event_id(),
            event_type: event.event_type(),
            invoked,
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.invoked.saturating_sub(self.failures.len())
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// ## Delivery Guarantees
///
/// - Every subscriber interested in the event type at the time of `publish`
///   is invoked exactly once for that call.
/// - `publish` resolves only after every invoked handler has settled
///   (completed, returned an error, or panicked).
/// - `publish` never fails; an event without subscribers is not an error.
///
/// ## Registration
///
/// Registration is identity-based: registering the same subscriber instance
/// twice is a no-op, and `unsubscribe` matches on the instance, not on its
/// declared id.
///
/// ## Thread Safety
///
/// The trait requires `Send + Sync`, so one instance can be shared (usually as
/// `Arc<B>`) by every component that publishes.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> PublishReport;

    /// Register a subscriber. Returns `false` if this instance was already registered.
    fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> bool;

    /// Remove a subscriber. Returns `false` if it was not registered.
    fn unsubscribe(&self, subscriber: &dyn EventSubscriber) -> bool;

    /// Snapshot of the subscribers currently interested in `event_type`.
    fn subscribers(&self, event_type: EventType) -> Vec<Arc<dyn EventSubscriber>>;

    fn has_subscribers(&self, event_type: EventType) -> bool {
        !self.subscribers(event_type).is_empty()
    }

    /// Number of distinct registered subscribers.
    fn subscriber_count(&self) -> usize;
}

#[async_trait]
impl<B> EventBus for Arc<B>
where
    B: EventBus + ?Sized,
{
    async fn publish(&self, event: EventEnvelope) -> PublishReport {
        (**self).publish(event).await
    }

    fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> bool {
        (**self).subscribe(subscriber)
    }

    fn unsubscribe(&self, subscriber: &dyn EventSubscriber) -> bool {
        (**self).unsubscribe(subscriber)
    }

    fn subscribers(&self, event_type: EventType) -> Vec<Arc<dyn EventSubscriber>> {
        (**self).subscribers(event_type)
    }

    fn has_subscribers(&self, event_type: EventType) -> bool {
        (**self).has_subscribers(event_type)
    }

    fn subscriber_count(&self) -> usize {
        (**self).subscriber_count()
    }
}
