//! In-process event bus.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::bus::{EventBus, FailureKind, PublishReport, SubscriberFailure};
use crate::subscriber::subscriber_label;
use crate::{EventEnvelope, EventSubscriber, EventType};

#[derive(Default)]
struct Registry {
    /// Registration order, one entry per distinct instance.
    subscribers: Vec<Arc<dyn EventSubscriber>>,
    by_type: HashMap<EventType, Vec<Arc<dyn EventSubscriber>>>,
}

impl Registry {
    fn position(&self, subscriber: &dyn EventSubscriber) -> Option<usize> {
        self.subscribers
            .iter()
            .position(|s| std::ptr::addr_eq(Arc::as_ptr(s), subscriber))
    }
}

/// In-memory pub/sub bus.
///
/// - One instance per process, owned by the composition root
/// - Interested subscribers run concurrently on the publishing task
/// - Handler errors and panics are logged and swallowed
/// - Lookup goes through a per-event-type index kept in sync on (un)subscribe
pub struct InMemoryEventBus {
    registry: RwLock<Registry>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means a panic happened elsewhere while it was held;
    // the registry itself is never left half-updated.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }
}

impl core::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let registry = self.read();
        let ids: Vec<&str> = registry
            .subscribers
            .iter()
            .map(|s| subscriber_label(s.as_ref()))
            .collect();
        f.debug_struct("InMemoryEventBus")
            .field("subscribers", &ids)
            .finish()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> PublishReport {
        let event_type = event.event_type();
        // Snapshot first: the lock is not held while handlers run.
        let interested = self.subscribers(event_type);
        let mut report = PublishReport::new(&event, interested.len());

        if interested.is_empty() {
            debug!(
                event_id = %event.event_id(),
                event_type = %event_type,
                "no subscribers for event"
            );
            return report;
        }

        let outcomes = join_all(interested.iter().map(|s| deliver(s.as_ref(), &event))).await;
        report.failures.extend(outcomes.into_iter().flatten());

        debug!(
            event_id = %event.event_id(),
            event_type = %event_type,
            invoked = report.invoked,
            failed = report.failures.len(),
            "event published"
        );
        report
    }

    fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> bool {
        let mut registry = self.write();
        if registry.position(subscriber.as_ref()).is_some() {
            debug!(
                subscriber = subscriber_label(subscriber.as_ref()),
                "subscriber already registered"
            );
            return false;
        }

        let mut types = subscriber.subscribed_event_types().to_vec();
        types.sort();
        types.dedup();
        for event_type in &types {
            registry
                .by_type
                .entry(*event_type)
                .or_default()
                .push(Arc::clone(&subscriber));
        }

        info!(
            subscriber = subscriber_label(subscriber.as_ref()),
            event_types = ?types,
            "subscriber registered"
        );
        registry.subscribers.push(subscriber);
        true
    }

    fn unsubscribe(&self, subscriber: &dyn EventSubscriber) -> bool {
        let mut registry = self.write();
        let Some(idx) = registry.position(subscriber) else {
            return false;
        };
        registry.subscribers.remove(idx);

        registry.by_type.retain(|_, list| {
            list.retain(|s| !std::ptr::addr_eq(Arc::as_ptr(s), subscriber));
            !list.is_empty()
        });

        info!(subscriber = subscriber_label(subscriber), "subscriber removed");
        true
    }

    fn subscribers(&self, event_type: EventType) -> Vec<Arc<dyn EventSubscriber>> {
        self.read()
            .by_type
            .get(&event_type)
            .cloned()
            .unwrap_or_default()
    }

    fn has_subscribers(&self, event_type: EventType) -> bool {
        self.read().by_type.contains_key(&event_type)
    }

    fn subscriber_count(&self) -> usize {
        self.read().subscribers.len()
    }
}

/// Run one handler to completion, converting errors and panics into a failure record.
async fn deliver(
    subscriber: &dyn EventSubscriber,
    event: &EventEnvelope,
) -> Option<SubscriberFailure> {
    let label = subscriber_label(subscriber);

    // Covers handlers that panic before handing back a future as well as
    // panics while the future is polled.
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| subscriber.handle(event))) {
        Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
        Err(payload) => Err(payload),
    };

    let kind = match outcome {
        Ok(Ok(())) => return None,
        Ok(Err(err)) => {
            error!(
                subscriber = label,
                event_id = %event.event_id(),
                event_type = %event.event_type(),
                error = %format!("{err:#}"),
                "event subscriber failed"
            );
            FailureKind::Error(format!("{err:#}"))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                subscriber = label,
                event_id = %event.event_id(),
                event_type = %event.event_type(),
                panic = %message,
                "event subscriber panicked"
            );
            FailureKind::Panic(message)
        }
    };

    Some(SubscriberFailure {
        subscriber: label.to_string(),
        kind,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
