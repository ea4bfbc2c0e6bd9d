use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use coursewise_events::{EventEnvelope, EventSubscriber, EventType, HandlerError};

use crate::feed::FeedEntry;
use crate::repositories::FeedRepository;

pub const SUBSCRIBER_ID: &str = "activity-feed";

const SUBSCRIBED: [EventType; 4] = [
    EventType::CourseEnrolled,
    EventType::CourseCompleted,
    EventType::CertificateEarned,
    EventType::ProfileCompleted,
];

/// Appends social-feed entries for enrolments, completions and certificates.
pub struct ActivityFeedSubscriber {
    feed: Arc<dyn FeedRepository>,
}

impl ActivityFeedSubscriber {
    pub fn new(feed: Arc<dyn FeedRepository>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl EventSubscriber for ActivityFeedSubscriber {
    fn subscribed_event_types(&self) -> &[EventType] {
        &SUBSCRIBED
    }

    fn subscriber_id(&self) -> Option<&str> {
        Some(SUBSCRIBER_ID)
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        let Some(entry) = FeedEntry::from_envelope(event) else {
            return Ok(());
        };
        debug!(
            event_id = %event.event_id(),
            institution_id = %entry.institution_id,
            kind = ?entry.kind,
            "appending feed entry"
        );
        self.feed
            .append(entry)
            .await
            .context("appending feed entry")?;
        Ok(())
    }
}
