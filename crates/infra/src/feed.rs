//! Activity feed read model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use coursewise_core::{FeedEntryId, InstitutionId, UserId};
use coursewise_events::{DomainEvent, EventEnvelope};

/// What happened, as shown in the feed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    CourseEnrolled,
    CourseCompleted,
    CertificateEarned,
    ProfileCompleted,
}

/// One line of an institution's activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: FeedEntryId,
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub kind: FeedKind,
    /// Course or certificate the entry is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl FeedEntry {
    /// Feed entry for an envelope, or `None` for events the feed does not show.
    ///
    /// The entry id is the envelope's event id, so redelivery overwrites
    /// instead of duplicating.
    pub fn from_envelope(envelope: &EventEnvelope) -> Option<Self> {
        let (kind, subject_id) = match envelope.payload() {
            DomainEvent::CourseEnrolled(e) => (FeedKind::CourseEnrolled, Some(*e.course_id.as_uuid())),
            DomainEvent::CourseCompleted(e) => {
                (FeedKind::CourseCompleted, Some(*e.course_id.as_uuid()))
            }
            DomainEvent::CertificateEarned(e) => {
                (FeedKind::CertificateEarned, Some(*e.certificate_id.as_uuid()))
            }
            DomainEvent::ProfileCompleted(_) => (FeedKind::ProfileCompleted, None),
            DomainEvent::LessonCompleted(_)
            | DomainEvent::QuestionnaireCompleted(_)
            | DomainEvent::UserLogin(_)
            | DomainEvent::StudySessionCompleted(_) => return None,
        };

        let payload = envelope.payload();
        Some(Self {
            id: FeedEntryId::from_uuid(envelope.event_id()),
            institution_id: payload.institution_id(),
            user_id: payload.user_id(),
            kind,
            subject_id,
            occurred_at: payload.occurred_at(),
        })
    }
}
