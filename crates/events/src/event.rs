//! Learning-activity domain events.
//!
//! Events are:
//! - **immutable** (treat them as facts)
//! - **versioned** (schema evolution)
//! - a **closed set**: consumers match exhaustively on [`DomainEvent`]

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coursewise_core::{
    CertificateId, CourseId, DomainError, InstitutionId, LessonId, ModuleId, QuestionnaireId,
    StudySessionId, UserId,
};

/// Schema version stamped on every event produced by this crate.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Stable discriminator for a [`DomainEvent`] variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CourseCompleted,
    LessonCompleted,
    QuestionnaireCompleted,
    UserLogin,
    StudySessionCompleted,
    CertificateEarned,
    ProfileCompleted,
    CourseEnrolled,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::CourseCompleted,
        EventType::LessonCompleted,
        EventType::QuestionnaireCompleted,
        EventType::UserLogin,
        EventType::StudySessionCompleted,
        EventType::CertificateEarned,
        EventType::ProfileCompleted,
        EventType::CourseEnrolled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::CourseCompleted => "COURSE_COMPLETED",
            EventType::LessonCompleted => "LESSON_COMPLETED",
            EventType::QuestionnaireCompleted => "QUESTIONNAIRE_COMPLETED",
            EventType::UserLogin => "USER_LOGIN",
            EventType::StudySessionCompleted => "STUDY_SESSION_COMPLETED",
            EventType::CertificateEarned => "CERTIFICATE_EARNED",
            EventType::ProfileCompleted => "PROFILE_COMPLETED",
            EventType::CourseEnrolled => "COURSE_ENROLLED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown event type '{s}'")))
    }
}

/// Event: a learner finished every requirement of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCompleted {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub course_id: CourseId,
    /// Final grade as a percentage (0-100), when the course is graded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a learner finished a single lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonCompleted {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub lesson_id: LessonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<ModuleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    /// Time spent on the lesson, in seconds.
    pub completion_time_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a learner submitted a questionnaire (quiz, exam, survey).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireCompleted {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub questionnaire_id: QuestionnaireId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    /// Percentage (0-100).
    pub score: u32,
    pub passed: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLogin {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySessionCompleted {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub session_id: StudySessionId,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<CourseId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateEarned {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub certificate_id: CertificateId,
    pub course_id: CourseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCompleted {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEnrolled {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub occurred_at: DateTime<Utc>,
}

/// Every fact the learning platform publishes on the bus.
///
/// Serialized internally tagged by `type` (e.g. `{"type":"USER_LOGIN", ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    CourseCompleted(CourseCompleted),
    LessonCompleted(LessonCompleted),
    QuestionnaireCompleted(QuestionnaireCompleted),
    UserLogin(UserLogin),
    StudySessionCompleted(StudySessionCompleted),
    CertificateEarned(CertificateEarned),
    ProfileCompleted(ProfileCompleted),
    CourseEnrolled(CourseEnrolled),
}

impl DomainEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::CourseCompleted(_) => EventType::CourseCompleted,
            DomainEvent::LessonCompleted(_) => EventType::LessonCompleted,
            DomainEvent::QuestionnaireCompleted(_) => EventType::QuestionnaireCompleted,
            DomainEvent::UserLogin(_) => EventType::UserLogin,
            DomainEvent::StudySessionCompleted(_) => EventType::StudySessionCompleted,
            DomainEvent::CertificateEarned(_) => EventType::CertificateEarned,
            DomainEvent::ProfileCompleted(_) => EventType::ProfileCompleted,
            DomainEvent::CourseEnrolled(_) => EventType::CourseEnrolled,
        }
    }

    pub fn institution_id(&self) -> InstitutionId {
        match self {
            DomainEvent::CourseCompleted(e) => e.institution_id,
            DomainEvent::LessonCompleted(e) => e.institution_id,
            DomainEvent::QuestionnaireCompleted(e) => e.institution_id,
            DomainEvent::UserLogin(e) => e.institution_id,
            DomainEvent::StudySessionCompleted(e) => e.institution_id,
            DomainEvent::CertificateEarned(e) => e.institution_id,
            DomainEvent::ProfileCompleted(e) => e.institution_id,
            DomainEvent::CourseEnrolled(e) => e.institution_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            DomainEvent::CourseCompleted(e) => e.user_id,
            DomainEvent::LessonCompleted(e) => e.user_id,
            DomainEvent::QuestionnaireCompleted(e) => e.user_id,
            DomainEvent::UserLogin(e) => e.user_id,
            DomainEvent::StudySessionCompleted(e) => e.user_id,
            DomainEvent::CertificateEarned(e) => e.user_id,
            DomainEvent::ProfileCompleted(e) => e.user_id,
            DomainEvent::CourseEnrolled(e) => e.user_id,
        }
    }

    /// When the event occurred (business time).
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::CourseCompleted(e) => e.occurred_at,
            DomainEvent::LessonCompleted(e) => e.occurred_at,
            DomainEvent::QuestionnaireCompleted(e) => e.occurred_at,
            DomainEvent::UserLogin(e) => e.occurred_at,
            DomainEvent::StudySessionCompleted(e) => e.occurred_at,
            DomainEvent::CertificateEarned(e) => e.occurred_at,
            DomainEvent::ProfileCompleted(e) => e.occurred_at,
            DomainEvent::CourseEnrolled(e) => e.occurred_at,
        }
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for DomainEvent {
                fn from(value: $variant) -> Self {
                    DomainEvent::$variant(value)
                }
            }
        )*
    };
}

impl_from_payload!(
    CourseCompleted,
    LessonCompleted,
    QuestionnaireCompleted,
    UserLogin,
    StudySessionCompleted,
    CertificateEarned,
    ProfileCompleted,
    CourseEnrolled,
);
