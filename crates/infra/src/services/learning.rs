use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use coursewise_core::{
    CertificateId, CourseId, InstitutionId, LessonId, ModuleId, QuestionnaireId, StudySessionId,
    UserId,
};
use coursewise_events::{
    CertificateEarned, CourseCompleted, CourseEnrolled, DomainEvent, EventBus, EventEnvelope,
    EventMetadata, LessonCompleted, ProfileCompleted, QuestionnaireCompleted,
    StudySessionCompleted, UserLogin,
};

/// Who acted, where, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnerContext {
    pub institution_id: InstitutionId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
    /// Copied into envelope metadata as `correlation_id`.
    pub correlation_id: Option<Uuid>,
}

impl LearnerContext {
    pub fn now(institution_id: InstitutionId, user_id: UserId) -> Self {
        Self::at(institution_id, user_id, Utc::now())
    }

    pub fn at(institution_id: InstitutionId, user_id: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            institution_id,
            user_id,
            occurred_at,
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonCompletion {
    pub lesson_id: LessonId,
    pub module_id: Option<ModuleId>,
    pub course_id: Option<CourseId>,
    pub completion_time_secs: u64,
    pub score: Option<u32>,
}

/// Records learning activity by publishing it on the bus.
///
/// Every operation returns the id of the published event. Subscriber
/// failures are the bus's concern and never surface here.
#[derive(Debug, Clone)]
pub struct LearningActivityService<B> {
    bus: B,
}

impl<B: EventBus> LearningActivityService<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub async fn enroll(&self, ctx: LearnerContext, course_id: CourseId) -> Uuid {
        self.publish(
            ctx,
            CourseEnrolled {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                course_id,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    pub async fn complete_lesson(&self, ctx: LearnerContext, lesson: LessonCompletion) -> Uuid {
        self.publish(
            ctx,
            LessonCompleted {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                lesson_id: lesson.lesson_id,
                module_id: lesson.module_id,
                course_id: lesson.course_id,
                completion_time_secs: lesson.completion_time_secs,
                score: lesson.score,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    pub async fn complete_course(
        &self,
        ctx: LearnerContext,
        course_id: CourseId,
        final_score: Option<u32>,
    ) -> Uuid {
        self.publish(
            ctx,
            CourseCompleted {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                course_id,
                final_score,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    pub async fn complete_questionnaire(
        &self,
        ctx: LearnerContext,
        questionnaire_id: QuestionnaireId,
        course_id: Option<CourseId>,
        score: u32,
        passed: bool,
    ) -> Uuid {
        self.publish(
            ctx,
            QuestionnaireCompleted {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                questionnaire_id,
                course_id,
                score,
                passed,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    pub async fn record_login(&self, ctx: LearnerContext) -> Uuid {
        self.publish(
            ctx,
            UserLogin {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    pub async fn complete_study_session(
        &self,
        ctx: LearnerContext,
        session_id: StudySessionId,
        duration_minutes: u32,
        course_id: Option<CourseId>,
    ) -> Uuid {
        self.publish(
            ctx,
            StudySessionCompleted {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                session_id,
                duration_minutes,
                course_id,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    pub async fn award_certificate(
        &self,
        ctx: LearnerContext,
        certificate_id: CertificateId,
        course_id: CourseId,
    ) -> Uuid {
        self.publish(
            ctx,
            CertificateEarned {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                certificate_id,
                course_id,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    pub async fn complete_profile(&self, ctx: LearnerContext) -> Uuid {
        self.publish(
            ctx,
            ProfileCompleted {
                institution_id: ctx.institution_id,
                user_id: ctx.user_id,
                occurred_at: ctx.occurred_at,
            },
        )
        .await
    }

    async fn publish(&self, ctx: LearnerContext, event: impl Into<DomainEvent>) -> Uuid {
        let mut envelope = EventEnvelope::new(event);
        if let Some(correlation_id) = ctx.correlation_id {
            let mut metadata = EventMetadata::new();
            metadata.insert("correlation_id".into(), correlation_id.to_string().into());
            envelope = envelope.with_metadata(metadata);
        }

        let report = self.bus.publish(envelope).await;
        debug!(
            event_id = %report.event_id,
            event_type = %report.event_type,
            invoked = report.invoked,
            failed = report.failures.len(),
            "learning activity published"
        );
        report.event_id
    }
}
