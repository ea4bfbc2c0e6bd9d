//! Achievement progress tracking.
//!
//! Reacts to completion, login, study and profile events and moves every
//! matching template of the event's institution forward for the acting
//! learner. Failures are contained per template: one broken template or a
//! failed save never prevents the remaining templates from being evaluated.
//!
//! ## Serialisation
//!
//! Evaluation is a read-modify-write against the progress repository. Two
//! events for the same learner delivered concurrently would otherwise race and
//! lose an update, so by default evaluation holds a per-(institution, user)
//! async lock. Different learners never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use coursewise_achievements::{
    AchievementTemplate, ProgressChange, UserAchievement, evaluate,
};
use coursewise_core::{InstitutionId, UserId};
use coursewise_events::{DomainEvent, EventEnvelope, EventSubscriber, EventType, HandlerError};

use crate::repositories::{ProgressQuery, ProgressRepository, TemplateRepository};

pub const SUBSCRIBER_ID: &str = "achievement-progress";

const SUBSCRIBED: [EventType; 7] = [
    EventType::CourseCompleted,
    EventType::LessonCompleted,
    EventType::QuestionnaireCompleted,
    EventType::UserLogin,
    EventType::StudySessionCompleted,
    EventType::CertificateEarned,
    EventType::ProfileCompleted,
];

/// Outcome of evaluating one event against an institution's templates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Templates whose criteria react to the event.
    pub evaluated: usize,
    pub advanced: usize,
    pub unlocked: usize,
    pub failed: usize,
}

impl EvaluationSummary {
    fn record(&mut self, change: ProgressChange) {
        match change {
            ProgressChange::Advanced { .. } => self.advanced += 1,
            ProgressChange::Unlocked { .. } => self.unlocked += 1,
            ProgressChange::Unchanged | ProgressChange::Tracked => {}
        }
    }
}

type LearnerKey = (InstitutionId, UserId);

/// Async lock per learner, created on first use and dropped once unused.
#[derive(Debug, Default)]
struct LearnerLocks {
    locks: Mutex<HashMap<LearnerKey, Arc<AsyncMutex<()>>>>,
}

impl LearnerLocks {
    async fn acquire(&self, key: LearnerKey) -> LearnerGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key).or_default().clone()
        };
        LearnerGuard {
            locks: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Holds a learner's lock; on drop, removes the map entry if nobody else
/// holds or awaits it.
struct LearnerGuard<'a> {
    locks: &'a LearnerLocks,
    key: LearnerKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LearnerGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Waiters clone the Arc under this map lock, so a count of 1 is final.
        if locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

pub struct AchievementProgressSubscriber {
    templates: Arc<dyn TemplateRepository>,
    progress: Arc<dyn ProgressRepository>,
    locks: Option<LearnerLocks>,
}

impl AchievementProgressSubscriber {
    pub fn new(
        templates: Arc<dyn TemplateRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            templates,
            progress,
            locks: Some(LearnerLocks::default()),
        }
    }

    /// Toggle per-learner serialisation (on by default).
    pub fn serialize_per_learner(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(LearnerLocks::default);
        self
    }

    /// Evaluate one event and report what changed.
    ///
    /// Only a failure to list the institution's templates is returned as an
    /// error; per-template failures are logged and counted.
    pub async fn process(&self, envelope: &EventEnvelope) -> anyhow::Result<EvaluationSummary> {
        let event = envelope.payload();
        match event {
            DomainEvent::CourseCompleted(_)
            | DomainEvent::LessonCompleted(_)
            | DomainEvent::QuestionnaireCompleted(_)
            | DomainEvent::UserLogin(_)
            | DomainEvent::StudySessionCompleted(_)
            | DomainEvent::CertificateEarned(_)
            | DomainEvent::ProfileCompleted(_) => {}
            DomainEvent::CourseEnrolled(_) => return Ok(EvaluationSummary::default()),
        }

        let institution_id = event.institution_id();
        let user_id = event.user_id();
        let event_type = event.event_type();

        let templates: Vec<AchievementTemplate> = self
            .templates
            .list_by_institution(institution_id)
            .await
            .with_context(|| format!("listing achievement templates of {institution_id}"))?
            .into_iter()
            .filter(|t| t.applies_to(event_type))
            .collect();

        let mut summary = EvaluationSummary {
            evaluated: templates.len(),
            ..EvaluationSummary::default()
        };
        if templates.is_empty() {
            debug!(
                event_id = %envelope.event_id(),
                event_type = %event_type,
                institution_id = %institution_id,
                "no achievement templates react to event"
            );
            return Ok(summary);
        }

        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire((institution_id, user_id)).await),
            None => None,
        };

        for template in &templates {
            match self.apply(template, event).await {
                Ok(change) => {
                    if let ProgressChange::Unlocked { to, .. } = change {
                        info!(
                            institution_id = %institution_id,
                            user_id = %user_id,
                            achievement_id = %template.id,
                            achievement = %template.name,
                            progress = to,
                            "achievement unlocked"
                        );
                    }
                    summary.record(change);
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        event_id = %envelope.event_id(),
                        event_type = %event_type,
                        institution_id = %institution_id,
                        user_id = %user_id,
                        achievement_id = %template.id,
                        error = %format!("{e:#}"),
                        "achievement evaluation failed"
                    );
                }
            }
        }

        debug!(
            event_id = %envelope.event_id(),
            event_type = %event_type,
            evaluated = summary.evaluated,
            advanced = summary.advanced,
            unlocked = summary.unlocked,
            failed = summary.failed,
            "achievement evaluation finished"
        );
        Ok(summary)
    }

    async fn apply(
        &self,
        template: &AchievementTemplate,
        event: &DomainEvent,
    ) -> anyhow::Result<ProgressChange> {
        let institution_id = event.institution_id();
        let user_id = event.user_id();

        let mut record = self
            .progress
            .find(institution_id, user_id, template.id)
            .await
            .context("loading progress")?
            .unwrap_or_else(|| UserAchievement::locked(institution_id, user_id, template.id));

        let change = evaluate(template, &mut record, event)?;
        if change.is_dirty() {
            self.progress
                .save(&record)
                .await
                .context("saving progress")?;
        }
        Ok(change)
    }
}

#[async_trait]
impl EventSubscriber for AchievementProgressSubscriber {
    fn subscribed_event_types(&self) -> &[EventType] {
        &SUBSCRIBED
    }

    fn subscriber_id(&self) -> Option<&str> {
        Some(SUBSCRIBER_ID)
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), HandlerError> {
        self.process(event).await.map(|_| ())
    }
}
