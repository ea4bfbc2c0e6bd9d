use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use coursewise_achievements::AchievementCriteria;
use coursewise_core::{AchievementId, InstitutionId, UserId};

use crate::repositories::{ProgressQuery, RepositoryResult, TemplateRepository};

/// A template joined with one learner's progress on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementView {
    pub achievement_id: AchievementId,
    pub name: String,
    pub description: String,
    pub criteria: AchievementCriteria,
    pub points: u32,
    pub target_value: u64,
    pub progress: u64,
    pub percent: u8,
    pub unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Read side of the achievement pipeline.
///
/// Holds only a [`ProgressQuery`], so it cannot modify progress.
pub struct AchievementQueryService {
    templates: Arc<dyn TemplateRepository>,
    progress: Arc<dyn ProgressQuery>,
}

impl AchievementQueryService {
    pub fn new(templates: Arc<dyn TemplateRepository>, progress: Arc<dyn ProgressQuery>) -> Self {
        Self {
            templates,
            progress,
        }
    }

    /// Every active template of the institution, plus retired ones the learner
    /// already made progress on.
    pub async fn for_user(
        &self,
        institution_id: InstitutionId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<AchievementView>> {
        let templates = self.templates.list_by_institution(institution_id).await?;
        let mut records: HashMap<AchievementId, _> = self
            .progress
            .list_by_user(institution_id, user_id)
            .await?
            .into_iter()
            .map(|r| (r.achievement_id(), r))
            .collect();

        let views = templates
            .into_iter()
            .filter_map(|t| {
                let record = records.remove(&t.id);
                if !t.active && record.is_none() {
                    return None;
                }
                let progress = record.as_ref().map_or(0, |r| r.progress());
                let unlocked_at = record.as_ref().and_then(|r| r.unlocked_at());
                let percent = record.as_ref().map_or(0, |r| r.percent_of(t.target_value));
                Some(AchievementView {
                    achievement_id: t.id,
                    name: t.name,
                    description: t.description,
                    criteria: t.criteria,
                    points: t.points,
                    target_value: t.target_value,
                    progress,
                    percent,
                    unlocked: unlocked_at.is_some(),
                    unlocked_at,
                })
            })
            .collect();
        Ok(views)
    }

    pub async fn unlocked_for_user(
        &self,
        institution_id: InstitutionId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<AchievementView>> {
        let mut views = self.for_user(institution_id, user_id).await?;
        views.retain(|v| v.unlocked);
        Ok(views)
    }

    /// Sum of points over unlocked achievements.
    pub async fn points_for_user(
        &self,
        institution_id: InstitutionId,
        user_id: UserId,
    ) -> RepositoryResult<u64> {
        let unlocked = self.unlocked_for_user(institution_id, user_id).await?;
        Ok(unlocked.iter().map(|v| u64::from(v.points)).sum())
    }
}
