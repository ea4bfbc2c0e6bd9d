//! Storage collaborators of the subscribers and services.
//!
//! Absence is never an error: lookups return `Ok(None)` or an empty list.
//! `RepositoryError` is reserved for storage failures.

use async_trait::async_trait;
use thiserror::Error;

use coursewise_achievements::{AchievementTemplate, UserAchievement};
use coursewise_core::{AchievementId, InstitutionId, UserId};

use crate::feed::FeedEntry;

pub mod in_memory;

pub use in_memory::{
    InMemoryFeedRepository, InMemoryProgressRepository, InMemoryTemplateRepository,
};

/// Failure of the backing storage. The in-memory stores never produce one.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Achievement templates per institution.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn find_by_id(
        &self,
        institution_id: InstitutionId,
        id: AchievementId,
    ) -> RepositoryResult<Option<AchievementTemplate>>;

    /// Every template of the institution, active or not.
    async fn list_by_institution(
        &self,
        institution_id: InstitutionId,
    ) -> RepositoryResult<Vec<AchievementTemplate>>;

    async fn save(&self, template: &AchievementTemplate) -> RepositoryResult<()>;
}

/// Read-only view of learner progress.
#[async_trait]
pub trait ProgressQuery: Send + Sync {
    async fn find(
        &self,
        institution_id: InstitutionId,
        user_id: UserId,
        achievement_id: AchievementId,
    ) -> RepositoryResult<Option<UserAchievement>>;

    async fn list_by_user(
        &self,
        institution_id: InstitutionId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<UserAchievement>>;
}

/// Progress store used by the achievement subscriber.
#[async_trait]
pub trait ProgressRepository: ProgressQuery {
    /// Insert or replace the record for its (institution, user, achievement).
    async fn save(&self, record: &UserAchievement) -> RepositoryResult<()>;
}

#[async_trait]
pub trait FeedRepository: Send + Sync {
    /// Append an entry; an entry with the same id replaces the earlier one.
    async fn append(&self, entry: FeedEntry) -> RepositoryResult<()>;

    /// Most recent entries of an institution, newest first.
    async fn recent(
        &self,
        institution_id: InstitutionId,
        limit: usize,
    ) -> RepositoryResult<Vec<FeedEntry>>;
}
