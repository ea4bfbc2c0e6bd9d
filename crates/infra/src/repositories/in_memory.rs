use std::cmp::Reverse;

use async_trait::async_trait;

use coursewise_achievements::{AchievementTemplate, UserAchievement};
use coursewise_core::{AchievementId, FeedEntryId, InstitutionId, UserId};

use super::{
    FeedRepository, ProgressQuery, ProgressRepository, RepositoryResult, TemplateRepository,
};
use crate::feed::FeedEntry;
use crate::read_model::PartitionedStore;

#[derive(Debug, Default)]
pub struct InMemoryTemplateRepository {
    store: PartitionedStore<AchievementId, AchievementTemplate>,
}

impl InMemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn find_by_id(
        &self,
        institution_id: InstitutionId,
        id: AchievementId,
    ) -> RepositoryResult<Option<AchievementTemplate>> {
        Ok(self.store.get(institution_id, &id))
    }

    async fn list_by_institution(
        &self,
        institution_id: InstitutionId,
    ) -> RepositoryResult<Vec<AchievementTemplate>> {
        let mut templates = self.store.list_where(institution_id, |_, _| true);
        templates.sort_by_key(|t| t.id);
        Ok(templates)
    }

    async fn save(&self, template: &AchievementTemplate) -> RepositoryResult<()> {
        self.store
            .upsert(template.institution_id, template.id, template.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryProgressRepository {
    store: PartitionedStore<(UserId, AchievementId), UserAchievement>,
}

impl InMemoryProgressRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressQuery for InMemoryProgressRepository {
    async fn find(
        &self,
        institution_id: InstitutionId,
        user_id: UserId,
        achievement_id: AchievementId,
    ) -> RepositoryResult<Option<UserAchievement>> {
        Ok(self.store.get(institution_id, &(user_id, achievement_id)))
    }

    async fn list_by_user(
        &self,
        institution_id: InstitutionId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<UserAchievement>> {
        let mut records = self
            .store
            .list_where(institution_id, |(user, _), _| *user == user_id);
        records.sort_by_key(UserAchievement::achievement_id);
        Ok(records)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn save(&self, record: &UserAchievement) -> RepositoryResult<()> {
        self.store.upsert(
            record.institution_id(),
            (record.user_id(), record.achievement_id()),
            record.clone(),
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryFeedRepository {
    store: PartitionedStore<FeedEntryId, FeedEntry>,
}

impl InMemoryFeedRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedRepository for InMemoryFeedRepository {
    async fn append(&self, entry: FeedEntry) -> RepositoryResult<()> {
        self.store.upsert(entry.institution_id, entry.id, entry);
        Ok(())
    }

    async fn recent(
        &self,
        institution_id: InstitutionId,
        limit: usize,
    ) -> RepositoryResult<Vec<FeedEntry>> {
        let mut entries = self.store.list_where(institution_id, |_, _| true);
        entries.sort_by_key(|e| Reverse((e.occurred_at, e.id)));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use coursewise_achievements::AchievementCriteria;

    use crate::feed::FeedKind;

    #[tokio::test]
    async fn progress_is_listed_per_user_and_institution() {
        let repo = InMemoryProgressRepository::new();
        let institution_id = InstitutionId::new();
        let alice = UserId::new();
        let bob = UserId::new();

        for user in [alice, alice, bob] {
            let record = UserAchievement::locked(institution_id, user, AchievementId::new());
            repo.save(&record).await.unwrap();
        }
        repo.save(&UserAchievement::locked(InstitutionId::new(), alice, AchievementId::new()))
            .await
            .unwrap();

        assert_eq!(repo.list_by_user(institution_id, alice).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_user(institution_id, bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_records_are_none_not_errors() {
        let repo = InMemoryProgressRepository::new();
        let found = repo
            .find(InstitutionId::new(), UserId::new(), AchievementId::new())
            .await
            .unwrap();
        assert!(found.is_none());

        let templates = InMemoryTemplateRepository::new();
        assert!(
            templates
                .list_by_institution(InstitutionId::new())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn templates_are_scoped_to_their_institution() {
        let repo = InMemoryTemplateRepository::new();
        let institution_id = InstitutionId::new();
        let template = AchievementTemplate::new(
            institution_id,
            "Finisher",
            AchievementCriteria::CoursesCompleted,
            1,
        )
        .unwrap();
        repo.save(&template).await.unwrap();

        assert_eq!(
            repo.find_by_id(institution_id, template.id).await.unwrap(),
            Some(template.clone())
        );
        assert!(
            repo.find_by_id(InstitutionId::new(), template.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn feed_is_newest_first_and_limited() {
        let repo = InMemoryFeedRepository::new();
        let institution_id = InstitutionId::new();
        let start = Utc::now();

        for minutes in [5, 1, 3] {
            repo.append(FeedEntry {
                id: FeedEntryId::new(),
                institution_id,
                user_id: UserId::new(),
                kind: FeedKind::CourseEnrolled,
                subject_id: None,
                occurred_at: start + Duration::minutes(minutes),
            })
            .await
            .unwrap();
        }

        let recent = repo.recent(institution_id, 2).await.unwrap();
        let offsets: Vec<i64> = recent
            .iter()
            .map(|e| (e.occurred_at - start).num_minutes())
            .collect();
        assert_eq!(offsets, vec![5, 3]);
    }
}
