use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use coursewise_achievements::AchievementTemplate;
use coursewise_core::{AchievementId, DomainError, InstitutionId};

use crate::repositories::{RepositoryError, TemplateRepository};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Institution-facing management of achievement templates.
pub struct AchievementCatalogService {
    templates: Arc<dyn TemplateRepository>,
}

impl AchievementCatalogService {
    pub fn new(templates: Arc<dyn TemplateRepository>) -> Self {
        Self { templates }
    }

    /// Validate and store a template. Re-registering an id replaces it.
    pub async fn register(&self, template: AchievementTemplate) -> Result<AchievementId, CatalogError> {
        template.validate()?;
        self.templates.save(&template).await?;
        info!(
            institution_id = %template.institution_id,
            achievement_id = %template.id,
            criteria = ?template.criteria,
            target_value = template.target_value,
            "achievement template registered"
        );
        Ok(template.id)
    }

    /// Register many templates; stops at the first invalid one.
    pub async fn register_all(
        &self,
        templates: impl IntoIterator<Item = AchievementTemplate>,
    ) -> Result<usize, CatalogError> {
        let mut count = 0;
        for template in templates {
            self.register(template).await?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn list(
        &self,
        institution_id: InstitutionId,
    ) -> Result<Vec<AchievementTemplate>, CatalogError> {
        Ok(self.templates.list_by_institution(institution_id).await?)
    }

    /// Stop a template from receiving progress. Earned achievements are kept.
    pub async fn deactivate(
        &self,
        institution_id: InstitutionId,
        id: AchievementId,
    ) -> Result<(), CatalogError> {
        let template = self
            .templates
            .find_by_id(institution_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("achievement template {id}")))?;
        self.templates.save(&template.deactivated()).await?;
        info!(institution_id = %institution_id, achievement_id = %id, "achievement template deactivated");
        Ok(())
    }
}
