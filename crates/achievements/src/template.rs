use serde::{Deserialize, Serialize};

use coursewise_core::{AchievementId, DomainError, DomainResult, InstitutionId};
use coursewise_events::EventType;

use crate::criteria::AchievementCriteria;

/// Institution-defined badge: criteria plus the target that unlocks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementTemplate {
    pub id: AchievementId,
    pub institution_id: InstitutionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub criteria: AchievementCriteria,
    pub target_value: u64,
    #[serde(default)]
    pub points: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl AchievementTemplate {
    /// Create an active template with a fresh id.
    pub fn new(
        institution_id: InstitutionId,
        name: impl Into<String>,
        criteria: AchievementCriteria,
        target_value: u64,
    ) -> DomainResult<Self> {
        let template = Self {
            id: AchievementId::new(),
            institution_id,
            name: name.into(),
            description: String::new(),
            criteria,
            target_value,
            points: 0,
            active: true,
        };
        template.validate()?;
        Ok(template)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_points(mut self, points: u32) -> Self {
        self.points = points;
        self
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Check invariants (templates may also arrive deserialized from a catalog file).
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("achievement name cannot be empty"));
        }
        if self.target_value == 0 {
            return Err(DomainError::validation("target_value must be positive"));
        }
        if self.criteria == AchievementCriteria::ProfileCompleted && self.target_value != 1 {
            return Err(DomainError::validation(
                "profile_completed achievements must have target_value 1",
            ));
        }
        Ok(())
    }

    /// Whether events of this type can move progress on this template.
    pub fn applies_to(&self, event_type: EventType) -> bool {
        self.active && self.criteria.reacts_to(event_type)
    }
}
