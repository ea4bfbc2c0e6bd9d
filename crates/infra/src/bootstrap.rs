//! Composition root: wires the bus, stores, subscribers and services.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use coursewise_events::{EventBus, EventSubscriber, InMemoryEventBus};

use crate::config::{AppConfig, load_templates};
use crate::repositories::{
    InMemoryFeedRepository, InMemoryProgressRepository, InMemoryTemplateRepository,
};
use crate::services::{AchievementCatalogService, AchievementQueryService, LearningActivityService};
use crate::subscribers::{AchievementProgressSubscriber, ActivityFeedSubscriber};

/// One fully wired, independent instance of the pipeline.
pub struct Application {
    pub config: AppConfig,
    pub bus: Arc<InMemoryEventBus>,
    pub templates: Arc<InMemoryTemplateRepository>,
    pub progress: Arc<InMemoryProgressRepository>,
    pub feed: Arc<InMemoryFeedRepository>,
    pub learning: LearningActivityService<Arc<InMemoryEventBus>>,
    pub achievements: AchievementQueryService,
    pub catalog: AchievementCatalogService,
}

impl Application {
    /// Build every component and register the subscribers on a fresh bus.
    pub fn bootstrap(config: AppConfig) -> Self {
        let bus = Arc::new(InMemoryEventBus::new());
        let templates = Arc::new(InMemoryTemplateRepository::new());
        let progress = Arc::new(InMemoryProgressRepository::new());
        let feed = Arc::new(InMemoryFeedRepository::new());

        let subscribers: [Arc<dyn EventSubscriber>; 2] = [
            Arc::new(
                AchievementProgressSubscriber::new(templates.clone(), progress.clone())
                    .serialize_per_learner(config.serialize_progress),
            ),
            Arc::new(ActivityFeedSubscriber::new(feed.clone())),
        ];
        for subscriber in subscribers {
            bus.subscribe(subscriber);
        }

        info!(
            subscribers = bus.subscriber_count(),
            serialize_progress = config.serialize_progress,
            "application bootstrapped"
        );

        Self {
            learning: LearningActivityService::new(bus.clone()),
            achievements: AchievementQueryService::new(templates.clone(), progress.clone()),
            catalog: AchievementCatalogService::new(templates.clone()),
            config,
            bus,
            templates,
            progress,
            feed,
        }
    }

    /// Register the templates file named by the configuration, if any.
    pub async fn load_configured_templates(&self) -> anyhow::Result<usize> {
        let Some(path) = &self.config.templates_path else {
            return Ok(0);
        };
        let templates = load_templates(path)?;
        let count = self
            .catalog
            .register_all(templates)
            .await
            .with_context(|| format!("registering templates from {}", path.display()))?;
        info!(count, path = %path.display(), "achievement templates loaded");
        Ok(count)
    }
}
