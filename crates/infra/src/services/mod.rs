//! Use-case layer on top of the bus and the repositories.

pub mod achievements;
pub mod catalog;
pub mod learning;

pub use achievements::{AchievementQueryService, AchievementView};
pub use catalog::{AchievementCatalogService, CatalogError};
pub use learning::{LearnerContext, LearningActivityService, LessonCompletion};
