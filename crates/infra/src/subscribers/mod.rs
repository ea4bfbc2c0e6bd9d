//! Concrete bus subscribers registered at bootstrap.

pub mod achievement_progress;
pub mod activity_feed;

pub use achievement_progress::{AchievementProgressSubscriber, EvaluationSummary};
pub use activity_feed::ActivityFeedSubscriber;
