//! Achievement domain module.
//!
//! This crate contains the gamification rules (templates, criteria, the
//! per-learner progress state machine), implemented purely as deterministic
//! domain logic (no IO, no storage, no async).

pub mod criteria;
pub mod progress;
pub mod template;

pub use criteria::{AchievementCriteria, Contribution, PERFECT_SCORE};
pub use progress::{ProgressChange, UserAchievement, evaluate};
pub use template::AchievementTemplate;
