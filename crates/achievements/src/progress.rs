//! Per-learner achievement progress.
//!
//! State machine per (user, template):
//!
//! ```text
//! LOCKED(p) -> LOCKED(p') -> ... -> UNLOCKED
//! ```
//!
//! Progress only ever grows and `UNLOCKED` is terminal.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use coursewise_core::{AchievementId, DomainError, DomainResult, InstitutionId, UserId};
use coursewise_events::DomainEvent;

use crate::criteria::Contribution;
use crate::template::AchievementTemplate;

/// Progress of one learner towards one achievement template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAchievement {
    institution_id: InstitutionId,
    user_id: UserId,
    achievement_id: AchievementId,

    progress: u64,
    unlocked_at: Option<DateTime<Utc>>,

    /// Subjects already counted (course, lesson, session... ids).
    counted: BTreeSet<String>,
    current_streak: u64,
    last_active_day: Option<NaiveDate>,

    updated_at: Option<DateTime<Utc>>,
}

/// Result of feeding one event into a [`UserAchievement`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProgressChange {
    /// Nothing changed; no need to persist.
    Unchanged,
    /// Bookkeeping changed (e.g. streak day) but progress did not.
    Tracked,
    Advanced { from: u64, to: u64 },
    Unlocked { from: u64, to: u64 },
}

impl ProgressChange {
    /// Whether the record must be persisted.
    pub fn is_dirty(self) -> bool {
        !matches!(self, ProgressChange::Unchanged)
    }
}

impl UserAchievement {
    /// A fresh, locked record with zero progress.
    pub fn locked(
        institution_id: InstitutionId,
        user_id: UserId,
        achievement_id: AchievementId,
    ) -> Self {
        Self {
            institution_id,
            user_id,
            achievement_id,
            progress: 0,
            unlocked_at: None,
            counted: BTreeSet::new(),
            current_streak: 0,
            last_active_day: None,
            updated_at: None,
        }
    }

    pub fn institution_id(&self) -> InstitutionId {
        self.institution_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn achievement_id(&self) -> AchievementId {
        self.achievement_id
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }

    pub fn unlocked_at(&self) -> Option<DateTime<Utc>> {
        self.unlocked_at
    }

    pub fn current_streak(&self) -> u64 {
        self.current_streak
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Progress as a percentage of `target`, capped at 100.
    pub fn percent_of(&self, target: u64) -> u8 {
        if target == 0 || self.progress >= target {
            return 100;
        }
        // progress < target, so the quotient is < 100.
        (u128::from(self.progress) * 100 / u128::from(target)) as u8
    }

    /// Apply a contribution for `template`, unlocking once the target is met.
    pub fn record(
        &mut self,
        template: &AchievementTemplate,
        contribution: Contribution,
        at: DateTime<Utc>,
    ) -> DomainResult<ProgressChange> {
        self.ensure_template(template)?;

        if self.is_unlocked() {
            return Ok(ProgressChange::Unchanged);
        }

        let from = self.progress;
        let candidate = match contribution {
            Contribution::Counted { key, amount } => {
                if !self.counted.insert(key) {
                    return Ok(ProgressChange::Unchanged);
                }
                from.saturating_add(amount)
            }
            Contribution::ActiveDay(day) => match self.track_active_day(day) {
                Some(streak) => from.max(streak),
                None => return Ok(ProgressChange::Unchanged),
            },
            Contribution::Flag => {
                if from >= 1 {
                    return Ok(ProgressChange::Unchanged);
                }
                1
            }
        };

        self.progress = candidate;
        self.updated_at = Some(at);

        if candidate >= template.target_value {
            self.unlocked_at = Some(at);
            Ok(ProgressChange::Unlocked {
                from,
                to: candidate,
            })
        } else if candidate > from {
            Ok(ProgressChange::Advanced {
                from,
                to: candidate,
            })
        } else {
            Ok(ProgressChange::Tracked)
        }
    }

    /// Returns the new current streak, or `None` if the day adds nothing
    /// (same day again, or older than the last recorded activity).
    fn track_active_day(&mut self, day: NaiveDate) -> Option<u64> {
        let streak = match self.last_active_day {
            None => 1,
            Some(last) if day <= last => return None,
            Some(last) if last.succ_opt() == Some(day) => self.current_streak + 1,
            Some(_) => 1,
        };
        self.last_active_day = Some(day);
        self.current_streak = streak;
        Some(streak)
    }

    fn ensure_template(&self, template: &AchievementTemplate) -> DomainResult<()> {
        if template.id != self.achievement_id {
            return Err(DomainError::invariant("achievement_id mismatch"));
        }
        if template.institution_id != self.institution_id {
            return Err(DomainError::invariant("institution mismatch"));
        }
        Ok(())
    }
}

/// Feed one event into a learner's record for `template`.
///
/// Events from another institution or another learner are rejected; events
/// that do not qualify for the template's criteria leave the record untouched.
pub fn evaluate(
    template: &AchievementTemplate,
    record: &mut UserAchievement,
    event: &DomainEvent,
) -> DomainResult<ProgressChange> {
    if event.institution_id() != template.institution_id {
        return Err(DomainError::invariant(
            "event institution does not match template institution",
        ));
    }
    if event.user_id() != record.user_id {
        return Err(DomainError::invariant("event user does not match record user"));
    }
    if !template.active {
        return Ok(ProgressChange::Unchanged);
    }

    match template.criteria.contribution(event) {
        Some(contribution) => record.record(template, contribution, event.occurred_at()),
        None => Ok(ProgressChange::Unchanged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::AchievementCriteria;
    use chrono::{Duration, TimeZone};
    use coursewise_core::{CourseId, StudySessionId};
    use coursewise_events::{CourseCompleted, StudySessionCompleted, UserLogin};
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap()
    }

    fn template(
        institution_id: InstitutionId,
        criteria: AchievementCriteria,
        target: u64,
    ) -> AchievementTemplate {
        AchievementTemplate::new(institution_id, "test badge", criteria, target).unwrap()
    }

    fn course_completed(
        institution_id: InstitutionId,
        user_id: UserId,
        course_id: CourseId,
    ) -> DomainEvent {
        CourseCompleted {
            institution_id,
            user_id,
            course_id,
            final_score: None,
            occurred_at: test_time(),
        }
        .into()
    }

    fn login(institution_id: InstitutionId, user_id: UserId, at: DateTime<Utc>) -> DomainEvent {
        UserLogin {
            institution_id,
            user_id,
            occurred_at: at,
        }
        .into()
    }

    #[test]
    fn unlocks_exactly_at_target() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::CoursesCompleted, 3);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);

        for expected in 1..3u64 {
            let change =
                evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new()))
                    .unwrap();
            assert_eq!(
                change,
                ProgressChange::Advanced {
                    from: expected - 1,
                    to: expected
                }
            );
            assert!(!record.is_unlocked());
        }

        let change =
            evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new()))
                .unwrap();
        assert_eq!(change, ProgressChange::Unlocked { from: 2, to: 3 });
        assert!(record.is_unlocked());
        assert_eq!(record.unlocked_at(), Some(test_time()));
        assert_eq!(record.percent_of(t.target_value), 100);
    }

    #[test]
    fn same_course_counts_once() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::CoursesCompleted, 2);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);
        let event = course_completed(institution_id, user_id, CourseId::new());

        assert!(evaluate(&t, &mut record, &event).unwrap().is_dirty());
        assert_eq!(
            evaluate(&t, &mut record, &event).unwrap(),
            ProgressChange::Unchanged
        );
        assert_eq!(record.progress(), 1);
    }

    #[test]
    fn unlocked_is_terminal() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::CoursesCompleted, 1);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);

        evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new()))
            .unwrap();
        let snapshot = record.clone();

        let change =
            evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new()))
                .unwrap();
        assert_eq!(change, ProgressChange::Unchanged);
        assert_eq!(record, snapshot);
    }

    #[test]
    fn login_streak_tracks_consecutive_days() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::LoginStreak, 3);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);
        let day0 = test_time();

        evaluate(&t, &mut record, &login(institution_id, user_id, day0)).unwrap();
        // Second login on the same day is a no-op.
        assert_eq!(
            evaluate(&t, &mut record, &login(institution_id, user_id, day0 + Duration::hours(5)))
                .unwrap(),
            ProgressChange::Unchanged
        );
        evaluate(&t, &mut record, &login(institution_id, user_id, day0 + Duration::days(1)))
            .unwrap();
        assert_eq!(record.progress(), 2);

        // Gap: streak restarts, best run is kept.
        let change =
            evaluate(&t, &mut record, &login(institution_id, user_id, day0 + Duration::days(5)))
                .unwrap();
        assert_eq!(change, ProgressChange::Tracked);
        assert_eq!(record.current_streak(), 1);
        assert_eq!(record.progress(), 2);

        evaluate(&t, &mut record, &login(institution_id, user_id, day0 + Duration::days(6)))
            .unwrap();
        let change =
            evaluate(&t, &mut record, &login(institution_id, user_id, day0 + Duration::days(7)))
                .unwrap();
        assert_eq!(change, ProgressChange::Unlocked { from: 2, to: 3 });
    }

    #[test]
    fn late_login_is_ignored() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::LoginStreak, 5);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);

        evaluate(&t, &mut record, &login(institution_id, user_id, test_time())).unwrap();
        let change = evaluate(
            &t,
            &mut record,
            &login(institution_id, user_id, test_time() - Duration::days(1)),
        )
        .unwrap();
        assert_eq!(change, ProgressChange::Unchanged);
    }

    #[test]
    fn study_minutes_accumulate_per_session() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::StudyMinutes, 60);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);

        for minutes in [25, 20] {
            let event: DomainEvent = StudySessionCompleted {
                institution_id,
                user_id,
                session_id: StudySessionId::new(),
                duration_minutes: minutes,
                course_id: None,
                occurred_at: test_time(),
            }
            .into();
            evaluate(&t, &mut record, &event).unwrap();
        }

        assert_eq!(record.progress(), 45);
        assert_eq!(record.percent_of(t.target_value), 75);
        assert!(!record.is_unlocked());
    }

    #[test]
    fn foreign_institution_is_rejected() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::CoursesCompleted, 1);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);

        let err = evaluate(
            &t,
            &mut record,
            &course_completed(InstitutionId::new(), user_id, CourseId::new()),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(record.progress(), 0);
    }

    #[test]
    fn record_for_other_template_is_rejected() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::CoursesCompleted, 1);
        let mut record = UserAchievement::locked(institution_id, user_id, AchievementId::new());

        assert!(
            evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new()))
                .is_err()
        );
    }

    #[test]
    fn non_qualifying_event_is_unchanged() {
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let t = template(institution_id, AchievementCriteria::LessonsCompleted, 1);
        let mut record = UserAchievement::locked(institution_id, user_id, t.id);

        let change =
            evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new()))
                .unwrap();
        assert_eq!(change, ProgressChange::Unchanged);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Course(u8),
        Login(u8),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (0u8..8).prop_map(Step::Course),
            (0u8..20).prop_map(Step::Login),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any event sequence, progress never decreases and an
        /// unlocked achievement stays unlocked.
        #[test]
        fn progress_is_monotonic_and_unlock_is_sticky(
            steps in prop::collection::vec(step(), 1..60),
            course_target in 1u64..6,
            streak_target in 1u64..6,
        ) {
            let institution_id = InstitutionId::new();
            let user_id = UserId::new();
            let courses: Vec<CourseId> = (0..8).map(|_| CourseId::new()).collect();

            let course_badge = template(institution_id, AchievementCriteria::CoursesCompleted, course_target);
            let streak_badge = template(institution_id, AchievementCriteria::LoginStreak, streak_target);
            let mut course_record = UserAchievement::locked(institution_id, user_id, course_badge.id);
            let mut streak_record = UserAchievement::locked(institution_id, user_id, streak_badge.id);

            for s in steps {
                let event = match s {
                    Step::Course(i) => course_completed(institution_id, user_id, courses[usize::from(i)]),
                    Step::Login(d) => login(institution_id, user_id, test_time() + Duration::days(i64::from(d))),
                };

                for (t, record) in [(&course_badge, &mut course_record), (&streak_badge, &mut streak_record)] {
                    let before = record.clone();
                    evaluate(t, record, &event).unwrap();

                    prop_assert!(record.progress() >= before.progress());
                    if before.is_unlocked() {
                        prop_assert!(record.is_unlocked());
                        prop_assert_eq!(record.unlocked_at(), before.unlocked_at());
                    }
                    prop_assert_eq!(record.is_unlocked(), record.progress() >= t.target_value);
                }
            }
        }

        /// Property: N distinct completions unlock a target-N badge, N-1 do not.
        #[test]
        fn unlock_threshold_is_exact(target in 1u64..20) {
            let institution_id = InstitutionId::new();
            let user_id = UserId::new();
            let t = template(institution_id, AchievementCriteria::CoursesCompleted, target);
            let mut record = UserAchievement::locked(institution_id, user_id, t.id);

            for _ in 0..target - 1 {
                evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new())).unwrap();
            }
            prop_assert!(!record.is_unlocked());

            evaluate(&t, &mut record, &course_completed(institution_id, user_id, CourseId::new())).unwrap();
            prop_assert!(record.is_unlocked());
        }
    }
}
