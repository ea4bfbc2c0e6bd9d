//! Integration tests for the full learning-activity pipeline.
//!
//! Tests: Service → EventBus → Subscribers → Repositories → Query service
//!
//! Verifies:
//! - Achievements unlock exactly at their target
//! - Institution isolation is preserved
//! - Failing or panicking subscribers never affect the others
//! - Unsubscribed subscribers stop receiving events

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use coursewise_achievements::{AchievementCriteria, AchievementTemplate};
    use coursewise_core::{
        AchievementId, CertificateId, CourseId, InstitutionId, LessonId, UserId,
    };
    use coursewise_events::{
        EventBus, EventEnvelope, EventSubscriber, EventType, HandlerError, LessonCompleted,
    };

    use crate::bootstrap::Application;
    use crate::config::AppConfig;
    use crate::feed::FeedKind;
    use crate::repositories::{FeedRepository, ProgressQuery};
    use crate::services::{LearnerContext, LessonCompletion};
    use crate::subscribers::achievement_progress;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap()
    }

    fn setup() -> Application {
        Application::bootstrap(AppConfig::default())
    }

    async fn register(
        app: &Application,
        institution_id: InstitutionId,
        criteria: AchievementCriteria,
        target: u64,
    ) -> AchievementId {
        let template =
            AchievementTemplate::new(institution_id, format!("{criteria:?} x{target}"), criteria, target)
                .unwrap();
        app.catalog.register(template).await.unwrap()
    }

    #[tokio::test]
    async fn course_completions_unlock_exactly_at_target() {
        let app = setup();
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        let id = register(&app, institution_id, AchievementCriteria::CoursesCompleted, 3).await;
        let ctx = LearnerContext::at(institution_id, user_id, test_time());

        for _ in 0..2 {
            app.learning.complete_course(ctx, CourseId::new(), None).await;
        }
        let views = app.achievements.for_user(institution_id, user_id).await.unwrap();
        assert_eq!(views[0].achievement_id, id);
        assert_eq!(views[0].progress, 2);
        assert!(!views[0].unlocked);

        app.learning.complete_course(ctx, CourseId::new(), None).await;
        let unlocked = app
            .achievements
            .unlocked_for_user(institution_id, user_id)
            .await
            .unwrap();
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].unlocked_at, Some(test_time()));
    }

    #[tokio::test]
    async fn lesson_without_templates_changes_nothing() {
        let app = setup();
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();

        let report = app
            .bus
            .publish(EventEnvelope::new(LessonCompleted {
                institution_id,
                user_id,
                lesson_id: LessonId::new(),
                module_id: None,
                course_id: None,
                completion_time_secs: 420,
                score: Some(90),
                occurred_at: test_time(),
            }))
            .await;

        assert_eq!(report.invoked, 1);
        assert!(report.is_clean());
        assert!(
            app.progress
                .list_by_user(institution_id, user_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    struct PanicsOnLogin;

    #[async_trait]
    impl EventSubscriber for PanicsOnLogin {
        fn subscribed_event_types(&self) -> &[EventType] {
            &[EventType::UserLogin]
        }

        fn subscriber_id(&self) -> Option<&str> {
            Some("panics-on-login")
        }

        async fn handle(&self, _event: &EventEnvelope) -> Result<(), HandlerError> {
            panic!("login handler exploded")
        }
    }

    #[derive(Default)]
    struct LoginCounter {
        count: AtomicUsize,
    }

    #[async_trait]
    impl EventSubscriber for LoginCounter {
        fn subscribed_event_types(&self) -> &[EventType] {
            &[EventType::UserLogin]
        }

        async fn handle(&self, _event: &EventEnvelope) -> Result<(), HandlerError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn panicking_login_subscriber_does_not_stop_the_others() {
        let app = setup();
        let counter = Arc::new(LoginCounter::default());
        app.bus.subscribe(Arc::new(PanicsOnLogin));
        app.bus.subscribe(counter.clone());

        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        register(&app, institution_id, AchievementCriteria::LoginStreak, 5).await;

        app.learning
            .record_login(LearnerContext::at(institution_id, user_id, test_time()))
            .await;

        assert_eq!(counter.count.load(Ordering::SeqCst), 1);
        let views = app.achievements.for_user(institution_id, user_id).await.unwrap();
        assert_eq!(views[0].progress, 1);
    }

    #[tokio::test]
    async fn login_streak_survives_gaps_without_losing_progress() {
        let app = setup();
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        register(&app, institution_id, AchievementCriteria::LoginStreak, 3).await;

        let login = |days: i64| {
            LearnerContext::at(institution_id, user_id, test_time() + Duration::days(days))
        };
        for day in [0, 1, 4] {
            app.learning.record_login(login(day)).await;
        }
        let views = app.achievements.for_user(institution_id, user_id).await.unwrap();
        assert_eq!(views[0].progress, 2);

        for day in [5, 6] {
            app.learning.record_login(login(day)).await;
        }
        let views = app.achievements.for_user(institution_id, user_id).await.unwrap();
        assert!(views[0].unlocked);
    }

    #[tokio::test]
    async fn templates_of_other_institutions_never_apply() {
        let app = setup();
        let home = InstitutionId::new();
        let elsewhere = InstitutionId::new();
        let user_id = UserId::new();
        register(&app, home, AchievementCriteria::CoursesCompleted, 1).await;

        app.learning
            .complete_course(LearnerContext::now(elsewhere, user_id), CourseId::new(), None)
            .await;

        assert!(app.progress.list_by_user(home, user_id).await.unwrap().is_empty());
        assert!(app.progress.list_by_user(elsewhere, user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribed_achievement_tracking_stops() {
        let app = setup();
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        register(&app, institution_id, AchievementCriteria::CoursesCompleted, 1).await;

        let tracker = app
            .bus
            .subscribers(EventType::CourseCompleted)
            .into_iter()
            .find(|s| s.subscriber_id() == Some(achievement_progress::SUBSCRIBER_ID))
            .unwrap();
        assert!(app.bus.unsubscribe(tracker.as_ref()));

        app.learning
            .complete_course(LearnerContext::now(institution_id, user_id), CourseId::new(), None)
            .await;
        assert!(
            app.progress
                .list_by_user(institution_id, user_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn feed_and_achievements_are_fed_by_the_same_events() {
        let app = setup();
        let institution_id = InstitutionId::new();
        let user_id = UserId::new();
        register(&app, institution_id, AchievementCriteria::CertificatesEarned, 1).await;
        register(&app, institution_id, AchievementCriteria::PerfectScores, 2).await;

        let course_id = CourseId::new();
        let start = LearnerContext::at(institution_id, user_id, test_time());
        let later = LearnerContext::at(institution_id, user_id, test_time() + Duration::days(20));

        app.learning.enroll(start, course_id).await;
        app.learning
            .complete_lesson(
                start,
                LessonCompletion {
                    lesson_id: LessonId::new(),
                    module_id: None,
                    course_id: Some(course_id),
                    completion_time_secs: 600,
                    score: Some(100),
                },
            )
            .await;
        app.learning
            .award_certificate(later, CertificateId::new(), course_id)
            .await;

        let feed = app.feed.recent(institution_id, 10).await.unwrap();
        let kinds: Vec<FeedKind> = feed.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![FeedKind::CertificateEarned, FeedKind::CourseEnrolled]);

        let mut views = app.achievements.for_user(institution_id, user_id).await.unwrap();
        views.sort_by_key(|v| v.target_value);
        assert!(views[0].unlocked);
        assert_eq!(views[1].progress, 1);
        assert_eq!(views[1].percent, 50);
    }

    #[tokio::test]
    async fn templates_file_is_loaded_through_the_catalog() {
        let institution_id = InstitutionId::new();
        let path = std::env::temp_dir().join(format!("coursewise-templates-{}.json", uuid::Uuid::now_v7()));
        let file = serde_json::json!([
            {
                "id": AchievementId::new(),
                "institution_id": institution_id,
                "name": "Profile pro",
                "criteria": "profile_completed",
                "target_value": 1,
                "points": 15
            },
            {
                "id": AchievementId::new(),
                "institution_id": institution_id,
                "name": "Bookworm",
                "criteria": "lessons_completed",
                "target_value": 10
            }
        ]);
        std::fs::write(&path, file.to_string()).unwrap();

        let app = Application::bootstrap(AppConfig {
            templates_path: Some(path.clone()),
            ..AppConfig::default()
        });
        let loaded = app.load_configured_templates().await;
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.unwrap(), 2);

        let user_id = UserId::new();
        app.learning
            .complete_profile(LearnerContext::now(institution_id, user_id))
            .await;
        assert_eq!(
            app.achievements
                .points_for_user(institution_id, user_id)
                .await
                .unwrap(),
            15
        );
    }
}
