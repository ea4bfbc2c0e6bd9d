use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use coursewise_events::{DomainEvent, EventType};

/// Score (percentage) that counts as perfect.
pub const PERFECT_SCORE: u32 = 100;

/// What a learner has to do to earn an achievement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCriteria {
    /// Complete N distinct courses.
    CoursesCompleted,
    /// Complete N distinct lessons.
    LessonsCompleted,
    /// Submit N distinct questionnaires.
    QuestionnairesCompleted,
    /// Score 100% on N distinct lessons, questionnaires or courses.
    PerfectScores,
    /// Log in on N consecutive (UTC) days.
    LoginStreak,
    /// Accumulate N minutes of study sessions.
    StudyMinutes,
    /// Earn N distinct certificates.
    CertificatesEarned,
    /// Fill in the user profile (target is always 1).
    ProfileCompleted,
}

/// What a single event contributes to one criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    /// Add `amount` once for the subject identified by `key`.
    Counted { key: String, amount: u64 },
    /// The learner was active on this day.
    ActiveDay(NaiveDate),
    /// One-off accomplishment.
    Flag,
}

impl Contribution {
    fn counted(key: String) -> Self {
        Contribution::Counted { key, amount: 1 }
    }
}

impl AchievementCriteria {
    pub const ALL: [AchievementCriteria; 8] = [
        AchievementCriteria::CoursesCompleted,
        AchievementCriteria::LessonsCompleted,
        AchievementCriteria::QuestionnairesCompleted,
        AchievementCriteria::PerfectScores,
        AchievementCriteria::LoginStreak,
        AchievementCriteria::StudyMinutes,
        AchievementCriteria::CertificatesEarned,
        AchievementCriteria::ProfileCompleted,
    ];

    /// Event types that may move progress for this criteria.
    pub fn event_types(self) -> &'static [EventType] {
        match self {
            AchievementCriteria::CoursesCompleted => &[EventType::CourseCompleted],
            AchievementCriteria::LessonsCompleted => &[EventType::LessonCompleted],
            AchievementCriteria::QuestionnairesCompleted => &[EventType::QuestionnaireCompleted],
            AchievementCriteria::PerfectScores => &[
                EventType::QuestionnaireCompleted,
                EventType::LessonCompleted,
                EventType::CourseCompleted,
            ],
            AchievementCriteria::LoginStreak => &[EventType::UserLogin],
            AchievementCriteria::StudyMinutes => &[EventType::StudySessionCompleted],
            AchievementCriteria::CertificatesEarned => &[EventType::CertificateEarned],
            AchievementCriteria::ProfileCompleted => &[EventType::ProfileCompleted],
        }
    }

    pub fn reacts_to(self, event_type: EventType) -> bool {
        self.event_types().contains(&event_type)
    }

    /// Translate an event into progress for this criteria.
    ///
    /// `None` means the event does not qualify (wrong type, or e.g. a score
    /// below [`PERFECT_SCORE`] for `PerfectScores`).
    pub fn contribution(self, event: &DomainEvent) -> Option<Contribution> {
        use AchievementCriteria as C;
        use DomainEvent as E;

        match self {
            C::CoursesCompleted => match event {
                E::CourseCompleted(e) => Some(Contribution::counted(format!("course:{}", e.course_id))),
                E::LessonCompleted(_)
                | E::QuestionnaireCompleted(_)
                | E::UserLogin(_)
                | E::StudySessionCompleted(_)
                | E::CertificateEarned(_)
                | E::ProfileCompleted(_)
                | E::CourseEnrolled(_) => None,
            },
            C::LessonsCompleted => match event {
                E::LessonCompleted(e) => Some(Contribution::counted(format!("lesson:{}", e.lesson_id))),
                E::CourseCompleted(_)
                | E::QuestionnaireCompleted(_)
                | E::UserLogin(_)
                | E::StudySessionCompleted(_)
                | E::CertificateEarned(_)
                | E::ProfileCompleted(_)
                | E::CourseEnrolled(_) => None,
            },
            C::QuestionnairesCompleted => match event {
                E::QuestionnaireCompleted(e) => Some(Contribution::counted(format!(
                    "questionnaire:{}",
                    e.questionnaire_id
                ))),
                E::CourseCompleted(_)
                | E::LessonCompleted(_)
                | E::UserLogin(_)
                | E::StudySessionCompleted(_)
                | E::CertificateEarned(_)
                | E::ProfileCompleted(_)
                | E::CourseEnrolled(_) => None,
            },
            C::PerfectScores => match event {
                E::QuestionnaireCompleted(e) => (e.score >= PERFECT_SCORE)
                    .then(|| Contribution::counted(format!("questionnaire:{}", e.questionnaire_id))),
                E::LessonCompleted(e) => e
                    .score
                    .is_some_and(|s| s >= PERFECT_SCORE)
                    .then(|| Contribution::counted(format!("lesson:{}", e.lesson_id))),
                E::CourseCompleted(e) => e
                    .final_score
                    .is_some_and(|s| s >= PERFECT_SCORE)
                    .then(|| Contribution::counted(format!("course:{}", e.course_id))),
                E::UserLogin(_)
                | E::StudySessionCompleted(_)
                | E::CertificateEarned(_)
                | E::ProfileCompleted(_)
                | E::CourseEnrolled(_) => None,
            },
            C::LoginStreak => match event {
                E::UserLogin(e) => Some(Contribution::ActiveDay(e.occurred_at.date_naive())),
                E::CourseCompleted(_)
                | E::LessonCompleted(_)
                | E::QuestionnaireCompleted(_)
                | E::StudySessionCompleted(_)
                | E::CertificateEarned(_)
                | E::ProfileCompleted(_)
                | E::CourseEnrolled(_) => None,
            },
            C::StudyMinutes => match event {
                E::StudySessionCompleted(e) => Some(Contribution::Counted {
                    key: format!("session:{}", e.session_id),
                    amount: u64::from(e.duration_minutes),
                }),
                E::CourseCompleted(_)
                | E::LessonCompleted(_)
                | E::QuestionnaireCompleted(_)
                | E::UserLogin(_)
                | E::CertificateEarned(_)
                | E::ProfileCompleted(_)
                | E::CourseEnrolled(_) => None,
            },
            C::CertificatesEarned => match event {
                E::CertificateEarned(e) => Some(Contribution::counted(format!(
                    "certificate:{}",
                    e.certificate_id
                ))),
                E::CourseCompleted(_)
                | E::LessonCompleted(_)
                | E::QuestionnaireCompleted(_)
                | E::UserLogin(_)
                | E::StudySessionCompleted(_)
                | E::ProfileCompleted(_)
                | E::CourseEnrolled(_) => None,
            },
            C::ProfileCompleted => match event {
                E::ProfileCompleted(_) => Some(Contribution::Flag),
                E::CourseCompleted(_)
                | E::LessonCompleted(_)
                | E::QuestionnaireCompleted(_)
                | E::UserLogin(_)
                | E::StudySessionCompleted(_)
                | E::CertificateEarned(_)
                | E::CourseEnrolled(_) => None,
            },
        }
    }
}
