//! Replays newline-delimited JSON learning events through the pipeline and
//! prints the resulting achievements of every learner involved.
//!
//! ```text
//! COURSEWISE_TEMPLATES_PATH=templates.json coursewise < events.jsonl
//! ```

use std::collections::BTreeSet;

use anyhow::Context;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use coursewise_core::{InstitutionId, UserId};
use coursewise_events::{DomainEvent, EventBus, EventEnvelope};
use coursewise_infra::services::AchievementView;
use coursewise_infra::{AppConfig, Application};

#[derive(Debug, Serialize)]
struct LearnerAchievements {
    institution_id: InstitutionId,
    user_id: UserId,
    achievements: Vec<AchievementView>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("loading configuration")?;
    coursewise_observability::init(config.log_format);

    let app = Application::bootstrap(config);
    app.load_configured_templates().await?;

    let mut learners = BTreeSet::new();
    let mut published = 0usize;
    let mut skipped = 0usize;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let event: DomainEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                skipped += 1;
                tracing::warn!(line = line_no, error = %e, "skipping malformed event");
                continue;
            }
        };

        learners.insert((event.institution_id(), event.user_id()));
        let report = app.bus.publish(EventEnvelope::new(event)).await;
        if !report.is_clean() {
            tracing::warn!(
                event_id = %report.event_id,
                failures = report.failures.len(),
                "event handled with subscriber failures"
            );
        }
        published += 1;
    }

    let mut output = Vec::with_capacity(learners.len());
    for (institution_id, user_id) in learners {
        output.push(LearnerAchievements {
            institution_id,
            user_id,
            achievements: app.achievements.for_user(institution_id, user_id).await?,
        });
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    tracing::info!(published, skipped, "replay finished");
    Ok(())
}
