//! `canteiro seed` -- provision the demo activities for a work.
//!
//! Idempotent per work: if the work already has activities, nothing is
//! written. Seeding is a CLI concern only; the HTTP API has no seeding
//! endpoint.

use time::OffsetDateTime;
use tracing::info;

use canteiro_core::ActivityStatus;
use canteiro_storage::{CanteiroStorage, NewActivity, SqliteStorage};

/// The demo dataset: one activity per workflow entry point, plus one with
/// no gate at all.
const DEMO_ACTIVITIES: [(&str, ActivityStatus, &str); 3] = [
    (
        "Instalar contramarco (PCC)",
        ActivityStatus::PccRequired,
        "Encarregado João Silva",
    ),
    (
        "Aplicar manta acústica (Execução)",
        ActivityStatus::Ready,
        "Mestre Carlos Souza",
    ),
    (
        "FVS - Porta corta-fogo (Inspeção)",
        ActivityStatus::InspectionPending,
        "Inspetora Ana Lima",
    ),
];

pub(crate) async fn run_seed(
    database_url: &str,
    work_id: i64,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let storage = SqliteStorage::connect(database_url).await?;

    let existing = storage.list_activities(work_id).await?;
    if !existing.is_empty() {
        if !quiet {
            println!(
                "Seed skipped: work {} already has {} activities.",
                work_id,
                existing.len()
            );
        }
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let mut snap = storage.begin_snapshot().await?;
    for (name, status, responsible) in DEMO_ACTIVITIES {
        let activity = storage
            .insert_activity(
                &mut snap,
                NewActivity {
                    work_id,
                    name: name.to_string(),
                    status,
                    responsible_user: Some(responsible.to_string()),
                    created_at: now,
                },
            )
            .await?;
        info!(activity_id = activity.id, status = %activity.status, "seeded activity");
    }
    storage.commit_snapshot(snap).await?;

    if !quiet {
        println!(
            "Seeded work {} with {} demo activities.",
            work_id,
            DEMO_ACTIVITIES.len()
        );
    }
    Ok(())
}
