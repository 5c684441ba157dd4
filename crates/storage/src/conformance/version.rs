use std::future::Future;

use canteiro_core::ActivityStatus;

use super::{make_activity, t0, TestResult};
use crate::{CanteiroStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "update_with_correct_version_returns_incremented",
        update_with_correct_version_returns_incremented(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "version_increments_sequentially",
        version_increments_sequentially(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "for_update_returns_current_version",
        for_update_returns_current_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_with_stale_version_returns_conflict",
        update_with_stale_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_error_carries_id_and_expected_version",
        conflict_error_carries_id_and_expected_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_changes_nothing",
        conflict_changes_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "two_readers_race_one_wins",
        two_readers_race_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "version_survives_abort",
        version_survives_abort(factory).await,
    ));

    results
}

/// Seed one committed activity and return it.
async fn seed_activity<S: CanteiroStorage>(
    s: &S,
    work_id: i64,
    status: ActivityStatus,
) -> Result<crate::ActivityRecord, String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(work_id, "A", status))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    Ok(activity)
}

async fn update_with_correct_version_returns_incremented<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let new_version = s
        .update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if new_version != 1 {
        return Err(format!("expected new version 1, got {new_version}"));
    }
    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    if read.version != 1 {
        return Err(format!("expected stored version 1, got {}", read.version));
    }
    Ok(())
}

async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    let steps = [
        ActivityStatus::PccConfirmed,
        ActivityStatus::InspectionPending,
        ActivityStatus::InspectedPass,
    ];
    for (i, status) in steps.into_iter().enumerate() {
        let expected = i as i64;
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        let new_version = s
            .update_activity_status(&mut snap, activity.id, expected, status, t0())
            .await
            .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
        if new_version != expected + 1 {
            return Err(format!(
                "step {i}: expected version {}, got {new_version}",
                expected + 1
            ));
        }
    }
    Ok(())
}

async fn for_update_returns_current_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let read = s
        .get_activity_for_update(&mut snap, activity.id)
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if read.version != 1 {
        return Err(format!("expected version 1 for update, got {}", read.version));
    }
    Ok(())
}

async fn update_with_stale_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    // Version is now 1; an update claiming 0 must conflict.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_activity_status(&mut snap, activity.id, 0, ActivityStatus::Ready, t0())
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::VersionConflict { .. }) => Ok(()),
        Err(other) => Err(format!("expected VersionConflict, got {other}")),
        Ok(v) => Err(format!("expected VersionConflict, got version {v}")),
    }
}

async fn conflict_error_carries_id_and_expected_version<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_activity_status(&mut snap, activity.id, 0, ActivityStatus::Ready, t0())
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match result {
        Err(StorageError::VersionConflict {
            activity_id,
            expected_version,
        }) => {
            if activity_id != activity.id {
                return Err(format!(
                    "conflict names activity {activity_id}, expected {}",
                    activity.id
                ));
            }
            if expected_version != 0 {
                return Err(format!("conflict names version {expected_version}, expected 0"));
            }
            Ok(())
        }
        Err(other) => Err(format!("expected VersionConflict, got {other}")),
        Ok(_) => Err("expected VersionConflict".to_string()),
    }
}

/// A conflicting update must leave status and version untouched.
async fn conflict_changes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let _ = s
        .update_activity_status(&mut snap, activity.id, 0, ActivityStatus::Ready, t0())
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    if read.status != ActivityStatus::PccConfirmed {
        return Err(format!("status changed on conflict: {}", read.status));
    }
    if read.version != 1 {
        return Err(format!("version changed on conflict: {}", read.version));
    }
    Ok(())
}

/// Deterministic replay of the read-modify-write race: both requests read
/// version 0; the first commit wins, the second gets a conflict.
async fn two_readers_race_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    // Both sides read the same version before either writes.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let seen = s
        .get_activity_for_update(&mut snap, activity.id)
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    // First writer commits.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_activity_status(
        &mut snap,
        activity.id,
        seen.version,
        ActivityStatus::PccConfirmed,
        t0(),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    // Second writer still holds the stale version.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let second = s
        .update_activity_status(
            &mut snap,
            activity.id,
            seen.version,
            ActivityStatus::PccConfirmed,
            t0(),
        )
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match second {
        Err(StorageError::VersionConflict { .. }) => {}
        Err(other) => return Err(format!("expected VersionConflict, got {other}")),
        Ok(_) => return Err("both racers won; lost update not detected".to_string()),
    }

    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    if read.status != ActivityStatus::PccConfirmed || read.version != 1 {
        return Err(format!(
            "winner's write corrupted: {} v{}",
            read.status, read.version
        ));
    }
    Ok(())
}

async fn version_survives_abort<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activity = seed_activity(&s, 1, ActivityStatus::PccRequired).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    // The aborted bump must not consume version 0.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let new_version = s
        .update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if new_version != 1 {
        return Err(format!("expected version 1 after abort+retry, got {new_version}"));
    }
    Ok(())
}
