use std::future::Future;

use canteiro_core::{ActivityStatus, InspectionResult};

use super::{make_activity, make_fvs_event, make_nonconformity, make_pcc_event, t0, TestResult};
use crate::{CanteiroStorage, StorageError};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "insert_not_visible_before_commit",
        insert_not_visible_before_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "insert_not_visible_after_abort",
        insert_not_visible_after_abort(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "status_update_not_visible_before_commit",
        status_update_not_visible_before_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "dropped_snapshot_rolls_back",
        dropped_snapshot_rolls_back(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "abort_discards_event_and_nc_inserts",
        abort_discards_event_and_nc_inserts(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "commit_after_aborted_snapshot_starts_clean",
        commit_after_aborted_snapshot_starts_clean(factory).await,
    ));

    results
}

/// An uncommitted insert must be invisible to pool-side reads.
async fn insert_not_visible_before_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(1, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;

    let before = s.get_activity(activity.id).await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match before {
        Err(StorageError::ActivityNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected ActivityNotFound, got {other}")),
        Ok(_) => Err("uncommitted insert was visible outside the snapshot".to_string()),
    }
}

async fn insert_not_visible_after_abort<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(1, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    match s.get_activity(activity.id).await {
        Err(StorageError::ActivityNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected ActivityNotFound, got {other}")),
        Ok(_) => Err("aborted insert survived the rollback".to_string()),
    }
}

/// A status update inside an open snapshot must not leak to readers.
async fn status_update_not_visible_before_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(1, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::PccConfirmed, t0())
        .await
        .map_err(|e| e.to_string())?;

    let outside = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if outside.status != ActivityStatus::PccRequired {
        return Err(format!(
            "uncommitted status update leaked: saw {}",
            outside.status
        ));
    }
    if outside.version != 0 {
        return Err(format!(
            "uncommitted version bump leaked: saw {}",
            outside.version
        ));
    }
    Ok(())
}

/// Dropping a snapshot without commit must roll back, per the trait contract.
async fn dropped_snapshot_rolls_back<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(1, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    drop(snap);

    match s.get_activity(activity.id).await {
        Err(StorageError::ActivityNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected ActivityNotFound, got {other}")),
        Ok(_) => Err("dropped snapshot did not roll back".to_string()),
    }
}

/// Abort must discard every write in the snapshot: FVS event, NC, status.
async fn abort_discards_event_and_nc_inserts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(
            &mut snap,
            make_activity(4, "FVS porta corta-fogo", ActivityStatus::InspectionPending),
        )
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let fvs = s
        .insert_fvs_event(&mut snap, make_fvs_event(&activity, InspectionResult::Fail, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_nonconformity(&mut snap, make_nonconformity(&activity, fvs.id, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::InspectedFail, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s.list_fvs_events(4).await.map_err(|e| e.to_string())?;
    let ncs = s.list_nonconformities(4).await.map_err(|e| e.to_string())?;
    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!("expected 0 FVS events after abort, got {}", events.len()));
    }
    if !ncs.is_empty() {
        return Err(format!("expected 0 NCs after abort, got {}", ncs.len()));
    }
    if read.status != ActivityStatus::InspectionPending || read.version != 0 {
        return Err(format!(
            "activity changed despite abort: {} v{}",
            read.status, read.version
        ));
    }
    Ok(())
}

/// Work done after an abort must commit normally and see none of the
/// aborted writes.
async fn commit_after_aborted_snapshot_starts_clean<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(1, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_pcc_event(&mut snap, make_pcc_event(&activity, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_pcc_event(&mut snap, make_pcc_event(&activity, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s.list_pcc_events(1).await.map_err(|e| e.to_string())?;
    if events.len() != 1 {
        return Err(format!(
            "expected exactly the committed event, got {}",
            events.len()
        ));
    }
    Ok(())
}
