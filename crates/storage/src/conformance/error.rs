use std::future::Future;

use canteiro_core::ActivityStatus;

use super::{t0, TestResult};
use crate::{CanteiroStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_missing_activity_returns_not_found",
        get_missing_activity_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_for_update_missing_returns_not_found",
        get_for_update_missing_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_missing_activity_returns_not_found",
        update_missing_activity_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "not_found_error_carries_the_activity_id",
        not_found_error_carries_the_activity_id(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_unknown_work_returns_empty_not_error",
        list_unknown_work_returns_empty_not_error(factory).await,
    ));

    results
}

async fn get_missing_activity_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_activity(424242).await {
        Err(StorageError::ActivityNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected ActivityNotFound, got {other}")),
        Ok(rec) => Err(format!("expected ActivityNotFound, got row {:?}", rec.id)),
    }
}

async fn get_for_update_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_activity_for_update(&mut snap, 424242).await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::ActivityNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected ActivityNotFound, got {other}")),
        Ok(rec) => Err(format!("expected ActivityNotFound, got row {:?}", rec.id)),
    }
}

/// An update against a row that was never inserted is NotFound, not a
/// version conflict.
async fn update_missing_activity_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_activity_status(&mut snap, 424242, 0, ActivityStatus::PccConfirmed, t0())
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    match result {
        Err(StorageError::ActivityNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected ActivityNotFound, got {other}")),
        Ok(v) => Err(format!("expected ActivityNotFound, got version {v}")),
    }
}

async fn not_found_error_carries_the_activity_id<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_activity(77).await {
        Err(StorageError::ActivityNotFound { activity_id }) if activity_id == 77 => Ok(()),
        Err(StorageError::ActivityNotFound { activity_id }) => {
            Err(format!("expected activity_id 77 in error, got {activity_id}"))
        }
        Err(other) => Err(format!("expected ActivityNotFound, got {other}")),
        Ok(_) => Err("expected an error for a missing activity".to_string()),
    }
}

async fn list_unknown_work_returns_empty_not_error<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let activities = s.list_activities(999).await.map_err(|e| e.to_string())?;
    let pcc = s.list_pcc_events(999).await.map_err(|e| e.to_string())?;
    let fvs = s.list_fvs_events(999).await.map_err(|e| e.to_string())?;
    let ncs = s.list_nonconformities(999).await.map_err(|e| e.to_string())?;
    if !activities.is_empty() || !pcc.is_empty() || !fvs.is_empty() || !ncs.is_empty() {
        return Err("expected empty lists for an unknown work".to_string());
    }
    Ok(())
}
