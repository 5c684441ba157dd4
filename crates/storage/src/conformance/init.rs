use std::future::Future;

use canteiro_core::ActivityStatus;

use super::{make_activity, TestResult};
use crate::CanteiroStorage;

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_starts_at_version_0",
        insert_starts_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_preserves_fields",
        insert_preserves_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_assigns_distinct_ids",
        insert_assigns_distinct_ids(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "inserted_activity_readable_via_get_activity",
        inserted_activity_readable_via_get_activity(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "inserted_activity_readable_for_update_in_same_snapshot",
        inserted_activity_readable_for_update_in_same_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_visible_in_list_after_commit",
        insert_visible_in_list_after_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "lists_scoped_to_the_addressed_work",
        lists_scoped_to_the_addressed_work(factory).await,
    ));

    results
}

/// A freshly inserted activity must be at version 0.
async fn insert_starts_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(1, "Contramarco", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if activity.version != 0 {
        return Err(format!("expected version 0, got {}", activity.version));
    }
    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    if read.version != 0 {
        return Err(format!("expected stored version 0, got {}", read.version));
    }
    Ok(())
}

/// The returned record and the stored row must both carry the input fields.
async fn insert_preserves_fields<S, F, Fut>(factory: &F) -> Result<(), String>
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
            make_activity(3, "Manta acústica", ActivityStatus::Ready),
        )
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    if read.work_id != 3 {
        return Err(format!("expected work_id 3, got {}", read.work_id));
    }
    if read.name != "Manta acústica" {
        return Err(format!("expected name preserved, got {:?}", read.name));
    }
    if read.status != ActivityStatus::Ready {
        return Err(format!("expected READY, got {}", read.status));
    }
    if read.responsible_user.is_none() {
        return Err("expected responsible_user preserved".to_string());
    }
    if read.updated_at != read.created_at {
        return Err("expected updated_at to start equal to created_at".to_string());
    }
    Ok(())
}

/// Two inserts must produce two different ids.
async fn insert_assigns_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let a = s
        .insert_activity(&mut snap, make_activity(1, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .insert_activity(&mut snap, make_activity(1, "B", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if a.id == b.id {
        return Err(format!("expected distinct ids, both were {}", a.id));
    }
    Ok(())
}

/// get_activity must return the committed row.
async fn inserted_activity_readable_via_get_activity<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    if read.id != activity.id {
        return Err(format!("expected id {}, got {}", activity.id, read.id));
    }
    Ok(())
}

/// Within one snapshot, an insert must be readable for update before commit.
async fn inserted_activity_readable_for_update_in_same_snapshot<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
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
    let read = s
        .get_activity_for_update(&mut snap, activity.id)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if read.id != activity.id || read.version != 0 {
        return Err(format!(
            "expected id {} at version 0, got id {} at version {}",
            activity.id, read.id, read.version
        ));
    }
    Ok(())
}

/// list_activities must include the committed row.
async fn insert_visible_in_list_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(9, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let listed = s.list_activities(9).await.map_err(|e| e.to_string())?;
    if listed.len() != 1 || listed[0].id != activity.id {
        return Err(format!("expected exactly the inserted row, got {listed:?}"));
    }
    Ok(())
}

/// Rows of one work must not leak into another work's lists.
async fn lists_scoped_to_the_addressed_work<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_activity(&mut snap, make_activity(1, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_activity(&mut snap, make_activity(2, "B", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let work1 = s.list_activities(1).await.map_err(|e| e.to_string())?;
    let work2 = s.list_activities(2).await.map_err(|e| e.to_string())?;
    if work1.len() != 1 || work2.len() != 1 {
        return Err(format!(
            "expected one row per work, got {} and {}",
            work1.len(),
            work2.len()
        ));
    }
    if work1[0].name != "A" || work2[0].name != "B" {
        return Err("rows leaked across works".to_string());
    }
    Ok(())
}
