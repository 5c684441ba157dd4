use std::future::Future;

use canteiro_core::{ActivityStatus, InspectionResult};
use time::Duration;

use super::{make_activity, make_fvs_event, make_nonconformity, make_pcc_event, t0, TestResult};
use crate::CanteiroStorage;

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "confirmation_commits_event_and_status_together",
        confirmation_commits_event_and_status_together(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "confirmation_writes_exactly_one_event",
        confirmation_writes_exactly_one_event(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "fail_inspection_commits_event_nc_and_status_atomically",
        fail_inspection_commits_event_nc_and_status_atomically(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "pass_inspection_commits_no_nc",
        pass_inspection_commits_no_nc(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "nc_references_the_failing_inspection",
        nc_references_the_failing_inspection(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "successive_commits_accumulate_events",
        successive_commits_accumulate_events(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "lists_return_newest_first",
        lists_return_newest_first(factory).await,
    ));

    results
}

/// The canonical PCC pipeline: one snapshot carrying the event insert and
/// the status update, both visible after commit.
async fn confirmation_commits_event_and_status_together<S, F, Fut>(
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
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let loaded = s
        .get_activity_for_update(&mut snap, activity.id)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_pcc_event(&mut snap, make_pcc_event(&loaded, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.update_activity_status(
        &mut snap,
        loaded.id,
        loaded.version,
        ActivityStatus::PccConfirmed,
        t0(),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    let events = s.list_pcc_events(1).await.map_err(|e| e.to_string())?;
    if read.status != ActivityStatus::PccConfirmed {
        return Err(format!("expected PCC_CONFIRMED, got {}", read.status));
    }
    if read.version != 1 {
        return Err(format!("expected version 1, got {}", read.version));
    }
    if events.len() != 1 {
        return Err(format!("expected 1 PCC event, got {}", events.len()));
    }
    Ok(())
}

async fn confirmation_writes_exactly_one_event<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let event = s
        .insert_pcc_event(&mut snap, make_pcc_event(&activity, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s.list_pcc_events(1).await.map_err(|e| e.to_string())?;
    if events.len() != 1 {
        return Err(format!("expected exactly 1 event, got {}", events.len()));
    }
    if events[0].id != event.id || events[0].activity_id != activity.id {
        return Err("stored event does not match the returned record".to_string());
    }
    Ok(())
}

/// FAIL pipeline: FVS event + NC + status update all land in one commit.
async fn fail_inspection_commits_event_nc_and_status_atomically<S, F, Fut>(
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
        .insert_activity(
            &mut snap,
            make_activity(2, "Porta corta-fogo", ActivityStatus::InspectionPending),
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
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let read = s.get_activity(activity.id).await.map_err(|e| e.to_string())?;
    let events = s.list_fvs_events(2).await.map_err(|e| e.to_string())?;
    let ncs = s.list_nonconformities(2).await.map_err(|e| e.to_string())?;
    if read.status != ActivityStatus::InspectedFail {
        return Err(format!("expected INSPECTED_FAIL, got {}", read.status));
    }
    if events.len() != 1 {
        return Err(format!("expected 1 FVS event, got {}", events.len()));
    }
    if ncs.len() != 1 {
        return Err(format!("expected 1 NC, got {}", ncs.len()));
    }
    Ok(())
}

async fn pass_inspection_commits_no_nc<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(3, "A", ActivityStatus::InspectionPending))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_fvs_event(&mut snap, make_fvs_event(&activity, InspectionResult::Pass, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.update_activity_status(&mut snap, activity.id, 0, ActivityStatus::InspectedPass, t0())
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s.list_fvs_events(3).await.map_err(|e| e.to_string())?;
    let ncs = s.list_nonconformities(3).await.map_err(|e| e.to_string())?;
    if events.len() != 1 {
        return Err(format!("expected 1 FVS event, got {}", events.len()));
    }
    if !ncs.is_empty() {
        return Err(format!("expected 0 NCs on PASS, got {}", ncs.len()));
    }
    Ok(())
}

async fn nc_references_the_failing_inspection<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(5, "A", ActivityStatus::InspectionPending))
        .await
        .map_err(|e| e.to_string())?;
    let fvs = s
        .insert_fvs_event(&mut snap, make_fvs_event(&activity, InspectionResult::Fail, t0()))
        .await
        .map_err(|e| e.to_string())?;
    let nc = s
        .insert_nonconformity(&mut snap, make_nonconformity(&activity, fvs.id, t0()))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if nc.fvs_event_id != fvs.id {
        return Err(format!(
            "NC points at FVS {}, expected {}",
            nc.fvs_event_id, fvs.id
        ));
    }
    let stored = s.list_nonconformities(5).await.map_err(|e| e.to_string())?;
    if stored.len() != 1 || stored[0].fvs_event_id != fvs.id {
        return Err("stored NC lost its FVS reference".to_string());
    }
    Ok(())
}

async fn successive_commits_accumulate_events<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let a = s
        .insert_activity(&mut snap, make_activity(6, "A", ActivityStatus::InspectionPending))
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .insert_activity(&mut snap, make_activity(6, "B", ActivityStatus::InspectionPending))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    for (activity, minutes) in [(&a, 1), (&b, 2)] {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.insert_fvs_event(
            &mut snap,
            make_fvs_event(activity, InspectionResult::Pass, t0() + Duration::minutes(minutes)),
        )
        .await
        .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    }

    let events = s.list_fvs_events(6).await.map_err(|e| e.to_string())?;
    if events.len() != 2 {
        return Err(format!("expected 2 events across commits, got {}", events.len()));
    }
    Ok(())
}

/// Newest-first ordering by creation time, independent of insertion order.
async fn lists_return_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let activity = s
        .insert_activity(&mut snap, make_activity(7, "A", ActivityStatus::PccRequired))
        .await
        .map_err(|e| e.to_string())?;
    // Later instant inserted first: time order must still win.
    let newest = s
        .insert_pcc_event(&mut snap, make_pcc_event(&activity, t0() + Duration::minutes(10)))
        .await
        .map_err(|e| e.to_string())?;
    let oldest = s
        .insert_pcc_event(&mut snap, make_pcc_event(&activity, t0()))
        .await
        .map_err(|e| e.to_string())?;
    let middle = s
        .insert_pcc_event(&mut snap, make_pcc_event(&activity, t0() + Duration::minutes(5)))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let events = s.list_pcc_events(7).await.map_err(|e| e.to_string())?;
    let got: Vec<i64> = events.iter().map(|e| e.id).collect();
    let expected = vec![newest.id, middle.id, oldest.id];
    if got != expected {
        return Err(format!("expected order {expected:?}, got {got:?}"));
    }
    Ok(())
}
