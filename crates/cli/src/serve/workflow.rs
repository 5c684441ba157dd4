//! Workflow endpoints: PCC confirmation and FVS inspection.
//!
//! Each request runs in exactly one storage snapshot: load the activity,
//! let the engine check the transition, append the event record (plus the
//! automatic non-conformity on FAIL), apply the version-checked status
//! update, commit. An early return drops the snapshot and rolls everything
//! back, so a rejected request leaves no trace.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

use canteiro_core::{
    apply_event, ActivityStatus, InspectionResult, InvalidTransition, NcOrigin, NcStatus,
    WorkflowEvent,
};
use canteiro_storage::{
    CanteiroStorage, FvsEventRecord, NewFvsEvent, NewNonconformity, NewPccEvent,
    NonconformityRecord, PccEventRecord, StorageError,
};

use super::json_error;
use super::state::AppState;

/// Why a workflow request failed. Maps to the HTTP status in
/// [`error_response`].
#[derive(Debug)]
enum WorkflowError {
    /// The addressed activity does not exist (404).
    NotFound,
    /// The activity is in the wrong status for this event (400).
    Transition(InvalidTransition),
    /// The request body names a work the activity does not belong to (400).
    WorkMismatch { given: i64, actual: i64 },
    /// A concurrent writer advanced the activity first (409).
    Conflict,
    /// The storage backend failed (500).
    Storage(StorageError),
}

impl From<StorageError> for WorkflowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ActivityNotFound { .. } => WorkflowError::NotFound,
            StorageError::VersionConflict { .. } => WorkflowError::Conflict,
            other => WorkflowError::Storage(other),
        }
    }
}

fn error_response(err: WorkflowError) -> Response {
    match err {
        WorkflowError::NotFound => {
            json_error(StatusCode::NOT_FOUND, "Activity not found").into_response()
        }
        WorkflowError::Transition(e) => {
            json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        WorkflowError::WorkMismatch { given, actual } => json_error(
            StatusCode::BAD_REQUEST,
            &format!("activity belongs to work {actual}, not work {given}"),
        )
        .into_response(),
        WorkflowError::Conflict => json_error(
            StatusCode::CONFLICT,
            "activity was updated concurrently; reload and retry",
        )
        .into_response(),
        WorkflowError::Storage(e) => {
            warn!(error = %e, "storage failure during workflow request");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}

// ── PCC confirmation ─────────────────────────────────────────────────

/// Parsed body of `POST /pcc/confirm`.
struct PccConfirmation {
    activity_id: i64,
    work_id: Option<i64>,
    crew_id: Option<i64>,
    executor_id: Option<i64>,
    requested_at: Option<OffsetDateTime>,
}

struct PccOutcome {
    event: PccEventRecord,
    new_status: ActivityStatus,
}

/// The confirmation transaction: one snapshot carrying the event insert and
/// the version-checked status update.
async fn confirm_pcc_tx<S: CanteiroStorage>(
    storage: &S,
    input: PccConfirmation,
    now: OffsetDateTime,
) -> Result<PccOutcome, WorkflowError> {
    let mut snap = storage.begin_snapshot().await?;
    let activity = storage
        .get_activity_for_update(&mut snap, input.activity_id)
        .await?;
    if let Some(given) = input.work_id {
        if given != activity.work_id {
            return Err(WorkflowError::WorkMismatch {
                given,
                actual: activity.work_id,
            });
        }
    }
    let outcome = apply_event(activity.status, WorkflowEvent::PccConfirmation)
        .map_err(WorkflowError::Transition)?;

    let event = storage
        .insert_pcc_event(
            &mut snap,
            NewPccEvent {
                work_id: activity.work_id,
                activity_id: activity.id,
                crew_id: input.crew_id,
                executor_id: input.executor_id,
                requested_at: input.requested_at.unwrap_or(now),
                confirmed_at: now,
                created_at: now,
            },
        )
        .await?;
    storage
        .update_activity_status(
            &mut snap,
            activity.id,
            activity.version,
            outcome.next_status,
            now,
        )
        .await?;
    storage.commit_snapshot(snap).await?;

    Ok(PccOutcome {
        event,
        new_status: outcome.next_status,
    })
}

/// POST /pcc/confirm
pub(crate) async fn handle_confirm_pcc(
    State(state): State<Arc<AppState>>,
    Json(parsed): Json<serde_json::Value>,
) -> Response {
    let input = match parse_pcc_body(&parsed) {
        Ok(input) => input,
        Err(resp) => return resp,
    };

    let activity_id = input.activity_id;
    match confirm_pcc_tx(&state.storage, input, OffsetDateTime::now_utc()).await {
        Ok(outcome) => {
            info!(activity_id, new_status = %outcome.new_status, "PCC confirmed");
            let body = serde_json::json!({
                "success": true,
                "pcc_event": outcome.event,
                "new_status": outcome.new_status,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn parse_pcc_body(body: &serde_json::Value) -> Result<PccConfirmation, Response> {
    Ok(PccConfirmation {
        activity_id: require_i64(body, "activity_id")?,
        work_id: optional_i64(body, "work_id")?,
        crew_id: optional_i64(body, "crew_id")?,
        executor_id: optional_i64(body, "executor_id")?,
        requested_at: optional_rfc3339(body, "requested_at")?,
    })
}

// ── FVS inspection ───────────────────────────────────────────────────

/// Parsed body of `POST /fvs/inspect`.
struct FvsInspection {
    activity_id: i64,
    work_id: Option<i64>,
    service_id: Option<i64>,
    executor_id: Option<i64>,
    result: InspectionResult,
    rework_count: i64,
    observations: Option<String>,
}

struct FvsOutcome {
    event: FvsEventRecord,
    nonconformity: Option<NonconformityRecord>,
    new_status: ActivityStatus,
}

/// Description for an auto-opened NC: cites the failing inspection and
/// carries the inspector's observations when present.
fn nc_description(event: &FvsEventRecord) -> String {
    let base = format!("NC automática criada por reprovação na FVS {}.", event.id);
    match event.observations.as_deref() {
        Some(obs) if !obs.is_empty() => format!("{base} {obs}"),
        _ => base,
    }
}

/// The inspection transaction. A FAIL verdict inserts the non-conformity in
/// the same snapshot as the event and the status update; either all three
/// commit or none do.
async fn inspect_fvs_tx<S: CanteiroStorage>(
    storage: &S,
    input: FvsInspection,
    now: OffsetDateTime,
) -> Result<FvsOutcome, WorkflowError> {
    let mut snap = storage.begin_snapshot().await?;
    let activity = storage
        .get_activity_for_update(&mut snap, input.activity_id)
        .await?;
    if let Some(given) = input.work_id {
        if given != activity.work_id {
            return Err(WorkflowError::WorkMismatch {
                given,
                actual: activity.work_id,
            });
        }
    }
    let outcome = apply_event(activity.status, WorkflowEvent::FvsInspection(input.result))
        .map_err(WorkflowError::Transition)?;

    let event = storage
        .insert_fvs_event(
            &mut snap,
            NewFvsEvent {
                work_id: activity.work_id,
                activity_id: activity.id,
                service_id: input.service_id,
                executor_id: input.executor_id,
                inspected_at: now,
                result: input.result,
                rework_count: input.rework_count,
                observations: input.observations,
                created_at: now,
            },
        )
        .await?;

    let nonconformity = if outcome.opens_nonconformity {
        let nc = storage
            .insert_nonconformity(
                &mut snap,
                NewNonconformity {
                    work_id: activity.work_id,
                    activity_id: activity.id,
                    service_id: input.service_id,
                    fvs_event_id: event.id,
                    origin: NcOrigin::Fvs,
                    status: NcStatus::Aberta,
                    description: nc_description(&event),
                    created_at: now,
                },
            )
            .await?;
        Some(nc)
    } else {
        None
    };

    storage
        .update_activity_status(
            &mut snap,
            activity.id,
            activity.version,
            outcome.next_status,
            now,
        )
        .await?;
    storage.commit_snapshot(snap).await?;

    Ok(FvsOutcome {
        event,
        nonconformity,
        new_status: outcome.next_status,
    })
}

/// POST /fvs/inspect
pub(crate) async fn handle_inspect_fvs(
    State(state): State<Arc<AppState>>,
    Json(parsed): Json<serde_json::Value>,
) -> Response {
    let input = match parse_fvs_body(&parsed) {
        Ok(input) => input,
        Err(resp) => return resp,
    };

    let activity_id = input.activity_id;
    let result = input.result;
    match inspect_fvs_tx(&state.storage, input, OffsetDateTime::now_utc()).await {
        Ok(outcome) => {
            info!(
                activity_id,
                result = %result,
                new_status = %outcome.new_status,
                nc_opened = outcome.nonconformity.is_some(),
                "FVS inspection recorded"
            );
            let body = serde_json::json!({
                "success": true,
                "fvs_event": outcome.event,
                "nonconformity": outcome.nonconformity,
                "new_status": outcome.new_status,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn parse_fvs_body(body: &serde_json::Value) -> Result<FvsInspection, Response> {
    Ok(FvsInspection {
        activity_id: require_i64(body, "activity_id")?,
        work_id: optional_i64(body, "work_id")?,
        service_id: optional_i64(body, "service_id")?,
        executor_id: optional_i64(body, "executor_id")?,
        result: require_result(body)?,
        rework_count: optional_i64(body, "rework_count")?.unwrap_or(0),
        observations: optional_string(body, "observations")?,
    })
}

// ── Field extraction ─────────────────────────────────────────────────
//
// Bodies are parsed field by field so every rejection names the offending
// field. `null` counts as absent for the optional ones.

fn bad_request(message: &str) -> Response {
    json_error(StatusCode::BAD_REQUEST, message).into_response()
}

fn require_i64(body: &serde_json::Value, field: &str) -> Result<i64, Response> {
    match body.get(field) {
        Some(v) => v
            .as_i64()
            .ok_or_else(|| bad_request(&format!("'{field}' must be an integer"))),
        None => Err(bad_request(&format!("missing '{field}' field"))),
    }
}

fn optional_i64(body: &serde_json::Value, field: &str) -> Result<Option<i64>, Response> {
    match body.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| bad_request(&format!("'{field}' must be an integer"))),
    }
}

fn optional_string(body: &serde_json::Value, field: &str) -> Result<Option<String>, Response> {
    match body.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| bad_request(&format!("'{field}' must be a string"))),
    }
}

fn optional_rfc3339(
    body: &serde_json::Value,
    field: &str,
) -> Result<Option<OffsetDateTime>, Response> {
    match optional_string(body, field)? {
        None => Ok(None),
        Some(raw) => OffsetDateTime::parse(&raw, &Rfc3339)
            .map(Some)
            .map_err(|_| bad_request(&format!("'{field}' must be an RFC 3339 timestamp"))),
    }
}

fn require_result(body: &serde_json::Value) -> Result<InspectionResult, Response> {
    match body.get("result").and_then(|v| v.as_str()) {
        Some(s) => s
            .parse()
            .map_err(|_| bad_request("'result' must be \"PASS\" or \"FAIL\"")),
        None => match body.get("result") {
            Some(_) => Err(bad_request("'result' must be \"PASS\" or \"FAIL\"")),
            None => Err(bad_request("missing 'result' field")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canteiro_storage::{NewActivity, SqliteStorage};
    use time::macros::datetime;

    async fn temp_storage(dir: &tempfile::TempDir) -> SqliteStorage {
        let path = dir.path().join("workflow.db");
        SqliteStorage::connect(&format!("sqlite://{}", path.display()))
            .await
            .expect("temp storage")
    }

    async fn seed_activity(storage: &SqliteStorage, work_id: i64, status: ActivityStatus) -> i64 {
        let mut snap = storage.begin_snapshot().await.unwrap();
        let activity = storage
            .insert_activity(
                &mut snap,
                NewActivity {
                    work_id,
                    name: "Instalar contramarco".to_string(),
                    status,
                    responsible_user: None,
                    created_at: t0(),
                },
            )
            .await
            .unwrap();
        storage.commit_snapshot(snap).await.unwrap();
        activity.id
    }

    fn t0() -> OffsetDateTime {
        datetime!(2025-06-01 08:00 UTC)
    }

    fn pcc_input(activity_id: i64) -> PccConfirmation {
        PccConfirmation {
            activity_id,
            work_id: None,
            crew_id: Some(4),
            executor_id: Some(12),
            requested_at: None,
        }
    }

    fn fvs_input(activity_id: i64, result: InspectionResult) -> FvsInspection {
        FvsInspection {
            activity_id,
            work_id: None,
            service_id: Some(9),
            executor_id: Some(12),
            result,
            rework_count: 0,
            observations: None,
        }
    }

    #[tokio::test]
    async fn confirmation_writes_one_event_and_advances_status() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 1, ActivityStatus::PccRequired).await;

        let outcome = confirm_pcc_tx(&storage, pcc_input(id), t0()).await.unwrap();
        assert_eq!(outcome.new_status, ActivityStatus::PccConfirmed);
        assert_eq!(outcome.event.activity_id, id);
        assert_eq!(outcome.event.crew_id, Some(4));
        // requested_at defaults to the confirmation instant
        assert_eq!(outcome.event.requested_at, t0());
        assert_eq!(outcome.event.confirmed_at, t0());

        let activity = storage.get_activity(id).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::PccConfirmed);
        assert_eq!(activity.version, 1);
        assert_eq!(storage.list_pcc_events(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn confirmation_in_wrong_status_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 1, ActivityStatus::Ready).await;

        let err = confirm_pcc_tx(&storage, pcc_input(id), t0())
            .await
            .err()
            .expect("must reject");
        match err {
            WorkflowError::Transition(e) => {
                assert_eq!(e.current, ActivityStatus::Ready);
                assert_eq!(e.required, ActivityStatus::PccRequired);
            }
            _ => panic!("expected a transition rejection"),
        }

        let activity = storage.get_activity(id).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::Ready);
        assert_eq!(activity.version, 0);
        assert!(storage.list_pcc_events(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_confirmation_fails_instead_of_noop() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 1, ActivityStatus::PccRequired).await;

        confirm_pcc_tx(&storage, pcc_input(id), t0()).await.unwrap();
        let second = confirm_pcc_tx(&storage, pcc_input(id), t0()).await;
        assert!(matches!(second, Err(WorkflowError::Transition(_))));

        // Still exactly one event from the first confirmation.
        assert_eq!(storage.list_pcc_events(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_activity_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;

        let err = confirm_pcc_tx(&storage, pcc_input(999), t0()).await;
        assert!(matches!(err, Err(WorkflowError::NotFound)));
        assert!(storage.list_pcc_events(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mismatched_work_id_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 1, ActivityStatus::PccRequired).await;

        let mut input = pcc_input(id);
        input.work_id = Some(2);
        let err = confirm_pcc_tx(&storage, input, t0()).await;
        assert!(matches!(
            err,
            Err(WorkflowError::WorkMismatch { given: 2, actual: 1 })
        ));

        let activity = storage.get_activity(id).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::PccRequired);
        assert!(storage.list_pcc_events(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pass_inspection_writes_event_without_nc() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 3, ActivityStatus::InspectionPending).await;

        let outcome = inspect_fvs_tx(&storage, fvs_input(id, InspectionResult::Pass), t0())
            .await
            .unwrap();
        assert_eq!(outcome.new_status, ActivityStatus::InspectedPass);
        assert!(outcome.nonconformity.is_none());

        assert_eq!(storage.list_fvs_events(3).await.unwrap().len(), 1);
        assert!(storage.list_nonconformities(3).await.unwrap().is_empty());
        let activity = storage.get_activity(id).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::InspectedPass);
    }

    #[tokio::test]
    async fn fail_inspection_opens_nc_citing_the_fvs_event() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 3, ActivityStatus::InspectionPending).await;

        let outcome = inspect_fvs_tx(&storage, fvs_input(id, InspectionResult::Fail), t0())
            .await
            .unwrap();
        assert_eq!(outcome.new_status, ActivityStatus::InspectedFail);
        let nc = outcome.nonconformity.expect("FAIL must open an NC");
        assert_eq!(nc.fvs_event_id, outcome.event.id);
        assert_eq!(nc.origin, NcOrigin::Fvs);
        assert_eq!(nc.status, NcStatus::Aberta);
        assert!(nc.description.contains(&outcome.event.id.to_string()));

        assert_eq!(storage.list_fvs_events(3).await.unwrap().len(), 1);
        assert_eq!(storage.list_nonconformities(3).await.unwrap().len(), 1);
        let activity = storage.get_activity(id).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::InspectedFail);
        assert_eq!(activity.version, 1);
    }

    #[tokio::test]
    async fn nc_description_carries_observations() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 4, ActivityStatus::InspectionPending).await;

        let mut input = fvs_input(id, InspectionResult::Fail);
        input.observations = Some("trinca no revestimento".to_string());
        let outcome = inspect_fvs_tx(&storage, input, t0()).await.unwrap();

        let nc = outcome.nonconformity.unwrap();
        assert!(nc.description.contains("trinca no revestimento"));
    }

    #[tokio::test]
    async fn inspection_in_wrong_status_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = temp_storage(&dir).await;
        let id = seed_activity(&storage, 5, ActivityStatus::PccRequired).await;

        let err = inspect_fvs_tx(&storage, fvs_input(id, InspectionResult::Fail), t0()).await;
        assert!(matches!(err, Err(WorkflowError::Transition(_))));

        assert!(storage.list_fvs_events(5).await.unwrap().is_empty());
        assert!(storage.list_nonconformities(5).await.unwrap().is_empty());
        let activity = storage.get_activity(id).await.unwrap();
        assert_eq!(activity.status, ActivityStatus::PccRequired);
        assert_eq!(activity.version, 0);
    }

    #[test]
    fn workflow_errors_map_to_their_status_codes() {
        assert_eq!(
            error_response(WorkflowError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        let invalid = apply_event(ActivityStatus::Ready, WorkflowEvent::PccConfirmation)
            .err()
            .expect("invalid transition");
        assert_eq!(
            error_response(WorkflowError::Transition(invalid)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(WorkflowError::WorkMismatch { given: 2, actual: 1 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(WorkflowError::Conflict).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            error_response(WorkflowError::Storage(StorageError::Backend(
                "disk full".to_string()
            )))
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn version_conflicts_surface_as_conflict_not_storage_failure() {
        let err = WorkflowError::from(StorageError::VersionConflict {
            activity_id: 1,
            expected_version: 0,
        });
        assert!(matches!(err, WorkflowError::Conflict));
        let err = WorkflowError::from(StorageError::ActivityNotFound { activity_id: 1 });
        assert!(matches!(err, WorkflowError::NotFound));
    }

    #[test]
    fn pcc_body_parsing_names_the_offending_field() {
        assert!(parse_pcc_body(&serde_json::json!({"activity_id": 1})).is_ok());
        assert!(parse_pcc_body(&serde_json::json!({})).is_err());
        assert!(parse_pcc_body(&serde_json::json!({"activity_id": "one"})).is_err());
        assert!(
            parse_pcc_body(&serde_json::json!({"activity_id": 1, "requested_at": "not a date"}))
                .is_err()
        );
        // null optionals are treated as absent
        assert!(
            parse_pcc_body(&serde_json::json!({"activity_id": 1, "crew_id": null})).is_ok()
        );
    }

    #[test]
    fn fvs_body_parsing_requires_a_known_result() {
        let ok = parse_fvs_body(&serde_json::json!({"activity_id": 1, "result": "FAIL"})).unwrap();
        assert_eq!(ok.result, InspectionResult::Fail);
        assert_eq!(ok.rework_count, 0);
        assert!(parse_fvs_body(&serde_json::json!({"activity_id": 1})).is_err());
        assert!(
            parse_fvs_body(&serde_json::json!({"activity_id": 1, "result": "MAYBE"})).is_err()
        );
        assert!(parse_fvs_body(&serde_json::json!({"activity_id": 1, "result": 1})).is_err());
    }
}
