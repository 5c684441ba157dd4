//! Record types exchanged with storage backends.
//!
//! `*Record` structs are full rows as read back (serializable, RFC 3339
//! timestamps on the wire). `New*` structs are the caller-supplied parts of
//! an insert; backends assign the id and echo the stored row back.

use canteiro_core::{ActivityStatus, InspectionResult, NcOrigin, NcStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An activity row: one task on a work's execution schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub work_id: i64,
    pub name: String,
    pub status: ActivityStatus,
    pub responsible_user: Option<String>,
    /// Optimistic concurrency counter, incremented on every status update.
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Caller-supplied fields for a new activity. Version starts at 0 and
/// `updated_at` starts equal to `created_at`.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub work_id: i64,
    pub name: String,
    pub status: ActivityStatus,
    pub responsible_user: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A pre-execution checklist (PCC) confirmation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PccEventRecord {
    pub id: i64,
    pub work_id: i64,
    pub activity_id: i64,
    pub crew_id: Option<i64>,
    pub executor_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub confirmed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPccEvent {
    pub work_id: i64,
    pub activity_id: i64,
    pub crew_id: Option<i64>,
    pub executor_id: Option<i64>,
    pub requested_at: OffsetDateTime,
    pub confirmed_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

/// A service verification (FVS) inspection event with its verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FvsEventRecord {
    pub id: i64,
    pub work_id: i64,
    pub activity_id: i64,
    pub service_id: Option<i64>,
    pub executor_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub inspected_at: OffsetDateTime,
    pub result: InspectionResult,
    pub rework_count: i64,
    pub observations: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewFvsEvent {
    pub work_id: i64,
    pub activity_id: i64,
    pub service_id: Option<i64>,
    pub executor_id: Option<i64>,
    pub inspected_at: OffsetDateTime,
    pub result: InspectionResult,
    pub rework_count: i64,
    pub observations: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A non-conformity record. Auto-opened ones reference the failing FVS
/// inspection via `fvs_event_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonconformityRecord {
    pub id: i64,
    pub work_id: i64,
    pub activity_id: i64,
    pub service_id: Option<i64>,
    pub fvs_event_id: i64,
    pub origin: NcOrigin,
    pub status: NcStatus,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewNonconformity {
    pub work_id: i64,
    pub activity_id: i64,
    pub service_id: Option<i64>,
    pub fvs_event_id: i64,
    pub origin: NcOrigin,
    pub status: NcStatus,
    pub description: String,
    pub created_at: OffsetDateTime,
}
