use async_trait::async_trait;
use time::OffsetDateTime;

use canteiro_core::ActivityStatus;

use crate::error::StorageError;
use crate::record::{
    ActivityRecord, FvsEventRecord, NewActivity, NewFvsEvent, NewNonconformity, NewPccEvent,
    NonconformityRecord, PccEventRecord,
};

/// The storage trait for quality-control tracking backends.
///
/// A `CanteiroStorage` implementation provides durable, transactional storage
/// for activities and their append-only event log: PCC confirmations, FVS
/// inspections, and non-conformity records.
///
/// ## Snapshot Semantics
///
/// Mutating operations take `&mut Self::Snapshot`, an in-progress
/// transaction obtained from `begin_snapshot()` and consumed by either
/// `commit_snapshot()` or `abort_snapshot()`.
///
/// A `Snapshot` dropped without committing MUST roll back (drop semantics
/// on the underlying DB transaction). This is what makes
/// one-snapshot-per-request handlers all-or-nothing: an early return after
/// a partial write discards the write.
///
/// ## OCC Conflict Detection
///
/// `update_activity_status` performs an optimistic concurrency check:
/// `UPDATE WHERE version = expected_version`. If the version no longer
/// matches, the method returns `Err(StorageError::VersionConflict { .. })`.
///
/// ## Thread Safety
///
/// Implementations live in axum application state, so they must be
/// `Send + Sync + 'static`.
#[async_trait]
pub trait CanteiroStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    ///
    /// Must be `Send` to allow passing across async task boundaries.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Activity operations (within snapshot) ─────────────────────────────────

    /// Insert a new activity at version 0 and return the stored row.
    async fn insert_activity(
        &self,
        snapshot: &mut Self::Snapshot,
        activity: NewActivity,
    ) -> Result<ActivityRecord, StorageError>;

    /// Read an activity inside the snapshot, as the basis for an update.
    ///
    /// SQLite backends have no `SELECT ... FOR UPDATE`; the returned
    /// `version` plus the version-checked update is what detects a
    /// concurrent writer.
    ///
    /// Returns `Err(StorageError::ActivityNotFound)` if no such row exists.
    async fn get_activity_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        activity_id: i64,
    ) -> Result<ActivityRecord, StorageError>;

    /// Apply a version-validated status UPDATE to an activity (OCC).
    ///
    /// The UPDATE is conditional on `version = expected_version`. A missing
    /// row is `ActivityNotFound`; a present row at a different version is
    /// `VersionConflict`.
    ///
    /// Returns the new version number on success.
    async fn update_activity_status(
        &self,
        snapshot: &mut Self::Snapshot,
        activity_id: i64,
        expected_version: i64,
        new_status: ActivityStatus,
        updated_at: OffsetDateTime,
    ) -> Result<i64, StorageError>;

    // ── Event log (within snapshot, append-only) ──────────────────────────────

    /// Insert a PCC confirmation event and return the stored row.
    async fn insert_pcc_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: NewPccEvent,
    ) -> Result<PccEventRecord, StorageError>;

    /// Insert an FVS inspection event and return the stored row.
    ///
    /// Must be inserted BEFORE any non-conformity that references it, due to
    /// the FK constraint `nonconformities.fvs_event_id`.
    async fn insert_fvs_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: NewFvsEvent,
    ) -> Result<FvsEventRecord, StorageError>;

    /// Insert a non-conformity record and return the stored row.
    ///
    /// For a FAIL inspection this must happen in the SAME snapshot as the
    /// `insert_fvs_event` and `update_activity_status` calls: no failed
    /// inspection without its non-conformity.
    async fn insert_nonconformity(
        &self,
        snapshot: &mut Self::Snapshot,
        nc: NewNonconformity,
    ) -> Result<NonconformityRecord, StorageError>;

    // ── Query operations (outside snapshot, against pool/connection) ──────────

    /// Read one activity without locking.
    ///
    /// Returns `Err(StorageError::ActivityNotFound)` if no such row exists.
    async fn get_activity(&self, activity_id: i64) -> Result<ActivityRecord, StorageError>;

    /// List a work's activities, newest first.
    async fn list_activities(&self, work_id: i64) -> Result<Vec<ActivityRecord>, StorageError>;

    /// List a work's PCC confirmation events, newest first.
    async fn list_pcc_events(&self, work_id: i64) -> Result<Vec<PccEventRecord>, StorageError>;

    /// List a work's FVS inspection events, newest first.
    async fn list_fvs_events(&self, work_id: i64) -> Result<Vec<FvsEventRecord>, StorageError>;

    /// List a work's non-conformities, newest first.
    async fn list_nonconformities(
        &self,
        work_id: i64,
    ) -> Result<Vec<NonconformityRecord>, StorageError>;
}
