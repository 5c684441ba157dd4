//! Conformance test suite for `CanteiroStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `CanteiroStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Initialization**: activity creation, field round-trips, work scoping
//! - **Snapshot isolation**: uncommitted writes invisible, rollback on abort
//!   and on drop
//! - **Atomic commit**: all-or-nothing semantics for event + NC + status
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Error handling**: correct error variants for invalid operations
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use canteiro_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod error;
mod init;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use canteiro_core::{ActivityStatus, InspectionResult, NcOrigin, NcStatus};
use time::macros::datetime;
use time::OffsetDateTime;

use crate::record::{ActivityRecord, NewActivity, NewFvsEvent, NewNonconformity, NewPccEvent};
use crate::CanteiroStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "insert_starts_at_version_0").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: CanteiroStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

/// Fixed instant used by most tests; later instants offset from it.
fn t0() -> OffsetDateTime {
    datetime!(2025-06-01 08:00 UTC)
}

fn make_activity(work_id: i64, name: &str, status: ActivityStatus) -> NewActivity {
    NewActivity {
        work_id,
        name: name.to_string(),
        status,
        responsible_user: Some("Mestre de obras".to_string()),
        created_at: t0(),
    }
}

fn make_pcc_event(activity: &ActivityRecord, at: OffsetDateTime) -> NewPccEvent {
    NewPccEvent {
        work_id: activity.work_id,
        activity_id: activity.id,
        crew_id: Some(1),
        executor_id: Some(10),
        requested_at: at,
        confirmed_at: at,
        created_at: at,
    }
}

fn make_fvs_event(
    activity: &ActivityRecord,
    result: InspectionResult,
    at: OffsetDateTime,
) -> NewFvsEvent {
    NewFvsEvent {
        work_id: activity.work_id,
        activity_id: activity.id,
        service_id: Some(5),
        executor_id: Some(10),
        inspected_at: at,
        result,
        rework_count: 0,
        observations: None,
        created_at: at,
    }
}

fn make_nonconformity(
    activity: &ActivityRecord,
    fvs_event_id: i64,
    at: OffsetDateTime,
) -> NewNonconformity {
    NewNonconformity {
        work_id: activity.work_id,
        activity_id: activity.id,
        service_id: Some(5),
        fvs_event_id,
        origin: NcOrigin::Fvs,
        status: NcStatus::Aberta,
        description: "NC aberta automaticamente por reprovação em FVS".to_string(),
        created_at: at,
    }
}
