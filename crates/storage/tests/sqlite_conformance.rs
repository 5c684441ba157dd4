//! Runs the backend-agnostic conformance suite against `SqliteStorage`.
//!
//! Each test in the suite gets its own database file under a shared temp
//! directory, so tests cannot observe each other's rows.

use std::sync::atomic::{AtomicU32, Ordering};

use sqlx::sqlite::SqliteConnectOptions;

use canteiro_storage::conformance::run_conformance_suite;
use canteiro_storage::SqliteStorage;

#[tokio::test]
async fn sqlite_passes_the_conformance_suite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().to_path_buf();
    let counter = AtomicU32::new(0);

    let report = run_conformance_suite(|| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let path = base.join(format!("conformance-{n}.db"));
        async move {
            let options = SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true)
                .foreign_keys(true);
            SqliteStorage::connect_with(options)
                .await
                .expect("fresh sqlite storage")
        }
    })
    .await;

    assert_eq!(report.failed, 0, "{report}");
}
