//! SQLite backend for [`CanteiroStorage`], built on sqlx.
//!
//! Snapshots map to sqlx transactions; dropping one without committing rolls
//! it back, which is exactly the contract the trait requires. Embedded
//! migrations run on connect, so a fresh database file is usable
//! immediately.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use async_trait::async_trait;
use canteiro_core::{ActivityStatus, UnknownVariant};

use crate::error::StorageError;
use crate::record::{
    ActivityRecord, FvsEventRecord, NewActivity, NewFvsEvent, NewNonconformity, NewPccEvent,
    NonconformityRecord, PccEventRecord,
};
use crate::traits::CanteiroStorage;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Connect to `database_url` (e.g. `sqlite://canteiro.db`), creating the
    /// file if missing, and apply pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(backend)?
            .create_if_missing(true)
            .foreign_keys(true);
        Self::connect_with(options).await
    }

    /// Connect with explicit options and apply pending migrations.
    pub async fn connect_with(options: SqliteConnectOptions) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(backend)?;
        MIGRATOR.run(&pool).await.map_err(backend)?;
        debug!("sqlite migrations applied");
        Ok(Self { pool })
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CanteiroStorage for SqliteStorage {
    type Snapshot = Transaction<'static, Sqlite>;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError> {
        self.pool.begin().await.map_err(backend)
    }

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        snapshot.commit().await.map_err(backend)
    }

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        snapshot.rollback().await.map_err(backend)
    }

    async fn insert_activity(
        &self,
        snapshot: &mut Self::Snapshot,
        activity: NewActivity,
    ) -> Result<ActivityRecord, StorageError> {
        let created_at = format_ts(activity.created_at)?;
        let result = sqlx::query(
            r#"
            INSERT INTO activities (work_id, name, status, responsible_user, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            "#,
        )
        .bind(activity.work_id)
        .bind(&activity.name)
        .bind(activity.status.as_str())
        .bind(activity.responsible_user.as_deref())
        .bind(&created_at)
        .execute(&mut **snapshot)
        .await
        .map_err(backend)?;

        Ok(ActivityRecord {
            id: result.last_insert_rowid(),
            work_id: activity.work_id,
            name: activity.name,
            status: activity.status,
            responsible_user: activity.responsible_user,
            version: 0,
            created_at: activity.created_at,
            updated_at: activity.created_at,
        })
    }

    async fn get_activity_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        activity_id: i64,
    ) -> Result<ActivityRecord, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, work_id, name, status, responsible_user, version, created_at, updated_at
            FROM activities WHERE id = ?1
            "#,
        )
        .bind(activity_id)
        .fetch_optional(&mut **snapshot)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => activity_from_row(&row),
            None => Err(StorageError::ActivityNotFound { activity_id }),
        }
    }

    async fn update_activity_status(
        &self,
        snapshot: &mut Self::Snapshot,
        activity_id: i64,
        expected_version: i64,
        new_status: ActivityStatus,
        updated_at: OffsetDateTime,
    ) -> Result<i64, StorageError> {
        let updated_at = format_ts(updated_at)?;
        let result = sqlx::query(
            r#"
            UPDATE activities SET status = ?1, version = version + 1, updated_at = ?2
            WHERE id = ?3 AND version = ?4
            "#,
        )
        .bind(new_status.as_str())
        .bind(&updated_at)
        .bind(activity_id)
        .bind(expected_version)
        .execute(&mut **snapshot)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            // Zero rows is either a missing activity or a version that moved
            // under us; tell them apart so callers can map 404 vs 409.
            let present: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE id = ?1")
                .bind(activity_id)
                .fetch_one(&mut **snapshot)
                .await
                .map_err(backend)?;
            if present == 0 {
                return Err(StorageError::ActivityNotFound { activity_id });
            }
            return Err(StorageError::VersionConflict {
                activity_id,
                expected_version,
            });
        }
        Ok(expected_version + 1)
    }

    async fn insert_pcc_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: NewPccEvent,
    ) -> Result<PccEventRecord, StorageError> {
        let requested_at = format_ts(event.requested_at)?;
        let confirmed_at = format_ts(event.confirmed_at)?;
        let created_at = format_ts(event.created_at)?;
        let result = sqlx::query(
            r#"
            INSERT INTO pcc_events (work_id, activity_id, crew_id, executor_id, requested_at, confirmed_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(event.work_id)
        .bind(event.activity_id)
        .bind(event.crew_id)
        .bind(event.executor_id)
        .bind(&requested_at)
        .bind(&confirmed_at)
        .bind(&created_at)
        .execute(&mut **snapshot)
        .await
        .map_err(backend)?;

        Ok(PccEventRecord {
            id: result.last_insert_rowid(),
            work_id: event.work_id,
            activity_id: event.activity_id,
            crew_id: event.crew_id,
            executor_id: event.executor_id,
            requested_at: event.requested_at,
            confirmed_at: event.confirmed_at,
            created_at: event.created_at,
        })
    }

    async fn insert_fvs_event(
        &self,
        snapshot: &mut Self::Snapshot,
        event: NewFvsEvent,
    ) -> Result<FvsEventRecord, StorageError> {
        let inspected_at = format_ts(event.inspected_at)?;
        let created_at = format_ts(event.created_at)?;
        let result = sqlx::query(
            r#"
            INSERT INTO fvs_events (work_id, activity_id, service_id, executor_id, inspected_at, result, rework_count, observations, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(event.work_id)
        .bind(event.activity_id)
        .bind(event.service_id)
        .bind(event.executor_id)
        .bind(&inspected_at)
        .bind(event.result.as_str())
        .bind(event.rework_count)
        .bind(event.observations.as_deref())
        .bind(&created_at)
        .execute(&mut **snapshot)
        .await
        .map_err(backend)?;

        Ok(FvsEventRecord {
            id: result.last_insert_rowid(),
            work_id: event.work_id,
            activity_id: event.activity_id,
            service_id: event.service_id,
            executor_id: event.executor_id,
            inspected_at: event.inspected_at,
            result: event.result,
            rework_count: event.rework_count,
            observations: event.observations,
            created_at: event.created_at,
        })
    }

    async fn insert_nonconformity(
        &self,
        snapshot: &mut Self::Snapshot,
        nc: NewNonconformity,
    ) -> Result<NonconformityRecord, StorageError> {
        let created_at = format_ts(nc.created_at)?;
        let result = sqlx::query(
            r#"
            INSERT INTO nonconformities (work_id, activity_id, service_id, fvs_event_id, origin, status, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(nc.work_id)
        .bind(nc.activity_id)
        .bind(nc.service_id)
        .bind(nc.fvs_event_id)
        .bind(nc.origin.as_str())
        .bind(nc.status.as_str())
        .bind(&nc.description)
        .bind(&created_at)
        .execute(&mut **snapshot)
        .await
        .map_err(backend)?;

        Ok(NonconformityRecord {
            id: result.last_insert_rowid(),
            work_id: nc.work_id,
            activity_id: nc.activity_id,
            service_id: nc.service_id,
            fvs_event_id: nc.fvs_event_id,
            origin: nc.origin,
            status: nc.status,
            description: nc.description,
            created_at: nc.created_at,
        })
    }

    async fn get_activity(&self, activity_id: i64) -> Result<ActivityRecord, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, work_id, name, status, responsible_user, version, created_at, updated_at
            FROM activities WHERE id = ?1
            "#,
        )
        .bind(activity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some(row) => activity_from_row(&row),
            None => Err(StorageError::ActivityNotFound { activity_id }),
        }
    }

    async fn list_activities(&self, work_id: i64) -> Result<Vec<ActivityRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, work_id, name, status, responsible_user, version, created_at, updated_at
            FROM activities WHERE work_id = ?1
            ORDER BY datetime(created_at) DESC, id DESC
            "#,
        )
        .bind(work_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(activity_from_row).collect()
    }

    async fn list_pcc_events(&self, work_id: i64) -> Result<Vec<PccEventRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, work_id, activity_id, crew_id, executor_id, requested_at, confirmed_at, created_at
            FROM pcc_events WHERE work_id = ?1
            ORDER BY datetime(created_at) DESC, id DESC
            "#,
        )
        .bind(work_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(pcc_event_from_row).collect()
    }

    async fn list_fvs_events(&self, work_id: i64) -> Result<Vec<FvsEventRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, work_id, activity_id, service_id, executor_id, inspected_at, result, rework_count, observations, created_at
            FROM fvs_events WHERE work_id = ?1
            ORDER BY datetime(created_at) DESC, id DESC
            "#,
        )
        .bind(work_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(fvs_event_from_row).collect()
    }

    async fn list_nonconformities(
        &self,
        work_id: i64,
    ) -> Result<Vec<NonconformityRecord>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, work_id, activity_id, service_id, fvs_event_id, origin, status, description, created_at
            FROM nonconformities WHERE work_id = ?1
            ORDER BY datetime(created_at) DESC, id DESC
            "#,
        )
        .bind(work_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(nonconformity_from_row).collect()
    }
}

// ── Row mapping ──────────────────────────────────────────────────────

fn backend<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn format_ts(ts: OffsetDateTime) -> Result<String, StorageError> {
    ts.format(&Rfc3339)
        .map_err(|e| StorageError::Backend(format!("timestamp format: {e}")))
}

fn parse_ts(raw: &str) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|e| StorageError::Backend(format!("corrupt timestamp {raw:?}: {e}")))
}

fn parse_enum<T>(raw: &str) -> Result<T, StorageError>
where
    T: FromStr<Err = UnknownVariant>,
{
    raw.parse()
        .map_err(|e: UnknownVariant| StorageError::Backend(format!("corrupt column: {e}")))
}

fn activity_from_row(row: &SqliteRow) -> Result<ActivityRecord, StorageError> {
    let status: String = row.try_get("status").map_err(backend)?;
    let created_at: String = row.try_get("created_at").map_err(backend)?;
    let updated_at: String = row.try_get("updated_at").map_err(backend)?;
    Ok(ActivityRecord {
        id: row.try_get("id").map_err(backend)?,
        work_id: row.try_get("work_id").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        status: parse_enum(&status)?,
        responsible_user: row.try_get("responsible_user").map_err(backend)?,
        version: row.try_get("version").map_err(backend)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn pcc_event_from_row(row: &SqliteRow) -> Result<PccEventRecord, StorageError> {
    let requested_at: String = row.try_get("requested_at").map_err(backend)?;
    let confirmed_at: String = row.try_get("confirmed_at").map_err(backend)?;
    let created_at: String = row.try_get("created_at").map_err(backend)?;
    Ok(PccEventRecord {
        id: row.try_get("id").map_err(backend)?,
        work_id: row.try_get("work_id").map_err(backend)?,
        activity_id: row.try_get("activity_id").map_err(backend)?,
        crew_id: row.try_get("crew_id").map_err(backend)?,
        executor_id: row.try_get("executor_id").map_err(backend)?,
        requested_at: parse_ts(&requested_at)?,
        confirmed_at: parse_ts(&confirmed_at)?,
        created_at: parse_ts(&created_at)?,
    })
}

fn fvs_event_from_row(row: &SqliteRow) -> Result<FvsEventRecord, StorageError> {
    let inspected_at: String = row.try_get("inspected_at").map_err(backend)?;
    let result: String = row.try_get("result").map_err(backend)?;
    let created_at: String = row.try_get("created_at").map_err(backend)?;
    Ok(FvsEventRecord {
        id: row.try_get("id").map_err(backend)?,
        work_id: row.try_get("work_id").map_err(backend)?,
        activity_id: row.try_get("activity_id").map_err(backend)?,
        service_id: row.try_get("service_id").map_err(backend)?,
        executor_id: row.try_get("executor_id").map_err(backend)?,
        inspected_at: parse_ts(&inspected_at)?,
        result: parse_enum(&result)?,
        rework_count: row.try_get("rework_count").map_err(backend)?,
        observations: row.try_get("observations").map_err(backend)?,
        created_at: parse_ts(&created_at)?,
    })
}

fn nonconformity_from_row(row: &SqliteRow) -> Result<NonconformityRecord, StorageError> {
    let origin: String = row.try_get("origin").map_err(backend)?;
    let status: String = row.try_get("status").map_err(backend)?;
    let created_at: String = row.try_get("created_at").map_err(backend)?;
    Ok(NonconformityRecord {
        id: row.try_get("id").map_err(backend)?,
        work_id: row.try_get("work_id").map_err(backend)?,
        activity_id: row.try_get("activity_id").map_err(backend)?,
        service_id: row.try_get("service_id").map_err(backend)?,
        fvs_event_id: row.try_get("fvs_event_id").map_err(backend)?,
        origin: parse_enum(&origin)?,
        status: parse_enum(&status)?,
        description: row.try_get("description").map_err(backend)?,
        created_at: parse_ts(&created_at)?,
    })
}
