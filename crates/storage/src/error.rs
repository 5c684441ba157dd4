/// All errors that can be returned by a CanteiroStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another transaction updated
    /// the activity between our read and our write. The expected version was
    /// not found.
    #[error("concurrent update conflict on activity {activity_id}: expected version {expected_version}")]
    VersionConflict {
        activity_id: i64,
        expected_version: i64,
    },

    /// No activity row with the given id.
    #[error("activity not found: {activity_id}")]
    ActivityNotFound { activity_id: i64 },

    /// A backend-specific storage error (DB connection, malformed column,
    /// migration failure, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
