//! canteiro-storage: durable, transactional storage for the quality-control
//! event log.
//!
//! The [`CanteiroStorage`] trait defines the contract: snapshot-scoped writes
//! (activity rows, PCC/FVS events, non-conformities) with optimistic
//! concurrency on activity status, plus read-only queries against the pool.
//! [`SqliteStorage`] is the bundled backend; the [`conformance`] suite checks
//! any implementation against the contract.

mod error;
mod record;
mod sqlite;
mod traits;

pub mod conformance;

pub use error::StorageError;
pub use record::{
    ActivityRecord, FvsEventRecord, NewActivity, NewFvsEvent, NewNonconformity, NewPccEvent,
    NonconformityRecord, PccEventRecord,
};
pub use sqlite::SqliteStorage;
pub use traits::CanteiroStorage;
