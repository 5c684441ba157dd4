//! canteiro-core: domain model and workflow engine for construction-site
//! quality control.
//!
//! Models the per-activity quality workflow: a pre-execution checklist
//! confirmation (PCC) releases an activity for execution, and a service
//! verification inspection (FVS) closes it with a PASS or FAIL verdict. A
//! failed inspection opens a non-conformity record.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`apply_event()`] -- run one workflow event against a current status
//! - [`ActivityStatus`] -- the six-state activity lifecycle
//! - [`InspectionResult`] -- PASS/FAIL verdict of an FVS inspection
//! - [`WorkflowEvent`] -- the events the engine accepts
//! - [`TransitionOutcome`] -- next status plus mandated side effects
//! - [`InvalidTransition`] -- rejection carrying current and required status
//!
//! The engine is pure: it owns no storage and performs no I/O. Callers are
//! responsible for persisting the outcome atomically.

pub mod status;
pub mod workflow;

// ── Convenience re-exports ───────────────────────────────────────────

pub use status::{ActivityStatus, InspectionResult, NcOrigin, NcStatus, UnknownVariant};
pub use workflow::{
    apply_event, InvalidTransition, TransitionOutcome, WorkflowEvent, WorkflowEventKind,
};
