//! The quality-control workflow engine.
//!
//! [`apply_event`] is the single entry point: given the status an activity is
//! currently in and the event a caller wants to record, it either returns the
//! [`TransitionOutcome`] (next status plus mandated side effects) or an
//! [`InvalidTransition`] naming both the current and the required status.
//!
//! The engine is deliberately history-free. It never consults prior events,
//! so recording the same event twice is not idempotent: the second attempt
//! finds the activity already advanced and is rejected like any other
//! wrong-status request.

use crate::status::{ActivityStatus, InspectionResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A workflow event to be applied to an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// Pre-execution checklist confirmed.
    PccConfirmation,
    /// Service verification inspection closed with the given verdict.
    FvsInspection(InspectionResult),
}

impl WorkflowEvent {
    /// The status an activity must be in for this event to be valid.
    pub fn required_status(&self) -> ActivityStatus {
        match self {
            WorkflowEvent::PccConfirmation => ActivityStatus::PccRequired,
            WorkflowEvent::FvsInspection(_) => ActivityStatus::InspectionPending,
        }
    }

    /// The data-free discriminant, used in error reporting.
    pub fn kind(&self) -> WorkflowEventKind {
        match self {
            WorkflowEvent::PccConfirmation => WorkflowEventKind::PccConfirmation,
            WorkflowEvent::FvsInspection(_) => WorkflowEventKind::FvsInspection,
        }
    }
}

/// Discriminant of [`WorkflowEvent`], without the verdict payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowEventKind {
    PccConfirmation,
    FvsInspection,
}

impl fmt::Display for WorkflowEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowEventKind::PccConfirmation => f.write_str("PCC confirmation"),
            WorkflowEventKind::FvsInspection => f.write_str("FVS inspection"),
        }
    }
}

/// What a valid event does: the status to move to, and whether a
/// non-conformity record must be opened in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub next_status: ActivityStatus,
    pub opens_nonconformity: bool,
}

/// Rejection of an event because the activity is in the wrong status.
///
/// Carries everything a caller needs to report the failure: which event was
/// attempted, the status the activity is actually in, and the status the
/// event requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {event} from status {current}: activity must be in {required} status")]
pub struct InvalidTransition {
    pub event: WorkflowEventKind,
    pub current: ActivityStatus,
    pub required: ActivityStatus,
}

/// Apply one workflow event to an activity's current status.
///
/// Pure: no I/O, no storage. The caller persists the outcome (event record,
/// optional non-conformity, status update) in a single transaction, or
/// discards it entirely on rejection.
pub fn apply_event(
    current: ActivityStatus,
    event: WorkflowEvent,
) -> Result<TransitionOutcome, InvalidTransition> {
    let required = event.required_status();
    if current != required {
        return Err(InvalidTransition {
            event: event.kind(),
            current,
            required,
        });
    }
    let outcome = match event {
        WorkflowEvent::PccConfirmation => TransitionOutcome {
            next_status: ActivityStatus::PccConfirmed,
            opens_nonconformity: false,
        },
        WorkflowEvent::FvsInspection(result) => TransitionOutcome {
            next_status: match result {
                InspectionResult::Pass => ActivityStatus::InspectedPass,
                InspectionResult::Fail => ActivityStatus::InspectedFail,
            },
            opens_nonconformity: result.opens_nonconformity(),
        },
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcc_confirmation_advances_from_pcc_required() {
        let outcome =
            apply_event(ActivityStatus::PccRequired, WorkflowEvent::PccConfirmation).unwrap();
        assert_eq!(outcome.next_status, ActivityStatus::PccConfirmed);
        assert!(!outcome.opens_nonconformity);
    }

    #[test]
    fn pcc_confirmation_rejected_from_every_other_status() {
        for current in ActivityStatus::ALL {
            if current == ActivityStatus::PccRequired {
                continue;
            }
            let err =
                apply_event(current, WorkflowEvent::PccConfirmation).unwrap_err();
            assert_eq!(err.event, WorkflowEventKind::PccConfirmation);
            assert_eq!(err.current, current);
            assert_eq!(err.required, ActivityStatus::PccRequired);
        }
    }

    #[test]
    fn fvs_pass_closes_as_inspected_pass_without_nc() {
        let outcome = apply_event(
            ActivityStatus::InspectionPending,
            WorkflowEvent::FvsInspection(InspectionResult::Pass),
        )
        .unwrap();
        assert_eq!(outcome.next_status, ActivityStatus::InspectedPass);
        assert!(!outcome.opens_nonconformity);
    }

    #[test]
    fn fvs_fail_closes_as_inspected_fail_and_opens_nc() {
        let outcome = apply_event(
            ActivityStatus::InspectionPending,
            WorkflowEvent::FvsInspection(InspectionResult::Fail),
        )
        .unwrap();
        assert_eq!(outcome.next_status, ActivityStatus::InspectedFail);
        assert!(outcome.opens_nonconformity);
    }

    #[test]
    fn fvs_inspection_rejected_from_every_other_status() {
        for current in ActivityStatus::ALL {
            if current == ActivityStatus::InspectionPending {
                continue;
            }
            for result in [InspectionResult::Pass, InspectionResult::Fail] {
                let err =
                    apply_event(current, WorkflowEvent::FvsInspection(result)).unwrap_err();
                assert_eq!(err.event, WorkflowEventKind::FvsInspection);
                assert_eq!(err.current, current);
                assert_eq!(err.required, ActivityStatus::InspectionPending);
            }
        }
    }

    #[test]
    fn reapplying_an_event_after_it_succeeded_is_rejected() {
        // The engine is history-free: a second confirmation sees
        // PCC_CONFIRMED and fails exactly like any wrong-status request.
        let first =
            apply_event(ActivityStatus::PccRequired, WorkflowEvent::PccConfirmation).unwrap();
        let second = apply_event(first.next_status, WorkflowEvent::PccConfirmation);
        assert!(second.is_err());

        let inspected = apply_event(
            ActivityStatus::InspectionPending,
            WorkflowEvent::FvsInspection(InspectionResult::Pass),
        )
        .unwrap();
        let again = apply_event(
            inspected.next_status,
            WorkflowEvent::FvsInspection(InspectionResult::Pass),
        );
        assert!(again.is_err());
    }

    #[test]
    fn rejection_message_names_current_and_required_status() {
        let err = apply_event(ActivityStatus::Ready, WorkflowEvent::PccConfirmation).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("READY"), "message was: {msg}");
        assert!(msg.contains("PCC_REQUIRED"), "message was: {msg}");
        assert!(msg.contains("PCC confirmation"), "message was: {msg}");
    }

    #[test]
    fn terminal_statuses_accept_no_events() {
        for terminal in [
            ActivityStatus::Ready,
            ActivityStatus::InspectedPass,
            ActivityStatus::InspectedFail,
        ] {
            assert!(apply_event(terminal, WorkflowEvent::PccConfirmation).is_err());
            assert!(apply_event(
                terminal,
                WorkflowEvent::FvsInspection(InspectionResult::Pass)
            )
            .is_err());
            assert!(apply_event(
                terminal,
                WorkflowEvent::FvsInspection(InspectionResult::Fail)
            )
            .is_err());
        }
    }
}
