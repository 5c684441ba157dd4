//! Status enumerations shared across the workflow engine, storage, and the
//! HTTP surface.
//!
//! Every enum here has a fixed wire string (SCREAMING_SNAKE_CASE) used both
//! in JSON payloads and in database columns. Parsing is strict: an unknown
//! string is an [`UnknownVariant`] error, never a panic or a default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parse failure for any of the fixed-vocabulary enums in this module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    /// Which vocabulary was being parsed (e.g. `"activity status"`).
    pub kind: &'static str,
    /// The offending input.
    pub value: String,
}

// ── Activity lifecycle ───────────────────────────────────────────────

/// Lifecycle status of an activity on the execution schedule.
///
/// `PCC_REQUIRED -> PCC_CONFIRMED` via a PCC confirmation;
/// `INSPECTION_PENDING -> INSPECTED_PASS | INSPECTED_FAIL` via an FVS
/// inspection. `READY` and the two `INSPECTED_*` states accept no further
/// workflow events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    /// Awaiting the pre-execution checklist confirmation.
    PccRequired,
    /// Checklist confirmed; execution may begin.
    PccConfirmed,
    /// Ready to execute, no checklist gate on this activity.
    Ready,
    /// Execution done, awaiting the service verification inspection.
    InspectionPending,
    /// Inspection closed with a PASS verdict.
    InspectedPass,
    /// Inspection closed with a FAIL verdict.
    InspectedFail,
}

impl ActivityStatus {
    /// All statuses, in lifecycle order. Useful for exhaustive checks.
    pub const ALL: [ActivityStatus; 6] = [
        ActivityStatus::PccRequired,
        ActivityStatus::PccConfirmed,
        ActivityStatus::Ready,
        ActivityStatus::InspectionPending,
        ActivityStatus::InspectedPass,
        ActivityStatus::InspectedFail,
    ];

    /// The canonical wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::PccRequired => "PCC_REQUIRED",
            ActivityStatus::PccConfirmed => "PCC_CONFIRMED",
            ActivityStatus::Ready => "READY",
            ActivityStatus::InspectionPending => "INSPECTION_PENDING",
            ActivityStatus::InspectedPass => "INSPECTED_PASS",
            ActivityStatus::InspectedFail => "INSPECTED_FAIL",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PCC_REQUIRED" => Ok(ActivityStatus::PccRequired),
            "PCC_CONFIRMED" => Ok(ActivityStatus::PccConfirmed),
            "READY" => Ok(ActivityStatus::Ready),
            "INSPECTION_PENDING" => Ok(ActivityStatus::InspectionPending),
            "INSPECTED_PASS" => Ok(ActivityStatus::InspectedPass),
            "INSPECTED_FAIL" => Ok(ActivityStatus::InspectedFail),
            _ => Err(UnknownVariant {
                kind: "activity status",
                value: s.to_string(),
            }),
        }
    }
}

// ── Inspection verdict ───────────────────────────────────────────────

/// Binary verdict of an FVS inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionResult {
    Pass,
    Fail,
}

impl InspectionResult {
    /// Whether this verdict mandates opening a non-conformity record in the
    /// same transaction as the inspection event.
    pub fn opens_nonconformity(&self) -> bool {
        matches!(self, InspectionResult::Fail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionResult::Pass => "PASS",
            InspectionResult::Fail => "FAIL",
        }
    }
}

impl fmt::Display for InspectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InspectionResult {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(InspectionResult::Pass),
            "FAIL" => Ok(InspectionResult::Fail),
            _ => Err(UnknownVariant {
                kind: "inspection result",
                value: s.to_string(),
            }),
        }
    }
}

// ── Non-conformity vocabulary ────────────────────────────────────────

/// Treatment status of a non-conformity record.
///
/// Auto-opened NCs start in `ABERTA`. The later states exist in the data
/// model for treatment tooling; the workflow engine itself only ever opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NcStatus {
    Aberta,
    EmTratamento,
    Resolvida,
}

impl NcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NcStatus::Aberta => "ABERTA",
            NcStatus::EmTratamento => "EM_TRATAMENTO",
            NcStatus::Resolvida => "RESOLVIDA",
        }
    }
}

impl fmt::Display for NcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NcStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ABERTA" => Ok(NcStatus::Aberta),
            "EM_TRATAMENTO" => Ok(NcStatus::EmTratamento),
            "RESOLVIDA" => Ok(NcStatus::Resolvida),
            _ => Err(UnknownVariant {
                kind: "non-conformity status",
                value: s.to_string(),
            }),
        }
    }
}

/// Where a non-conformity came from. Today only inspections open NCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NcOrigin {
    Fvs,
}

impl NcOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            NcOrigin::Fvs => "FVS",
        }
    }
}

impl fmt::Display for NcOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NcOrigin {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FVS" => Ok(NcOrigin::Fvs),
            _ => Err(UnknownVariant {
                kind: "non-conformity origin",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_strings_round_trip() {
        for status in ActivityStatus::ALL {
            let parsed: ActivityStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
            // serde uses the same strings as as_str/FromStr
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().into()));
            let back: ActivityStatus = serde_json::from_value(json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn unknown_status_is_an_error() {
        let err = "DONE".parse::<ActivityStatus>().unwrap_err();
        assert_eq!(err.kind, "activity status");
        assert_eq!(err.value, "DONE");
        assert!(err.to_string().contains("DONE"));
    }

    #[test]
    fn inspection_result_parses_both_verdicts() {
        assert_eq!(
            "PASS".parse::<InspectionResult>().unwrap(),
            InspectionResult::Pass
        );
        assert_eq!(
            "FAIL".parse::<InspectionResult>().unwrap(),
            InspectionResult::Fail
        );
        assert!("pass".parse::<InspectionResult>().is_err());
    }

    #[test]
    fn only_fail_opens_a_nonconformity() {
        assert!(!InspectionResult::Pass.opens_nonconformity());
        assert!(InspectionResult::Fail.opens_nonconformity());
    }

    #[test]
    fn nc_vocabulary_round_trips() {
        for s in ["ABERTA", "EM_TRATAMENTO", "RESOLVIDA"] {
            assert_eq!(s.parse::<NcStatus>().unwrap().as_str(), s);
        }
        assert_eq!("FVS".parse::<NcOrigin>().unwrap(), NcOrigin::Fvs);
        assert!("MANUAL".parse::<NcOrigin>().is_err());
    }

    #[test]
    fn serde_strings_match_as_str() {
        assert_eq!(
            serde_json::to_value(NcStatus::EmTratamento).unwrap(),
            serde_json::Value::String("EM_TRATAMENTO".into())
        );
        assert_eq!(
            serde_json::to_value(NcOrigin::Fvs).unwrap(),
            serde_json::Value::String("FVS".into())
        );
        assert_eq!(
            serde_json::to_value(InspectionResult::Fail).unwrap(),
            serde_json::Value::String("FAIL".into())
        );
    }
}
