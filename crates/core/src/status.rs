//! Cycle and restore status records.

use crate::version::Version;
use std::time::Duration;

/// Timing for one named phase of a cycle (mint, prepare, populate, publish,
/// integrity, validate, announce, commit).
#[derive(Debug, Clone)]
pub struct PhaseTiming {
    /// Phase name, e.g. `"populate"`.
    pub phase: &'static str,
    /// Wall-clock duration of the phase.
    pub duration: Duration,
}

/// The terminal outcome of one `run_cycle` call.
///
/// Exactly one of these is observed per cycle: a cycle
/// either produces a new version, detects no change, or fails — and in
/// every case `run_cycle` returns normally (only `ValidationFailed`
/// propagates as an `Err`).
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// A new version was announced and is now current.
    Produced {
        /// The newly announced version.
        version: Version,
    },
    /// The populator ran but the write engine reported no change.
    NoDelta,
    /// Some phase failed; the write engine was reset and the read-state
    /// holder is unchanged.
    Failed {
        /// Human-readable description of the failing phase and cause.
        reason: String,
    },
}

/// A complete record of one cycle: its outcome and per-phase timings.
///
/// Emitted to listeners via `on_cycle_complete` regardless of outcome.
#[derive(Debug, Clone)]
pub struct CycleStatus {
    /// The version this cycle attempted to produce (the minted `toVersion`).
    pub to_version: Version,
    /// What happened.
    pub outcome: CycleOutcome,
    /// Timing for each phase that ran before the cycle concluded.
    pub phases: Vec<PhaseTiming>,
}

impl CycleStatus {
    /// True if this cycle produced a new announced version.
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Produced { .. })
    }
}

/// The outcome of a [`RestoreProcedure`](../../cadence_producer/restore/index.html) call.
#[derive(Debug, Clone)]
pub enum RestoreStatus {
    /// `desiredVersion` was the sentinel; nothing was done.
    NoOp,
    /// The blob retriever produced exactly the requested version.
    Success {
        /// The version that was restored.
        version: Version,
    },
    /// The blob retriever produced a different version than requested.
    Fail {
        /// The version that was requested.
        desired: Version,
        /// The version that was actually retrieved.
        actual: Version,
    },
}
