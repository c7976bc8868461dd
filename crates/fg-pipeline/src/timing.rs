//! Per-action processing-time ledger with sticky failure poisoning.
//!
//! Each action accumulates the wall-clock time of its completed segment
//! executions. A failed execution reports a negative measurement, which
//! permanently poisons the action's entry: a partial sum would understate
//! the true cost, so once any piece is missing the whole figure is
//! untrustworthy. Poisoning never surfaces as an error; it only shows up as
//! an absent total at reporting time.

use dashmap::DashMap;

use crate::model::Pipeline;

/// Wire sentinel for a processing time that is not reliably known.
pub const UNSET: i64 = -1;

// ---------------------------------------------------------------------------
// TimeEntry
// ---------------------------------------------------------------------------

/// Recorded processing time for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeEntry {
    /// No measurement has been recorded yet.
    Unset,
    /// Sum in milliseconds of every completed segment execution so far.
    Accumulated(i64),
    /// A failed execution was reported; the entry never leaves this state.
    Poisoned,
}

impl TimeEntry {
    /// The external representation: the accumulated total, or [`UNSET`] when
    /// the value is unknown or untrustworthy.
    pub fn as_wire(self) -> i64 {
        match self {
            TimeEntry::Accumulated(ms) => ms,
            TimeEntry::Unset | TimeEntry::Poisoned => UNSET,
        }
    }

    pub fn is_poisoned(self) -> bool {
        matches!(self, TimeEntry::Poisoned)
    }

    pub fn is_accumulated(self) -> bool {
        matches!(self, TimeEntry::Accumulated(_))
    }
}

// ---------------------------------------------------------------------------
// ProcessingTimeLedger
// ---------------------------------------------------------------------------

/// Concurrent per-action processing-time ledger, keyed by action name.
///
/// [`record`](Self::record) performs its read-modify-write under the map's
/// per-key lock, so concurrent segment workers cannot lose or double-apply
/// increments. One ledger belongs to exactly one batch job.
#[derive(Debug, Default)]
pub struct ProcessingTimeLedger {
    entries: DashMap<String, TimeEntry>,
}

impl ProcessingTimeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the elapsed milliseconds of one segment execution.
    ///
    /// A negative measurement marks the action poisoned. Once poisoned, the
    /// entry stays poisoned regardless of what is recorded afterwards.
    /// Accumulation saturates so overflow cannot produce a value that looks
    /// like the sentinel.
    pub fn record(&self, action: &str, elapsed_ms: i64) {
        let mut entry = self
            .entries
            .entry(action.to_owned())
            .or_insert(TimeEntry::Unset);
        *entry = match (*entry, elapsed_ms) {
            (TimeEntry::Poisoned, _) => TimeEntry::Poisoned,
            (_, ms) if ms < 0 => TimeEntry::Poisoned,
            (TimeEntry::Unset, ms) => TimeEntry::Accumulated(ms),
            (TimeEntry::Accumulated(total), ms) => {
                TimeEntry::Accumulated(total.saturating_add(ms))
            }
        };
    }

    /// The recorded time for one action. Actions never recorded are
    /// [`TimeEntry::Unset`].
    pub fn time(&self, action: &str) -> TimeEntry {
        self.entries
            .get(action)
            .map(|entry| *entry)
            .unwrap_or(TimeEntry::Unset)
    }

    /// Aggregate total across every action of `pipeline`.
    ///
    /// The sum is only reported when every action holds a trustworthy
    /// measurement. A poisoned action dominates an unset one so in-process
    /// callers can tell "never ran" from "ran but cannot be trusted"; on the
    /// wire both map to [`UNSET`].
    pub fn total(&self, pipeline: &Pipeline) -> TimeEntry {
        let mut sum: i64 = 0;
        let mut any_unset = false;
        for action in pipeline.actions() {
            match self.time(&action.name) {
                TimeEntry::Poisoned => return TimeEntry::Poisoned,
                TimeEntry::Unset => any_unset = true,
                TimeEntry::Accumulated(ms) => sum = sum.saturating_add(ms),
            }
        }
        if any_unset {
            TimeEntry::Unset
        } else {
            TimeEntry::Accumulated(sum)
        }
    }
}
