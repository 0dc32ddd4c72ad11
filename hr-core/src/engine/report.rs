//! Repair outcomes, batch reports and the per-repair log line

use std::fmt;

use crate::data::{GpuLane, GpuRow, HbmLane, HbmRow, RepairMode};
use crate::error::{HbmRepairError, Result};
use crate::settings::RepairSettings;

/// What a batch item addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairTarget {
    Lane(HbmLane),
    Row(HbmRow),
    /// GPU lane with no active HBM channel behind it
    UnmappedLane(GpuLane),
    /// GPU row with no active HBM channel behind it
    UnmappedRow(GpuRow),
}

impl fmt::Display for RepairTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairTarget::Lane(lane) => write!(f, "{}", lane),
            RepairTarget::Row(row) => write!(f, "{}", row),
            RepairTarget::UnmappedLane(lane) => write!(f, "{}", lane),
            RepairTarget::UnmappedRow(row) => write!(f, "{}", row),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairStatus {
    Repaired,
    /// Covered by the repair of a row sharing the same fuse
    ImplicitlyRepaired { by: HbmRow },
    /// Validated without writing any fuse
    DryRun,
    AlreadyRepaired,
    Skipped(String),
    Failed(String),
}

impl RepairStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, RepairStatus::Failed(_) | RepairStatus::AlreadyRepaired)
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairStatus::Repaired => write!(f, "repaired"),
            RepairStatus::ImplicitlyRepaired { by } => write!(f, "implicitly repaired by {}", by),
            RepairStatus::DryRun => write!(f, "dry run"),
            RepairStatus::AlreadyRepaired => write!(f, "already repaired"),
            RepairStatus::Skipped(reason) => write!(f, "skipped: {}", reason),
            RepairStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOutcome {
    pub target: RepairTarget,
    pub mode: RepairMode,
    pub status: RepairStatus,
    /// Verification mismatch tolerated by policy
    pub verification_mismatch: Option<String>,
}

/// Result of a batch: every attempted item plus the first error seen
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RepairOutcome>,
    pub first_error: Option<HbmRepairError>,
    /// Set when a batch-fatal error stopped the batch
    pub aborted: bool,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an outcome; the first error is kept, later ones only logged
    pub fn record(&mut self, outcome: RepairOutcome, error: Option<HbmRepairError>) {
        self.outcomes.push(outcome);
        if let Some(error) = error {
            self.record_error(error);
        }
    }

    /// Record an error that stopped the whole batch
    pub fn abort(&mut self, error: HbmRepairError) {
        self.aborted = true;
        self.record_error(error);
    }

    fn record_error(&mut self, error: HbmRepairError) {
        if error.is_batch_fatal() {
            self.aborted = true;
        }
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    pub fn is_success(&self) -> bool {
        self.first_error.is_none()
    }

    pub fn count(&self, predicate: impl Fn(&RepairStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }

    pub fn into_result(self) -> Result<Vec<RepairOutcome>> {
        match self.first_error {
            Some(error) => Err(error),
            None => Ok(self.outcomes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    Lane,
    Row,
}

/// One log line per attempted repair
///
/// Field order is fixed: repair type, GPU location, HBM location, values,
/// policy flags, outcome.
pub struct RepairLogEntry<'a> {
    pub kind: RepairKind,
    pub mode: RepairMode,
    pub gpu: Option<String>,
    pub hbm: Option<String>,
    pub values: &'a str,
    pub settings: &'a RepairSettings,
    pub outcome: &'a RepairOutcome,
}

impl fmt::Display for RepairLogEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RepairKind::Lane => "LANE",
            RepairKind::Row => "ROW",
        };
        write!(
            f,
            "{}_{}_REPAIR gpu=[{}] hbm=[{}] values=[{}] policy=[{}] result={}",
            self.mode,
            kind,
            self.gpu.as_deref().unwrap_or("-"),
            self.hbm.as_deref().unwrap_or("-"),
            if self.values.is_empty() { "-" } else { self.values },
            self.settings,
            self.outcome.status
        )?;
        if let Some(mismatch) = &self.outcome.verification_mismatch {
            write!(f, " (ignored: {})", mismatch)?;
        }
        Ok(())
    }
}
