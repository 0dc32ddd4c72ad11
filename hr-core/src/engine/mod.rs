//! Repair orchestration
//!
//! Drives lane and row repairs through the scan chain: resolve the
//! coordinate, open the vendor guard, lock the chain, read the baseline,
//! check availability, encode, commit and then either burn-delay, reset and
//! verify (hard) or bypass and reprogram the GPU side (soft). Every item of a
//! batch is attempted and logged; the first error is kept for the caller.

pub mod accounting;
mod lane;
pub mod report;
mod row;

pub use accounting::{check_completed, check_consumed, scan_bank, BankSpares, RowFuseState};
pub use lane::{repair_gpu_lanes, repair_hbm_lanes};
pub use report::{BatchReport, RepairKind, RepairLogEntry, RepairOutcome, RepairStatus, RepairTarget};
pub use row::{repair_gpu_rows, repair_hbm_rows};

use tracing::{info, warn};

use crate::constants::timing;
use crate::data::{RepairMode, Site, Translator};
use crate::dispatch::HbmInterface;
use crate::error::{HbmRepairError, Result};
use crate::hw::{ScanChain, Transport};
use crate::settings::RepairSettings;

/// Everything a repair needs, borrowed from the device handle
#[derive(Clone, Copy)]
pub struct RepairContext<'a> {
    pub transport: &'a dyn Transport,
    pub interface: &'a HbmInterface,
    pub settings: &'a RepairSettings,
}

impl<'a> RepairContext<'a> {
    pub fn new(transport: &'a dyn Transport, interface: &'a HbmInterface, settings: &'a RepairSettings) -> Self {
        Self {
            transport,
            interface,
            settings,
        }
    }

    pub fn chain(&self) -> ScanChain<'a> {
        ScanChain::new(self.transport, self.interface.registry(), self.settings.dry_run)
    }

    pub fn translator(&self) -> Translator<'a> {
        Translator::new(self.transport, self.interface.arch())
    }
}

/// What a committed repair ended as
struct Completed {
    status: RepairStatus,
    verification_mismatch: Option<String>,
}

impl Completed {
    fn with(status: RepairStatus) -> Self {
        Self {
            status,
            verification_mismatch: None,
        }
    }
}

/// Outcome of one attempt before it is logged and recorded
struct Attempt {
    status: RepairStatus,
    values: String,
    verification_mismatch: Option<String>,
    error: Option<HbmRepairError>,
}

impl Attempt {
    fn from_result(result: Result<Completed>, values: String) -> Self {
        match result {
            Ok(done) => Self {
                status: done.status,
                values,
                verification_mismatch: done.verification_mismatch,
                error: None,
            },
            Err(error) => Self::failed(error, values),
        }
    }

    fn failed(error: HbmRepairError, values: String) -> Self {
        let status = match &error {
            HbmRepairError::AlreadyRepaired { .. } => RepairStatus::AlreadyRepaired,
            other => RepairStatus::Failed(other.to_string()),
        };
        Self {
            status,
            values,
            verification_mismatch: None,
            error: Some(error),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: RepairStatus::Skipped(reason.into()),
            values: String::new(),
            verification_mismatch: None,
            error: None,
        }
    }

    /// Fold the post-repair hook result in; a guard left open fails the repair
    fn close_guard(mut self, post: Result<()>) -> Self {
        if let Err(error) = post {
            warn!("Closing the fuse guard failed: {}", error);
            if self.error.is_none() {
                self.status = RepairStatus::Failed(error.to_string());
                self.error = Some(error);
            }
        }
        self
    }
}

/// Log and record one attempt
fn record(
    ctx: &RepairContext,
    report: &mut BatchReport,
    kind: RepairKind,
    mode: RepairMode,
    target: RepairTarget,
    gpu: Option<String>,
    attempt: Attempt,
) {
    let outcome = RepairOutcome {
        target,
        mode,
        status: attempt.status,
        verification_mismatch: attempt.verification_mismatch,
    };
    let hbm = match target {
        RepairTarget::Lane(lane) => Some(lane.to_string()),
        RepairTarget::Row(row) => Some(row.to_string()),
        RepairTarget::UnmappedLane(_) | RepairTarget::UnmappedRow(_) => None,
    };
    let entry = RepairLogEntry {
        kind,
        mode,
        gpu,
        hbm,
        values: &attempt.values,
        settings: ctx.settings,
        outcome: &outcome,
    };
    if outcome.status.is_failure() || outcome.verification_mismatch.is_some() {
        warn!("{}", entry);
    } else {
        info!("{}", entry);
    }
    report.record(outcome, attempt.error);
}

/// Reset `site` after a fuse burn so the new fuses are sensed
fn reset_after_burn(ctx: &RepairContext, site: Site) -> Result<()> {
    ctx.transport.reset_site(site)?;
    ctx.transport.sleep_ms(timing::SITE_RESET_SETTLE_MS);
    warn!(
        "{} was reset after a fuse burn; a full device re-initialisation may also be required",
        site
    );
    Ok(())
}

/// Turn a verification result into a completion under the ignore policy
fn settle_verification(ctx: &RepairContext, verified: Result<()>) -> Result<Completed> {
    match verified {
        Ok(()) => Ok(Completed::with(RepairStatus::Repaired)),
        Err(error @ HbmRepairError::VerificationMismatch { .. }) if ctx.settings.ignore_verification_result => {
            Ok(Completed {
                status: RepairStatus::Repaired,
                verification_mismatch: Some(error.to_string()),
            })
        }
        Err(error) => Err(error),
    }
}
