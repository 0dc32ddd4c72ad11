//! Row repair flows

use hr_vendor::skhynix;
use tracing::{info, warn};

use super::accounting::{check_completed, check_consumed, scan_bank, BankSpares, RowFuseState};
use super::{
    record, reset_after_burn, settle_verification, Attempt, BatchReport, Completed, RepairContext, RepairKind,
    RepairStatus, RepairTarget,
};
use crate::codec::row as row_codec;
use crate::codec::RowFuseFields;
use crate::constants::timing;
use crate::data::{GpuRow, HbmRow, PseudoChannel, RepairMode, WdrData};
use crate::dispatch::FuseGuard;
use crate::error::{HbmRepairError, Result};
use crate::hw::{ScanChain, ScanLock, WriteOutcome};
use crate::wir::WirType;

fn required_wirs(ctx: &RepairContext, mode: RepairMode) -> Vec<WirType> {
    match mode {
        RepairMode::Soft => vec![WirType::SpareRowScan, WirType::SoftRowRepair, WirType::Bypass],
        RepairMode::Hard => {
            let mut wirs = vec![WirType::SpareRowScan, WirType::HardRowRepair];
            match ctx.interface.overrides().fuse_guard {
                FuseGuard::None => {}
                FuseGuard::UnlockKey { .. } => wirs.push(WirType::RepairUnlock),
                FuseGuard::RepairMode => wirs.push(WirType::RepairMode),
            }
            wirs
        }
    }
}

/// Sequential row batch that folds rows sharing a fuse into one repair
struct RowBatch<'c, 'a> {
    ctx: &'c RepairContext<'a>,
    mode: RepairMode,
    report: BatchReport,
    /// Rows already submitted and whether their fuse ended up programmed
    submitted: Vec<(HbmRow, bool)>,
}

impl<'c, 'a> RowBatch<'c, 'a> {
    /// Fails with the aborted report when the model lacks a required WIR
    fn start(ctx: &'c RepairContext<'a>, mode: RepairMode) -> std::result::Result<Self, BatchReport> {
        let mut report = BatchReport::new();
        if let Err(error) = ctx.interface.require(&required_wirs(ctx, mode)) {
            warn!("{} row repair not possible: {}", mode, error);
            report.abort(error);
            return Err(report);
        }
        Ok(Self {
            ctx,
            mode,
            report,
            submitted: Vec::new(),
        })
    }

    fn record(&mut self, target: RepairTarget, gpu: Option<String>, attempt: Attempt) {
        record(self.ctx, &mut self.report, RepairKind::Row, self.mode, target, gpu, attempt);
    }

    /// Row submitted earlier in this batch that is programmed by the same fuse
    ///
    /// Only hard repairs couple rows; soft remaps hold the full row address.
    fn coupled_with(&self, row: &HbmRow) -> Option<(HbmRow, bool)> {
        if self.mode != RepairMode::Hard || !self.ctx.interface.overrides().couples_adjacent_rows {
            return None;
        }
        self.submitted.iter().copied().find(|(other, _)| {
            other.site == row.site
                && other.stack == row.stack
                && other.channel == row.channel
                && other.bank == row.bank
                && skhynix::rows_share_fuse(other.row.value(), row.row.value())
        })
    }

    fn submit(&mut self, row: HbmRow, gpu: Option<String>) {
        if let Err(error) = validate(self.ctx, &row) {
            self.record(RepairTarget::Row(row), gpu, Attempt::failed(error, String::new()));
            return;
        }

        if let Some((by, programmed)) = self.coupled_with(&row) {
            info!("{} shares its fuse with {}, not repaired separately", row, by);
            let status = if programmed {
                RepairStatus::ImplicitlyRepaired { by }
            } else {
                RepairStatus::Failed(format!("shares its fuse with {}, whose repair failed", by))
            };
            let attempt = Attempt {
                status,
                values: String::new(),
                verification_mismatch: None,
                error: None,
            };
            self.record(RepairTarget::Row(row), gpu, attempt);
            return;
        }

        let attempt = repair_row(self.ctx, &row, self.mode);
        let programmed = match &attempt.error {
            None => true,
            Some(HbmRepairError::AlreadyRepaired { .. }) => true,
            Some(_) => false,
        };
        self.submitted.push((row, programmed));
        self.record(RepairTarget::Row(row), gpu, attempt);
    }
}

/// Repair rows reported by the GPU
pub fn repair_gpu_rows(ctx: &RepairContext, rows: &[GpuRow], mode: RepairMode) -> BatchReport {
    let mut batch = match RowBatch::start(ctx, mode) {
        Ok(batch) => batch,
        Err(report) => return report,
    };

    let translator = ctx.translator();
    for gpu in rows {
        if batch.report.aborted {
            break;
        }
        let gpu_text = Some(gpu.to_string());
        match translator.gpu_row_to_hbm(gpu) {
            Ok(Some(row)) => batch.submit(row, gpu_text),
            Ok(None) => batch.record(
                RepairTarget::UnmappedRow(*gpu),
                gpu_text,
                Attempt::skipped("no active HBM channel behind this row"),
            ),
            Err(error) => batch.record(
                RepairTarget::UnmappedRow(*gpu),
                gpu_text,
                Attempt::failed(error, String::new()),
            ),
        }
    }
    batch.report
}

/// Repair rows given in HBM coordinates
pub fn repair_hbm_rows(ctx: &RepairContext, rows: &[HbmRow], mode: RepairMode) -> BatchReport {
    let mut batch = match RowBatch::start(ctx, mode) {
        Ok(batch) => batch,
        Err(report) => return report,
    };

    let translator = ctx.translator();
    for row in rows {
        if batch.report.aborted {
            break;
        }
        match translator.hbm_row_to_gpu(row) {
            Ok(Some(gpu)) => batch.submit(*row, Some(gpu.to_string())),
            Ok(None) => batch.record(RepairTarget::Row(*row), None, Attempt::skipped("channel is floorswept")),
            Err(error) => batch.record(RepairTarget::Row(*row), None, Attempt::failed(error, String::new())),
        }
    }
    batch.report
}

fn validate(ctx: &RepairContext, row: &HbmRow) -> Result<()> {
    row_codec::check_row(ctx.interface.profile(), row.row)?;
    if row.stack.value() >= ctx.interface.model().stack_count() {
        return Err(HbmRepairError::invalid_coordinate(format!(
            "{} not populated on {}-Hi stacks",
            row.stack,
            ctx.interface.model().stack_height
        )));
    }
    Ok(())
}

/// One row under a single hold of the scan lock, guard hooks included
fn repair_row(ctx: &RepairContext, row: &HbmRow, mode: RepairMode) -> Attempt {
    let chain = ctx.chain();
    let mut values = String::new();
    let lock = match ScanLock::acquire(ctx.transport) {
        Ok(lock) => lock,
        Err(error) => return Attempt::failed(error, values),
    };
    match mode {
        RepairMode::Soft => {
            let result = soft_row(ctx, &chain, &lock, row, &mut values);
            Attempt::from_result(result, values)
        }
        RepairMode::Hard => {
            if let Err(error) = ctx.interface.pre_repair_hook(&chain, &lock, row.site, mode) {
                return Attempt::failed(error, values);
            }
            let result = hard_row(ctx, &chain, &lock, row, &mut values);
            let post = ctx.interface.post_repair_hook(&chain, &lock, row.site, mode);
            Attempt::from_result(result, values).close_guard(post)
        }
    }
}

/// Slot for a fresh repair of both pseudo-channels
fn free_slot(ctx: &RepairContext, before: &BankSpares, row: &HbmRow) -> Result<usize> {
    match before.first_available_slot() {
        Some(slot) => Ok(slot),
        None if ctx.settings.skip_availability_check => {
            warn!("{}: no spare reads as available, burning slot 0 anyway", row);
            Ok(0)
        }
        None => Err(HbmRepairError::SpareResourceExhausted {
            location: row.to_string(),
        }),
    }
}

/// Slot for the missing half of a row burned in one pseudo-channel only
///
/// The missing half must land in the same slot, which needs a fuse index.
fn completion_slot(
    ctx: &RepairContext,
    before: &BankSpares,
    row: &HbmRow,
    slot: usize,
    missing: PseudoChannel,
) -> Result<usize> {
    let partial = |detail: String| HbmRepairError::PartialRowRepair {
        location: row.to_string(),
        detail,
    };
    if ctx.interface.profile().row_fuse.fuse_index.is_none() {
        return Err(partial(format!(
            "{} holds it in slot {} but slots cannot be addressed on {}",
            missing.other(),
            slot,
            ctx.interface.variant()
        )));
    }
    if !before.is_slot_free(slot, missing) {
        return Err(partial(format!("slot {} of {} is already burned", slot, missing)));
    }
    warn!("{}: only {} holds it, burning {} in slot {}", row, missing.other(), missing, slot);
    Ok(slot)
}

fn hard_row(
    ctx: &RepairContext,
    chain: &ScanChain,
    _lock: &ScanLock,
    row: &HbmRow,
    values: &mut String,
) -> Result<Completed> {
    let profile = ctx.interface.profile();
    let fused_row = row_codec::canonical_row(profile, row.row);

    let before = scan_bank(chain, ctx.interface, row.site, row.stack, row.channel, row.bank)?;
    let (slot, pseudo_channels, completing) = match before.row_state(fused_row) {
        RowFuseState::Repaired => {
            return Err(HbmRepairError::AlreadyRepaired {
                location: row.to_string(),
            })
        }
        RowFuseState::Partial { slot, missing } => {
            (completion_slot(ctx, &before, row, slot, missing)?, vec![missing], true)
        }
        RowFuseState::Unrepaired => (free_slot(ctx, &before, row)?, PseudoChannel::all().collect(), false),
    };

    let mut written = Ok(WriteOutcome::Written);
    for (index, &pseudo_channel) in pseudo_channels.iter().enumerate() {
        let fields = RowFuseFields {
            stack: row.stack,
            pseudo_channel,
            bank: row.bank,
            row: fused_row,
            fuse_index: profile.row_fuse.fuse_index.map(|_| slot as u32),
        };
        let data = row_codec::encode_hard_row(profile, &fields)?;
        if index == 0 {
            *values = format!(
                "slot {} of {} fuse_row {:#x} {} {}",
                slot,
                before.available_count(),
                fused_row.value(),
                pseudo_channel,
                data
            );
        }
        written = chain.write(WirType::HardRowRepair, row.site, row.channel, &data);
        if !matches!(written, Ok(WriteOutcome::Written)) {
            break;
        }
    }
    let written = match written {
        Ok(WriteOutcome::SkippedDryRun) => return Ok(Completed::with(RepairStatus::DryRun)),
        Err(error) if error.is_batch_fatal() => return Err(error),
        other => other,
    };

    ctx.transport
        .sleep_ms(ctx.settings.burn_delay_ms(profile.burn_delay_ms));
    reset_after_burn(ctx, row.site)?;

    let after = scan_bank(chain, ctx.interface, row.site, row.stack, row.channel, row.bank)?;
    let verified = if completing {
        check_completed(&after, fused_row, &row.to_string())
    } else {
        check_consumed(&before, &after, &row.to_string())
    };

    written?;
    settle_verification(ctx, verified)
}

/// Remap the requested row itself; the soft register carries every row bit
fn soft_row(
    ctx: &RepairContext,
    chain: &ScanChain,
    _lock: &ScanLock,
    row: &HbmRow,
    values: &mut String,
) -> Result<Completed> {
    let fused_row = row_codec::canonical_row(ctx.interface.profile(), row.row);

    let spares = scan_bank(chain, ctx.interface, row.site, row.stack, row.channel, row.bank)?;
    if spares.row_state(fused_row) == RowFuseState::Repaired {
        return Err(HbmRepairError::AlreadyRepaired {
            location: row.to_string(),
        });
    }
    if spares.available_count() == 0 {
        if !ctx.settings.skip_availability_check {
            return Err(HbmRepairError::SpareResourceExhausted {
                location: row.to_string(),
            });
        }
        warn!("{}: no spare reads as available, remapping anyway", row);
    }

    for pseudo_channel in PseudoChannel::all() {
        let data = row_codec::encode_soft_row(row.stack, pseudo_channel, row.bank, row.row)?;
        if pseudo_channel.value() == 0 {
            *values = format!("row {:#x} pc0 {}", row.row.value(), data);
        }
        chain.write(WirType::SoftRowRepair, row.site, row.channel, &data)?;
    }
    ctx.transport.sleep_us(timing::SOFT_REPAIR_SETTLE_US);
    chain.write(WirType::Bypass, row.site, row.channel, &WdrData::zeroed(1))?;
    Ok(Completed::with(RepairStatus::Repaired))
}
