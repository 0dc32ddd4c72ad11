//! Lane repair flows

use tracing::{debug, warn};

use super::{
    record, reset_after_burn, settle_verification, Attempt, BatchReport, Completed, RepairContext, RepairKind,
    RepairStatus, RepairTarget,
};
use crate::codec::lane as lane_codec;
use crate::constants::timing;
use crate::data::{GpuLane, HbmLane, RepairMode, Translator, WdrData};
use crate::dispatch::{FuseGuard, LaneBurnOrder};
use crate::error::{HbmRepairError, Result};
use crate::hw::{ScanChain, ScanLock, WriteOutcome};
use crate::wir::WirType;

fn required_wirs(ctx: &RepairContext, mode: RepairMode) -> Vec<WirType> {
    match mode {
        RepairMode::Soft => vec![WirType::SoftLaneRepair, WirType::Bypass],
        RepairMode::Hard => {
            let mut wirs = vec![WirType::HardLaneRepair];
            match ctx.interface.overrides().fuse_guard {
                FuseGuard::None => {}
                FuseGuard::UnlockKey { .. } => wirs.push(WirType::RepairUnlock),
                FuseGuard::RepairMode => wirs.push(WirType::RepairMode),
            }
            wirs
        }
    }
}

/// Repair lanes reported by the GPU
pub fn repair_gpu_lanes(ctx: &RepairContext, lanes: &[GpuLane], mode: RepairMode) -> BatchReport {
    let mut report = BatchReport::new();
    if let Err(error) = ctx.interface.require(&required_wirs(ctx, mode)) {
        warn!("{} lane repair not possible: {}", mode, error);
        report.abort(error);
        return report;
    }

    let translator = ctx.translator();
    for gpu in lanes {
        if report.aborted {
            break;
        }
        let gpu_text = Some(gpu.to_string());
        match translator.gpu_lane_to_hbm(gpu) {
            Ok(Some(lane)) => {
                let attempt = repair_lane(ctx, &lane, mode);
                record(ctx, &mut report, RepairKind::Lane, mode, RepairTarget::Lane(lane), gpu_text, attempt);
            }
            Ok(None) => {
                let attempt = Attempt::skipped("no active HBM channel behind this lane");
                record(ctx, &mut report, RepairKind::Lane, mode, RepairTarget::UnmappedLane(*gpu), gpu_text, attempt);
            }
            Err(error) => {
                let attempt = Attempt::failed(error, String::new());
                record(ctx, &mut report, RepairKind::Lane, mode, RepairTarget::UnmappedLane(*gpu), gpu_text, attempt);
            }
        }
    }
    report
}

/// Repair lanes given in HBM coordinates
pub fn repair_hbm_lanes(ctx: &RepairContext, lanes: &[HbmLane], mode: RepairMode) -> BatchReport {
    let mut report = BatchReport::new();
    if let Err(error) = ctx.interface.require(&required_wirs(ctx, mode)) {
        warn!("{} lane repair not possible: {}", mode, error);
        report.abort(error);
        return report;
    }

    let translator = ctx.translator();
    for lane in lanes {
        if report.aborted {
            break;
        }
        let (gpu_text, attempt) = match translator.hbm_lane_to_gpu(lane) {
            Ok(Some(gpu)) => (Some(gpu.to_string()), repair_lane(ctx, lane, mode)),
            Ok(None) => (None, Attempt::skipped("channel is floorswept")),
            Err(error) => (None, Attempt::failed(error, String::new())),
        };
        record(ctx, &mut report, RepairKind::Lane, mode, RepairTarget::Lane(*lane), gpu_text, attempt);
    }
    report
}

/// One lane under a single hold of the scan lock, guard hooks included
fn repair_lane(ctx: &RepairContext, lane: &HbmLane, mode: RepairMode) -> Attempt {
    let chain = ctx.chain();
    let mut values = String::new();
    let lock = match ScanLock::acquire(ctx.transport) {
        Ok(lock) => lock,
        Err(error) => return Attempt::failed(error, values),
    };
    match mode {
        RepairMode::Soft => {
            let result = soft_lane(ctx, &chain, &lock, lane, &mut values);
            Attempt::from_result(result, values)
        }
        RepairMode::Hard => {
            if let Err(error) = ctx.interface.pre_repair_hook(&chain, &lock, lane.site, mode) {
                return Attempt::failed(error, values);
            }
            let result = hard_lane(ctx, &chain, &lock, lane, &mut values);
            let post = ctx.interface.post_repair_hook(&chain, &lock, lane.site, mode);
            Attempt::from_result(result, values).close_guard(post)
        }
    }
}

/// Merge `lane` into a DWORD remap, overwriting an occupied pair only when
/// the availability check is skipped
fn merge_remap(ctx: &RepairContext, existing: u16, lane: &HbmLane) -> Result<u16> {
    let remap = lane_codec::encode_dword_remap(lane.byte, lane.repair);
    match lane_codec::merge_dword_remap(existing, remap, &lane.to_string()) {
        Err(HbmRepairError::SpareResourceExhausted { .. }) if ctx.settings.skip_availability_check => {
            warn!(
                "{}: byte pair already holds a repair ({:#06x}), overwriting it",
                lane, existing
            );
            Ok(lane_codec::force_dword_remap(existing, remap))
        }
        other => other,
    }
}

fn hard_lane(
    ctx: &RepairContext,
    chain: &ScanChain,
    _lock: &ScanLock,
    lane: &HbmLane,
    values: &mut String,
) -> Result<Completed> {
    let baseline = chain.read(WirType::HardLaneRepair, lane.site, lane.channel)?;
    let existing = lane_codec::dword_remap(&baseline, lane.dword);
    let merged = merge_remap(ctx, existing, lane)?;
    *values = format!("dword{} {:#06x} -> {:#06x}", lane.dword.value(), existing, merged);

    let mut target = baseline.clone();
    lane_codec::set_dword_remap(&mut target, lane.dword, merged);

    let written = match ctx.interface.overrides().lane_burn_order {
        LaneBurnOrder::Whole => chain.write(WirType::HardLaneRepair, lane.site, lane.channel, &target),
        LaneBurnOrder::NibbleOrdered => burn_nibbles(ctx, chain, lane, &baseline, &target),
    };
    let written = match written {
        Ok(WriteOutcome::SkippedDryRun) => return Ok(Completed::with(RepairStatus::DryRun)),
        Err(error) if error.is_batch_fatal() => return Err(error),
        other => other,
    };

    ctx.transport
        .sleep_ms(ctx.settings.burn_delay_ms(timing::HARD_LANE_BURN_DELAY_MS));
    reset_after_burn(ctx, lane.site)?;

    let after = chain.read(WirType::HardLaneRepair, lane.site, lane.channel)?;
    let observed = lane_codec::dword_remap(&after, lane.dword);
    debug!("{}: fuse readback {:#06x}", lane, observed);
    let verified = if observed == merged {
        Ok(())
    } else {
        Err(HbmRepairError::VerificationMismatch {
            location: lane.to_string(),
            expected: 1,
            actual: 0,
        })
    };

    written?;
    settle_verification(ctx, verified)
}

/// Burn one nibble per write, sentinel first
fn burn_nibbles(
    ctx: &RepairContext,
    chain: &ScanChain,
    lane: &HbmLane,
    baseline: &WdrData,
    target: &WdrData,
) -> Result<WriteOutcome> {
    let stages = lane_codec::nibble_ordered_stages(baseline, target, lane.dword, lane.byte);
    let mut outcome = WriteOutcome::Written;
    for (index, stage) in stages.iter().enumerate() {
        outcome = if index == 0 {
            chain.write(WirType::HardLaneRepair, lane.site, lane.channel, stage)?
        } else {
            chain.write_selected(WirType::HardLaneRepair, lane.site, lane.channel, stage)?
        };
        if outcome == WriteOutcome::SkippedDryRun {
            break;
        }
        ctx.transport.sleep_ms(timing::NIBBLE_BURN_DELAY_MS);
    }
    Ok(outcome)
}

fn soft_lane(
    ctx: &RepairContext,
    chain: &ScanChain,
    _lock: &ScanLock,
    lane: &HbmLane,
    values: &mut String,
) -> Result<Completed> {
    let location = ctx
        .transport
        .hbm_site_channel_to_hw_fbpa_subp(lane.site, lane.channel)?
        .ok_or_else(|| HbmRepairError::invalid_coordinate(format!("{} {} is floorswept", lane.site, lane.channel)))?;

    if ctx.interface.registry().supports(WirType::HardLaneRepair) {
        let fused = chain.read(WirType::HardLaneRepair, lane.site, lane.channel)?;
        let remap = lane_codec::encode_dword_remap(lane.byte, lane.repair);
        if lane_codec::dword_remap(&fused, lane.dword) & remap.mask == remap.value & remap.mask {
            return Err(HbmRepairError::AlreadyRepaired {
                location: lane.to_string(),
            });
        }
    }

    let baseline = chain.read(WirType::SoftLaneRepair, lane.site, lane.channel)?;
    let existing = lane_codec::dword_remap(&baseline, lane.dword);
    let merged = merge_remap(ctx, existing, lane)?;
    let subp_dword = Translator::subp_dword(lane.channel, lane.dword);
    *values = format!(
        "dword{} {:#06x} -> {:#06x} subp_dword{}",
        lane.dword.value(),
        existing,
        merged,
        subp_dword
    );

    let mut target = baseline;
    lane_codec::set_dword_remap(&mut target, lane.dword, merged);
    chain.write(WirType::SoftLaneRepair, lane.site, lane.channel, &target)?;
    ctx.transport.sleep_us(timing::SOFT_REPAIR_SETTLE_US);
    chain.write(WirType::Bypass, lane.site, lane.channel, &WdrData::zeroed(1))?;

    ctx.transport.set_gpu_lane_remap(location, subp_dword, merged)?;
    Ok(Completed::with(RepairStatus::Repaired))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Byte, Channel, Dword, FbpaSubp, LaneRepairType, LaneType, Site};
    use crate::dispatch::HbmInterface;
    use crate::hw::SimulatedHbm;
    use crate::settings::RepairSettings;
    use hr_vendor::{GpuArch, HbmDie, HbmModel, HbmVendor, SpecVersion};

    fn model(vendor: HbmVendor, spec_version: SpecVersion, die: HbmDie) -> HbmModel {
        HbmModel {
            vendor,
            spec_version,
            die,
            stack_height: 8,
            revision: 1,
        }
    }

    fn samsung_hbm2e() -> HbmModel {
        model(HbmVendor::Samsung, SpecVersion::Hbm2e, HbmDie::Standard)
    }

    fn hbm_lane(site: u32, channel: u32, dword: u32, byte: u32, repair: LaneRepairType) -> HbmLane {
        HbmLane {
            site: Site::new(site).unwrap(),
            channel: Channel::new(channel).unwrap(),
            dword: Dword::new(dword).unwrap(),
            byte: Byte::new(byte).unwrap(),
            repair,
        }
    }

    #[test]
    fn test_hard_lane_repair_burns_and_verifies() {
        let sim = SimulatedHbm::new(GpuArch::Ga100, samsung_hbm2e());
        let iface = HbmInterface::new(samsung_hbm2e(), GpuArch::Ga100).unwrap();
        let settings = RepairSettings::default();
        let ctx = RepairContext::new(&sim, &iface, &settings);

        let gpu = GpuLane {
            hw_fbpa: 0,
            subp: 0,
            lane_bit: 3,
            lane_type: LaneType::Data,
        };
        let report = repair_gpu_lanes(&ctx, &[gpu], RepairMode::Hard);
        assert!(report.is_success(), "{:?}", report.first_error);
        assert_eq!(report.outcomes[0].status, RepairStatus::Repaired);
        assert_eq!(
            report.outcomes[0].target,
            RepairTarget::Lane(hbm_lane(0, 0, 0, 0, LaneRepairType::Data(3)))
        );

        let site = Site::new(0).unwrap();
        let fused = sim.hard_lane_register(site, Channel::new(0).unwrap());
        assert_eq!(lane_codec::dword_remap(&fused, Dword::new(0).unwrap()), 0xFFA4);
        assert_eq!(sim.resets(), vec![site]);
        assert!(!sim.lock_held());
    }

    #[test]
    fn test_hard_lane_already_repaired() {
        let sim = SimulatedHbm::new(GpuArch::Ga100, samsung_hbm2e());
        let iface = HbmInterface::new(samsung_hbm2e(), GpuArch::Ga100).unwrap();
        let settings = RepairSettings::default();
        let ctx = RepairContext::new(&sim, &iface, &settings);
        sim.burn_lane_remap(Site::new(1).unwrap(), Channel::new(2).unwrap(), Dword::new(1).unwrap(), 0xFF9A);

        let lane = hbm_lane(1, 2, 1, 1, LaneRepairType::Dbi);
        let report = repair_hbm_lanes(&ctx, &[lane], RepairMode::Hard);
        assert_eq!(report.outcomes[0].status, RepairStatus::AlreadyRepaired);
        assert!(matches!(report.first_error, Some(HbmRepairError::AlreadyRepaired { .. })));
        assert!(sim.writes_of(WirType::HardLaneRepair).is_empty());
    }

    #[test]
    fn test_skhynix_lane_burn_is_nibble_ordered() {
        let hynix = model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard);
        let sim = SimulatedHbm::new(GpuArch::Ga100, hynix);
        let iface = HbmInterface::new(hynix, GpuArch::Ga100).unwrap();
        let settings = RepairSettings::default();
        let ctx = RepairContext::new(&sim, &iface, &settings);

        let lane = hbm_lane(2, 5, 3, 0, LaneRepairType::Data(3));
        let report = repair_hbm_lanes(&ctx, &[lane], RepairMode::Hard);
        assert!(report.is_success(), "{:?}", report.first_error);

        let burns = sim.writes_of(WirType::HardLaneRepair);
        assert_eq!(burns.len(), 2);
        assert!(!burns[0].data_only);
        assert!(burns[1].data_only);
        assert_eq!(lane_codec::dword_remap(&burns[0].data, lane.dword), 0xFFAF);
        assert_eq!(lane_codec::dword_remap(&burns[1].data, lane.dword), 0xFFA4);
        assert!(!sim.is_unlocked(lane.site));
    }

    #[test]
    fn test_hard_lane_holds_one_lock_across_guard() {
        let hynix = model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard);
        let sim = SimulatedHbm::new(GpuArch::Ga100, hynix);
        let iface = HbmInterface::new(hynix, GpuArch::Ga100).unwrap();
        let settings = RepairSettings::default();
        let ctx = RepairContext::new(&sim, &iface, &settings);

        let lanes = [
            hbm_lane(0, 1, 0, 0, LaneRepairType::Dbi),
            hbm_lane(3, 6, 2, 3, LaneRepairType::Data(5)),
        ];
        let report = repair_hbm_lanes(&ctx, &lanes, RepairMode::Hard);
        assert!(report.is_success(), "{:?}", report.first_error);
        assert_eq!(sim.lock_acquisitions(), 2);
        assert_eq!(sim.releases_with_guard_open(), 0);
        assert!(!sim.lock_held());
    }

    #[test]
    fn test_dry_run_leaves_fuses_untouched() {
        let sim = SimulatedHbm::new(GpuArch::Ga100, samsung_hbm2e());
        let iface = HbmInterface::new(samsung_hbm2e(), GpuArch::Ga100).unwrap();
        let settings = RepairSettings {
            dry_run: true,
            ..Default::default()
        };
        let ctx = RepairContext::new(&sim, &iface, &settings);

        let lane = hbm_lane(0, 1, 0, 2, LaneRepairType::Dm);
        let report = repair_hbm_lanes(&ctx, &[lane], RepairMode::Hard);
        assert!(report.is_success());
        assert_eq!(report.outcomes[0].status, RepairStatus::DryRun);
        assert!(sim.writes_of(WirType::HardLaneRepair).is_empty());
        assert!(sim.resets().is_empty());
    }

    #[test]
    fn test_bdie_hard_lane_aborts_before_hardware() {
        let bdie = model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::BDie);
        let sim = SimulatedHbm::new(GpuArch::Gv100, bdie);
        let iface = HbmInterface::new(bdie, GpuArch::Gv100).unwrap();
        let settings = RepairSettings::default();
        let ctx = RepairContext::new(&sim, &iface, &settings);

        let report = repair_hbm_lanes(&ctx, &[hbm_lane(0, 0, 0, 0, LaneRepairType::Dbi)], RepairMode::Hard);
        assert!(report.aborted);
        assert!(report.outcomes.is_empty());
        assert!(matches!(report.first_error, Some(HbmRepairError::UnsupportedOperation(_))));
        assert_eq!(sim.lock_acquisitions(), 0);
    }

    #[test]
    fn test_soft_lane_programs_gpu_remap() {
        let sim = SimulatedHbm::new(GpuArch::Ga100, samsung_hbm2e());
        let iface = HbmInterface::new(samsung_hbm2e(), GpuArch::Ga100).unwrap();
        let settings = RepairSettings::default();
        let ctx = RepairContext::new(&sim, &iface, &settings);

        // site 1 channel 3 sits on fbpa 2 subp 1, odd half of the subpartition
        let lane = hbm_lane(1, 3, 2, 3, LaneRepairType::Data(7));
        let report = repair_hbm_lanes(&ctx, &[lane], RepairMode::Soft);
        assert!(report.is_success(), "{:?}", report.first_error);

        let soft = sim.soft_lane_register(lane.site, lane.channel);
        assert_eq!(lane_codec::dword_remap(&soft, lane.dword), 0x8AFF);
        assert_eq!(sim.gpu_lane_remap(FbpaSubp { hw_fbpa: 2, subp: 1 }, 6), Some(0x8AFF));
        assert_eq!(sim.writes_of(WirType::Bypass).len(), 1);
        assert!(sim.resets().is_empty());
    }

    #[test]
    fn test_occupied_pair_needs_skip_policy() {
        let sim = SimulatedHbm::new(GpuArch::Ga100, samsung_hbm2e());
        let iface = HbmInterface::new(samsung_hbm2e(), GpuArch::Ga100).unwrap();
        let strict = RepairSettings::default();
        let ctx = RepairContext::new(&sim, &iface, &strict);

        let first = hbm_lane(0, 0, 0, 0, LaneRepairType::Data(1));
        let partner = hbm_lane(0, 0, 0, 1, LaneRepairType::Data(2));
        assert!(repair_hbm_lanes(&ctx, &[first], RepairMode::Soft).is_success());
        let report = repair_hbm_lanes(&ctx, &[partner], RepairMode::Soft);
        assert!(matches!(report.first_error, Some(HbmRepairError::SpareResourceExhausted { .. })));

        let lenient = RepairSettings {
            skip_availability_check: true,
            ..Default::default()
        };
        let ctx = RepairContext::new(&sim, &iface, &lenient);
        let report = repair_hbm_lanes(&ctx, &[partner], RepairMode::Soft);
        assert!(report.is_success());
        let soft = sim.soft_lane_register(first.site, first.channel);
        assert_eq!(lane_codec::dword_remap(&soft, first.dword), 0xFF3A);
    }
}
