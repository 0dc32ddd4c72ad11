/*
 * Integration tests for hbm-repair
 *
 * These tests drive whole repair batches through an HbmDevice backed by the
 * simulated HBM transport.
 */

use hbm_repair::codec::lane::dword_remap;
use hbm_repair::{
    Bank, Channel, DieVariant, Dword, FbpaSubp, GpuArch, GpuLane, GpuRow, HbmDevice, HbmDie, HbmLane,
    HbmModel, HbmRepairError, HbmRow, HbmVendor, LaneRepairType, LaneType, RepairMode, RepairSettings,
    RepairStatus, RepairTarget, Row, SimulatedHbm, Site, SpecVersion, Stack, WirType,
};
use std::io::Write;

fn model(vendor: HbmVendor, spec_version: SpecVersion, die: HbmDie, revision: u8) -> HbmModel {
    HbmModel {
        vendor,
        spec_version,
        die,
        stack_height: 8,
        revision,
    }
}

fn samsung_hbm2e() -> HbmModel {
    model(HbmVendor::Samsung, SpecVersion::Hbm2e, HbmDie::Standard, 0)
}

fn every_variant() -> Vec<(HbmModel, GpuArch)> {
    vec![
        (model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::BDie, 0), GpuArch::Gv100),
        (model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::XDie, 0), GpuArch::Gv100),
        (model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::XDie, 0), GpuArch::Ga100),
        (samsung_hbm2e(), GpuArch::Ga100),
        (model(HbmVendor::SkHynix, SpecVersion::Hbm2, HbmDie::Standard, 1), GpuArch::Gv100),
        (model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard, 0), GpuArch::Ga100),
        (model(HbmVendor::Micron, SpecVersion::Hbm2e, HbmDie::Standard, 0), GpuArch::Ga100),
    ]
}

fn open(model: HbmModel, arch: GpuArch, settings: RepairSettings) -> HbmDevice<SimulatedHbm> {
    HbmDevice::open(SimulatedHbm::new(arch, model), arch, settings).unwrap()
}

fn hbm_row(site: u32, stack: u32, channel: u32, bank: u32, row: u32) -> HbmRow {
    HbmRow {
        site: Site::new(site).unwrap(),
        stack: Stack::new(stack).unwrap(),
        channel: Channel::new(channel).unwrap(),
        bank: Bank::new(bank).unwrap(),
        row: Row::new(row).unwrap(),
    }
}

fn spares(device: &HbmDevice<SimulatedHbm>, row: &HbmRow) -> u32 {
    device
        .available_spare_rows(row.site, row.stack, row.channel, row.bank)
        .unwrap()
}

#[test]
fn test_hard_row_repair_consumes_one_spare_on_every_variant() {
    for (model, arch) in every_variant() {
        let device = open(model, arch, RepairSettings::default());
        let target = hbm_row(1, 1, 5, 3, 0x1234);
        let same_channel = hbm_row(1, 1, 5, 4, 0x1234);
        let other_stack = hbm_row(1, 0, 5, 3, 0x1234);

        let before = spares(&device, &target);
        assert!(before > 0, "{}", device.variant());
        let untouched = (spares(&device, &same_channel), spares(&device, &other_stack));

        let report = device.repair_hbm_rows(&[target], RepairMode::Hard);
        assert!(report.is_success(), "{}: {:?}", device.variant(), report.first_error);
        assert_eq!(report.outcomes[0].status, RepairStatus::Repaired);

        assert_eq!(spares(&device, &target), before - 1, "{}", device.variant());
        assert_eq!(
            (spares(&device, &same_channel), spares(&device, &other_stack)),
            untouched
        );
        assert_eq!(
            device.read_row_repairs(target.site, target.stack, target.channel, target.bank).unwrap(),
            vec![target.row]
        );
        assert!(!device.transport().lock_held());
    }
}

#[test]
fn test_skhynix_neighbour_rows_repaired_once() {
    let hynix = model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard, 0);
    let device = open(hynix, GpuArch::Ga100, RepairSettings::default());

    let gpu_row = |row: u32| GpuRow {
        hw_fbpa: 0,
        subp: 0,
        subp_channel: 1,
        rank: 0,
        bank: 6,
        row,
    };
    let report = device.repair_rows(&[gpu_row(0x400), gpu_row(0x401)], RepairMode::Hard);
    assert!(report.is_success(), "{:?}", report.first_error);

    let first = match report.outcomes[0].target {
        RepairTarget::Row(row) => row,
        other => panic!("unexpected target {:?}", other),
    };
    assert_eq!(report.outcomes[0].status, RepairStatus::Repaired);
    assert_eq!(report.outcomes[1].status, RepairStatus::ImplicitlyRepaired { by: first });
    assert_eq!(spares(&device, &first), 1);
    assert_eq!(device.transport().writes_of(WirType::HardRowRepair).len(), 2);
}

#[test]
fn test_hard_row_runs_under_one_lock_hold() {
    let hynix = model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard, 0);
    let device = open(hynix, GpuArch::Ga100, RepairSettings::default());
    let opened_with = device.transport().lock_acquisitions();

    let row = GpuRow {
        hw_fbpa: 2,
        subp: 1,
        subp_channel: 0,
        rank: 0,
        bank: 9,
        row: 0x1F0,
    };
    let report = device.repair_rows(&[row], RepairMode::Hard);
    assert!(report.is_success(), "{:?}", report.first_error);
    assert_eq!(device.transport().lock_acquisitions(), opened_with + 1);
    assert_eq!(device.transport().releases_with_guard_open(), 0);
}

#[test]
fn test_batch_continues_after_exhausted_bank() {
    let device = open(samsung_hbm2e(), GpuArch::Ga100, RepairSettings::default());
    let rows = [
        hbm_row(0, 0, 0, 0, 0x10),
        hbm_row(0, 0, 0, 1, 0x20),
        hbm_row(0, 0, 0, 2, 0x30),
    ];
    let exhausted = rows[1];
    device
        .transport()
        .exhaust_bank(exhausted.site, exhausted.stack, exhausted.channel, exhausted.bank);

    let report = device.repair_hbm_rows(&rows, RepairMode::Hard);
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.outcomes[0].status, RepairStatus::Repaired);
    assert!(matches!(report.outcomes[1].status, RepairStatus::Failed(_)));
    assert_eq!(report.outcomes[2].status, RepairStatus::Repaired);
    match report.into_result() {
        Err(HbmRepairError::SpareResourceExhausted { location }) => {
            assert_eq!(location, exhausted.to_string())
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_dry_run_burns_nothing() {
    let settings = RepairSettings {
        dry_run: true,
        ..Default::default()
    };
    let hynix = model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard, 0);
    let device = open(hynix, GpuArch::Ga100, settings);
    let target = hbm_row(2, 1, 7, 8, 0x222);
    let before = spares(&device, &target);

    let rows = device.repair_hbm_rows(&[target], RepairMode::Hard);
    let lane = HbmLane {
        site: target.site,
        channel: target.channel,
        dword: Dword::new(0).unwrap(),
        byte: hbm_repair::Byte::new(2).unwrap(),
        repair: LaneRepairType::Data(5),
    };
    let lanes = device.repair_hbm_lanes(&[lane], RepairMode::Hard);

    assert_eq!(rows.outcomes[0].status, RepairStatus::DryRun);
    assert_eq!(lanes.outcomes[0].status, RepairStatus::DryRun);
    assert_eq!(spares(&device, &target), before);
    let sim = device.transport();
    assert!(sim.writes_of(WirType::HardRowRepair).is_empty());
    assert!(sim.writes_of(WirType::HardLaneRepair).is_empty());
    assert!(sim.resets().is_empty());
    assert!(!sim.is_unlocked(target.site));
}

#[test]
fn test_ignore_policy_reports_lane_mismatch() {
    let settings = RepairSettings {
        ignore_verification_result: true,
        burn_delay_ms: Some(10),
        ..Default::default()
    };
    let mut device = open(samsung_hbm2e(), GpuArch::Ga100, settings);
    device.transport().set_drop_fuse_burns(true);

    let lane = HbmLane {
        site: Site::new(3).unwrap(),
        channel: Channel::new(1).unwrap(),
        dword: Dword::new(2).unwrap(),
        byte: hbm_repair::Byte::new(0).unwrap(),
        repair: LaneRepairType::Dbi,
    };
    let report = device.repair_hbm_lanes(&[lane], RepairMode::Hard);
    assert!(report.is_success());
    let note = report.outcomes[0].verification_mismatch.clone().unwrap();
    assert!(note.contains("Verification mismatch"));

    let mut strict = device.settings().clone();
    strict.ignore_verification_result = false;
    device.set_settings(strict).unwrap();
    let report = device.repair_hbm_lanes(&[lane], RepairMode::Hard);
    assert!(matches!(report.first_error, Some(HbmRepairError::VerificationMismatch { .. })));
}

#[test]
fn test_bdie_hard_lanes_rejected_before_scan_access() {
    let bdie = model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::BDie, 0);
    let device = open(bdie, GpuArch::Gv100, RepairSettings::default());
    assert_eq!(device.variant(), DieVariant::SamsungBDie);
    let opened_with = device.transport().lock_acquisitions();

    let lane = GpuLane {
        hw_fbpa: 0,
        subp: 0,
        lane_bit: 17,
        lane_type: LaneType::Data,
    };
    let report = device.repair_lanes(&[lane, lane], RepairMode::Hard);
    assert!(report.aborted);
    assert!(report.outcomes.is_empty());
    assert!(matches!(report.first_error, Some(HbmRepairError::UnsupportedOperation(_))));
    assert_eq!(device.transport().lock_acquisitions(), opened_with);

    assert!(device.repair_lanes(&[lane], RepairMode::Soft).is_success());
}

#[test]
fn test_floorswept_lane_is_skipped() {
    let sim = SimulatedHbm::new(GpuArch::Ga100, samsung_hbm2e());
    sim.floorsweep_site(Site::new(2).unwrap());
    let device = HbmDevice::open(sim, GpuArch::Ga100, RepairSettings::default()).unwrap();

    let swept = GpuLane {
        hw_fbpa: 4,
        subp: 1,
        lane_bit: 40,
        lane_type: LaneType::Data,
    };
    let report = device.repair_lanes(&[swept], RepairMode::Soft);
    assert!(report.is_success());
    assert_eq!(report.outcomes[0].target, RepairTarget::UnmappedLane(swept));
    assert!(matches!(report.outcomes[0].status, RepairStatus::Skipped(_)));
}

#[test]
fn test_soft_dbi_lane_reprograms_gpu_side() {
    let device = open(samsung_hbm2e(), GpuArch::Ga100, RepairSettings::default());
    // byte 13 of the bus of fbpa 2 subp 1: DWORD 3, byte 1 of site 1 channel 2
    let lane = GpuLane {
        hw_fbpa: 2,
        subp: 1,
        lane_bit: 13,
        lane_type: LaneType::Dbi,
    };
    let report = device.repair_lanes(&[lane], RepairMode::Soft);
    assert!(report.is_success(), "{:?}", report.first_error);

    let site = Site::new(1).unwrap();
    let channel = Channel::new(2).unwrap();
    let soft = device.transport().soft_lane_register(site, channel);
    assert_eq!(dword_remap(&soft, Dword::new(3).unwrap()), 0xFF9A);
    assert_eq!(
        device.transport().gpu_lane_remap(FbpaSubp { hw_fbpa: 2, subp: 1 }, 3),
        Some(0xFF9A)
    );
    assert_eq!(device.read_lane_repairs(site, channel, RepairMode::Soft).unwrap().len(), 1);
}

#[test]
fn test_hard_transport_failure_aborts_batch() {
    let device = open(samsung_hbm2e(), GpuArch::Ga100, RepairSettings::default());
    device.transport().fail_next_write(WirType::HardRowRepair, true);

    let rows = [hbm_row(0, 0, 2, 0, 0x50), hbm_row(0, 0, 2, 1, 0x60)];
    let report = device.repair_hbm_rows(&rows, RepairMode::Hard);
    assert!(report.aborted);
    assert_eq!(report.outcomes.len(), 1);
    assert!(matches!(report.first_error, Some(HbmRepairError::TransportHardFailure(_))));
    assert!(!device.transport().lock_held());
}

#[test]
fn test_transient_failure_stays_with_its_row() {
    let device = open(samsung_hbm2e(), GpuArch::Ga100, RepairSettings::default());
    device.transport().fail_next_write(WirType::HardRowRepair, false);

    let rows = [hbm_row(0, 0, 2, 0, 0x50), hbm_row(0, 0, 2, 1, 0x60)];
    let report = device.repair_hbm_rows(&rows, RepairMode::Hard);
    assert!(!report.aborted);
    assert!(matches!(report.first_error, Some(HbmRepairError::Transport(_))));
    assert_eq!(report.outcomes[1].status, RepairStatus::Repaired);
}

#[test]
fn test_settings_file_drives_device() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"dry_run": true, "burn_delay_ms": 900}}"#).unwrap();
    let settings = RepairSettings::load(file.path()).unwrap();

    let device = open(samsung_hbm2e(), GpuArch::Ga100, settings);
    assert!(device.settings().dry_run);
    let report = device.repair_hbm_rows(&[hbm_row(4, 0, 3, 3, 0x77)], RepairMode::Hard);
    assert_eq!(report.outcomes[0].status, RepairStatus::DryRun);
}
