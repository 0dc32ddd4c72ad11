//! In-memory HBM die model
//!
//! `SimulatedHbm` implements `Transport` on top of a small model of the
//! repair-relevant die state: lane remap registers, spare-row fuses, soft row
//! remaps and the vendor fuse guards. Fuse bits only ever change from 1 to 0,
//! soft state is lost on site reset, and every scan access must happen under
//! the chain lock. Delays are accumulated instead of slept.
//!
//! Used by the test suites and for exercising repair flows without a GPU.

use hr_vendor::{resolve_variant, skhynix, DieVariant, GpuArch, HbmModel, HbmVendor, VariantProfile};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use super::transport::Transport;
use crate::codec::{lane as lane_codec, row as row_codec, scan as scan_codec};
use crate::codec::{RowFuseFields, SpareSlot, SpareState};
use crate::constants::arch::{self, ArchParams};
use crate::constants::lane;
use crate::data::{Bank, Channel, Dword, FbpaSubp, PseudoChannel, Row, Site, Stack, WdrData};
use crate::error::{HbmRepairError, Result};
use crate::wir::{Wir, WirType};

/// One shifted WDR value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimWrite {
    pub wir_type: WirType,
    pub site: Site,
    pub channel: Channel,
    pub data: WdrData,
    /// Shifted into an already selected WIR
    pub data_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InjectedFailure {
    Transient,
    Hard,
}

type ChannelKey = (Site, Channel);

#[derive(Default)]
struct SimState {
    lock_held: bool,
    lock_acquisitions: u32,
    releases_with_guard_open: u32,
    floorswept: HashSet<Site>,
    site_models: HashMap<Site, HbmModel>,
    selected: HashMap<ChannelKey, Wir>,
    scan_select: HashMap<ChannelKey, WdrData>,
    soft_lanes: HashMap<ChannelKey, WdrData>,
    hard_lanes: HashMap<ChannelKey, WdrData>,
    row_fuses: HashMap<(Site, Channel, SpareSlot), Row>,
    soft_row_regs: HashMap<ChannelKey, WdrData>,
    soft_rows: HashSet<(Site, Channel, RowFuseFields)>,
    unlocked: HashSet<Site>,
    repair_mode: HashSet<Site>,
    gpu_remaps: HashMap<(FbpaSubp, u32), u16>,
    writes: Vec<SimWrite>,
    resets: Vec<Site>,
    slept_us: u64,
    failures: HashMap<WirType, InjectedFailure>,
    drop_fuse_burns: bool,
}

pub struct SimulatedHbm {
    params: ArchParams,
    model: HbmModel,
    variant: Option<DieVariant>,
    serial: u32,
    state: Mutex<SimState>,
}

impl SimulatedHbm {
    /// Model `arch` populated with `model` stacks on every site
    ///
    /// Unsupported models are accepted so that device bring-up can be
    /// exercised; their repair registers are simply absent.
    pub fn new(arch: GpuArch, model: HbmModel) -> Self {
        Self {
            params: arch::params(arch),
            model,
            variant: resolve_variant(&model, arch).ok(),
            serial: 0x5EED,
            state: Mutex::new(SimState::default()),
        }
    }

    pub fn variant(&self) -> Option<DieVariant> {
        self.variant
    }

    pub fn floorsweep_site(&self, site: Site) {
        self.state.lock().floorswept.insert(site);
    }

    /// Report a different DEVICE_ID on one site
    pub fn set_site_model(&self, site: Site, model: HbmModel) {
        self.state.lock().site_models.insert(site, model);
    }

    /// Mark a spare as consumed by an earlier repair
    pub fn burn_spare_row(&self, site: Site, channel: Channel, slot: SpareSlot, row: Row) {
        self.state.lock().row_fuses.insert((site, channel, slot), row);
    }

    /// Consume every spare of a bank in both pseudo-channels
    pub fn exhaust_bank(&self, site: Site, stack: Stack, channel: Channel, bank: Bank) {
        let slots = self.profile().map(|p| p.spare_slots_per_bank).unwrap_or(0);
        let mut state = self.state.lock();
        for pseudo_channel in PseudoChannel::all() {
            for slot in 0..slots {
                let spare = SpareSlot {
                    stack,
                    pseudo_channel,
                    bank,
                    slot,
                };
                let row = Row::new(0x100 + 2 * slot as u32).unwrap_or_default();
                state.row_fuses.insert((site, channel, spare), row);
            }
        }
    }

    /// Pre-burn one DWORD of the hard lane register
    pub fn burn_lane_remap(&self, site: Site, channel: Channel, dword: Dword, value: u16) {
        let mut state = self.state.lock();
        let register = state
            .hard_lanes
            .entry((site, channel))
            .or_insert_with(lane_codec::empty_lane_wdr);
        let merged = lane_codec::dword_remap(register, dword) & value;
        lane_codec::set_dword_remap(register, dword, merged);
    }

    /// Fail the next write of `wir_type`
    pub fn fail_next_write(&self, wir_type: WirType, hard: bool) {
        let failure = if hard {
            InjectedFailure::Hard
        } else {
            InjectedFailure::Transient
        };
        self.state.lock().failures.insert(wir_type, failure);
    }

    /// Accept fuse burn commands without burning anything
    pub fn set_drop_fuse_burns(&self, drop: bool) {
        self.state.lock().drop_fuse_burns = drop;
    }

    pub fn writes(&self) -> Vec<SimWrite> {
        self.state.lock().writes.clone()
    }

    pub fn writes_of(&self, wir_type: WirType) -> Vec<SimWrite> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|w| w.wir_type == wir_type)
            .cloned()
            .collect()
    }

    pub fn resets(&self) -> Vec<Site> {
        self.state.lock().resets.clone()
    }

    pub fn lock_held(&self) -> bool {
        self.state.lock().lock_held
    }

    pub fn lock_acquisitions(&self) -> u32 {
        self.state.lock().lock_acquisitions
    }

    /// Times the chain lock was released while a fuse guard was still open
    pub fn releases_with_guard_open(&self) -> u32 {
        self.state.lock().releases_with_guard_open
    }

    pub fn total_sleep_us(&self) -> u64 {
        self.state.lock().slept_us
    }

    pub fn soft_lane_register(&self, site: Site, channel: Channel) -> WdrData {
        self.state
            .lock()
            .soft_lanes
            .get(&(site, channel))
            .cloned()
            .unwrap_or_else(lane_codec::empty_lane_wdr)
    }

    pub fn hard_lane_register(&self, site: Site, channel: Channel) -> WdrData {
        self.state
            .lock()
            .hard_lanes
            .get(&(site, channel))
            .cloned()
            .unwrap_or_else(lane_codec::empty_lane_wdr)
    }

    pub fn gpu_lane_remap(&self, location: FbpaSubp, subp_dword: u32) -> Option<u16> {
        self.state.lock().gpu_remaps.get(&(location, subp_dword)).copied()
    }

    /// Rows burned into spares of one channel
    pub fn burned_rows(&self, site: Site, channel: Channel) -> Vec<(SpareSlot, Row)> {
        let mut rows: Vec<_> = self
            .state
            .lock()
            .row_fuses
            .iter()
            .filter(|((s, c, _), _)| *s == site && *c == channel)
            .map(|((_, _, slot), row)| (*slot, *row))
            .collect();
        rows.sort_by_key(|(slot, row)| (slot.stack, slot.pseudo_channel, slot.bank, slot.slot, *row));
        rows
    }

    pub fn has_soft_row(&self, site: Site, channel: Channel, fields: &RowFuseFields) -> bool {
        self.state.lock().soft_rows.contains(&(site, channel, *fields))
    }

    pub fn is_unlocked(&self, site: Site) -> bool {
        self.state.lock().unlocked.contains(&site)
    }

    pub fn in_repair_mode(&self, site: Site) -> bool {
        self.state.lock().repair_mode.contains(&site)
    }

    fn profile(&self) -> Result<&'static VariantProfile> {
        self.variant
            .map(hr_vendor::profile)
            .ok_or_else(|| HbmRepairError::transport(format!("{} has no repair registers", self.model)))
    }

    fn site_present(&self, state: &SimState, site: Site) -> bool {
        site.value() < self.params.sites && !state.floorswept.contains(&site)
    }

    fn check_access(&self, state: &SimState, site: Site) -> Result<()> {
        if !state.lock_held {
            return Err(HbmRepairError::transport("scan access without the chain lock"));
        }
        if !self.site_present(state, site) {
            return Err(HbmRepairError::transport(format!("{} is not present", site)));
        }
        Ok(())
    }

    fn take_failure(state: &mut SimState, wir_type: WirType) -> Result<()> {
        match state.failures.remove(&wir_type) {
            Some(InjectedFailure::Transient) => Err(HbmRepairError::transport(format!(
                "injected failure writing {}",
                wir_type
            ))),
            Some(InjectedFailure::Hard) => Err(HbmRepairError::TransportHardFailure(format!(
                "injected chain failure writing {}",
                wir_type
            ))),
            None => Ok(()),
        }
    }

    fn check_fuse_guard(&self, state: &SimState, site: Site) -> Result<()> {
        match self.variant.map(DieVariant::vendor) {
            Some(HbmVendor::SkHynix) if !state.unlocked.contains(&site) => {
                Err(HbmRepairError::transport(format!("{} fuse programming is locked", site)))
            }
            Some(HbmVendor::Micron) if !state.repair_mode.contains(&site) => {
                Err(HbmRepairError::transport(format!("{} is not in repair mode", site)))
            }
            _ => Ok(()),
        }
    }

    fn write_selected(&self, state: &mut SimState, wir: &Wir, site: Site, channel: Channel, data: &WdrData) -> Result<()> {
        let key = (site, channel);
        match wir.wir_type {
            WirType::Bypass => Ok(()),
            WirType::DeviceId => Err(HbmRepairError::transport("DEVICE_ID is read-only")),
            WirType::SoftLaneRepair => {
                state.soft_lanes.insert(key, data.clone());
                Ok(())
            }
            WirType::HardLaneRepair => self.burn_lanes(state, site, channel, data),
            WirType::HardRowRepair => self.burn_row(state, site, channel, data),
            WirType::SoftRowRepair => {
                if let Some(fields) = row_codec::decode_soft_row(data)? {
                    state.soft_rows.insert((site, channel, fields));
                }
                state.soft_row_regs.insert(key, data.clone());
                Ok(())
            }
            WirType::SpareRowScan => {
                scan_codec::decode_scan_select(self.profile()?, data)?;
                state.scan_select.insert(key, data.clone());
                Ok(())
            }
            WirType::RepairUnlock => {
                if data.to_u64() == u64::from(skhynix::REPAIR_UNLOCK_KEY) {
                    state.unlocked.insert(site);
                } else {
                    state.unlocked.remove(&site);
                }
                Ok(())
            }
            WirType::RepairMode => {
                if data.bit(0) {
                    state.repair_mode.insert(site);
                } else {
                    state.repair_mode.remove(&site);
                }
                Ok(())
            }
        }
    }

    fn burn_lanes(&self, state: &mut SimState, site: Site, channel: Channel, data: &WdrData) -> Result<()> {
        self.check_fuse_guard(state, site)?;
        let current = state
            .hard_lanes
            .get(&(site, channel))
            .cloned()
            .unwrap_or_else(lane_codec::empty_lane_wdr);

        let restored = data.bits_set_over(&current);
        if !restored.is_empty() {
            return Err(HbmRepairError::transport(format!(
                "cannot restore burned lane fuse bits {:?}",
                restored
            )));
        }

        if self.variant.map(DieVariant::vendor) == Some(HbmVendor::SkHynix) {
            let changed: Vec<u32> = (0..lane::LANE_REMAP_WDR_WIDTH / 4)
                .map(|n| n * 4)
                .filter(|&offset| data.field(offset, 4) != current.field(offset, 4))
                .collect();
            if changed.len() > 1 {
                return Err(HbmRepairError::transport("lane fuses burn one nibble at a time"));
            }
            if let Some(&offset) = changed.first() {
                let partner = offset ^ 4;
                if data.field(offset, 4) != u64::from(lane::PAIRED_BYTE_SENTINEL)
                    && current.field(partner, 4) == u64::from(lane::NIBBLE_UNSET)
                {
                    return Err(HbmRepairError::transport(
                        "repair-type nibble burned before its sentinel",
                    ));
                }
            }
        }

        if !state.drop_fuse_burns {
            state.hard_lanes.insert((site, channel), data.clone());
        }
        Ok(())
    }

    fn burn_row(&self, state: &mut SimState, site: Site, channel: Channel, data: &WdrData) -> Result<()> {
        self.check_fuse_guard(state, site)?;
        let profile = self.profile()?;
        let fields = row_codec::decode_hard_row(profile, data)?;
        if fields.stack.value() >= self.model.stack_count() {
            return Err(HbmRepairError::transport(format!("{} not populated", fields.stack)));
        }

        let slot_key = |slot: usize| {
            (
                site,
                channel,
                SpareSlot {
                    stack: fields.stack,
                    pseudo_channel: fields.pseudo_channel,
                    bank: fields.bank,
                    slot,
                },
            )
        };
        let slot = match fields.fuse_index {
            Some(index) => index as usize,
            None => (0..profile.spare_slots_per_bank)
                .find(|&slot| !state.row_fuses.contains_key(&slot_key(slot)))
                .ok_or_else(|| HbmRepairError::transport("no spare row left to burn"))?,
        };
        if state.row_fuses.contains_key(&slot_key(slot)) {
            return Err(HbmRepairError::transport(format!("spare slot {} already burned", slot)));
        }

        if !state.drop_fuse_burns {
            debug!("Burned {} {} {:?} -> row {:#x}", site, channel, slot_key(slot).2, fields.row.value());
            state.row_fuses.insert(slot_key(slot), fields.row);
        }
        Ok(())
    }

    fn read_selected(&self, state: &SimState, wir: &Wir, site: Site, channel: Channel) -> Result<WdrData> {
        let key = (site, channel);
        match wir.wir_type {
            WirType::DeviceId => {
                let model = state.site_models.get(&site).copied().unwrap_or(self.model);
                Ok(WdrData::from_words(
                    wir.bit_width,
                    &[model.to_device_id(), self.serial + site.value(), 0],
                ))
            }
            WirType::SoftLaneRepair => Ok(state
                .soft_lanes
                .get(&key)
                .cloned()
                .unwrap_or_else(lane_codec::empty_lane_wdr)),
            WirType::HardLaneRepair => Ok(state
                .hard_lanes
                .get(&key)
                .cloned()
                .unwrap_or_else(lane_codec::empty_lane_wdr)),
            WirType::SoftRowRepair => Ok(state
                .soft_row_regs
                .get(&key)
                .cloned()
                .unwrap_or_else(|| WdrData::zeroed(wir.bit_width))),
            WirType::SpareRowScan => {
                let profile = self.profile()?;
                let select = state
                    .scan_select
                    .get(&key)
                    .ok_or_else(|| HbmRepairError::transport("spare scan read without a select"))?;
                let slot = scan_codec::decode_scan_select(profile, select)?;
                let spare = match state.row_fuses.get(&(site, channel, slot)) {
                    Some(row) => SpareState::Consumed { row: *row },
                    None => SpareState::Available,
                };
                Ok(scan_codec::encode_spare_readback(profile, select, spare))
            }
            other => Err(HbmRepairError::transport(format!("{} is write-only", other))),
        }
    }
}

impl Transport for SimulatedHbm {
    fn wir_write(&self, wir: &Wir, site: Site, channel: Channel, data: &WdrData) -> Result<()> {
        let mut state = self.state.lock();
        self.check_access(&state, site)?;
        Self::take_failure(&mut state, wir.wir_type)?;
        trace!("sim: {} {} {} <- {}", wir, site, channel, data);
        state.writes.push(SimWrite {
            wir_type: wir.wir_type,
            site,
            channel,
            data: data.clone(),
            data_only: false,
        });
        state.selected.insert((site, channel), *wir);
        self.write_selected(&mut state, wir, site, channel, data)
    }

    fn wir_read(&self, wir: &Wir, site: Site, channel: Channel) -> Result<WdrData> {
        let mut state = self.state.lock();
        self.check_access(&state, site)?;
        state.selected.insert((site, channel), *wir);
        self.read_selected(&state, wir, site, channel)
    }

    fn wdr_write(&self, site: Site, channel: Channel, data: &WdrData) -> Result<()> {
        let mut state = self.state.lock();
        self.check_access(&state, site)?;
        let wir = *state
            .selected
            .get(&(site, channel))
            .ok_or_else(|| HbmRepairError::transport("WDR write with no WIR selected"))?;
        Self::take_failure(&mut state, wir.wir_type)?;
        state.writes.push(SimWrite {
            wir_type: wir.wir_type,
            site,
            channel,
            data: data.clone(),
            data_only: true,
        });
        self.write_selected(&mut state, &wir, site, channel, data)
    }

    fn wdr_read_raw(&self, site: Site, channel: Channel, bit_width: u32) -> Result<WdrData> {
        let state = self.state.lock();
        self.check_access(&state, site)?;
        let wir = state
            .selected
            .get(&(site, channel))
            .ok_or_else(|| HbmRepairError::transport("WDR read with no WIR selected"))?;
        let data = self.read_selected(&state, wir, site, channel)?;
        if data.bit_width() != bit_width {
            return Err(HbmRepairError::transport(format!(
                "{} holds {} bits, {} requested",
                wir,
                data.bit_width(),
                bit_width
            )));
        }
        Ok(data)
    }

    fn acquire_scan_lock(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.lock_held {
            return Err(HbmRepairError::ScanLockHeld);
        }
        state.lock_held = true;
        state.lock_acquisitions += 1;
        Ok(())
    }

    fn release_scan_lock(&self) {
        let mut state = self.state.lock();
        if !state.unlocked.is_empty() || !state.repair_mode.is_empty() {
            state.releases_with_guard_open += 1;
        }
        state.lock_held = false;
    }

    fn reset_site(&self, site: Site) -> Result<()> {
        let mut state = self.state.lock();
        if !self.site_present(&state, site) {
            return Err(HbmRepairError::transport(format!("{} is not present", site)));
        }
        state.soft_lanes.retain(|(s, _), _| *s != site);
        state.soft_row_regs.retain(|(s, _), _| *s != site);
        state.soft_rows.retain(|(s, _, _)| *s != site);
        state.selected.retain(|(s, _), _| *s != site);
        state.scan_select.retain(|(s, _), _| *s != site);
        state.unlocked.remove(&site);
        state.repair_mode.remove(&site);
        state.resets.push(site);
        debug!("sim: reset {}", site);
        Ok(())
    }

    fn sleep_ms(&self, ms: u64) {
        self.state.lock().slept_us += ms * 1000;
    }

    fn sleep_us(&self, us: u64) {
        self.state.lock().slept_us += us;
    }

    fn hbm_site_master_fbpa(&self, site: Site) -> Result<Option<u32>> {
        let state = self.state.lock();
        Ok(self
            .site_present(&state, site)
            .then(|| site.value() * arch::FBPAS_PER_SITE))
    }

    fn hbm_site_channel_to_hw_fbpa_subp(&self, site: Site, channel: Channel) -> Result<Option<FbpaSubp>> {
        let state = self.state.lock();
        if !self.site_present(&state, site) {
            return Ok(None);
        }
        let channels_per_fbpa = arch::CHANNELS_PER_SITE / arch::FBPAS_PER_SITE;
        Ok(Some(FbpaSubp {
            hw_fbpa: site.value() * arch::FBPAS_PER_SITE + channel.value() / channels_per_fbpa,
            subp: (channel.value() % channels_per_fbpa) / arch::CHANNELS_PER_SUBP,
        }))
    }

    fn set_gpu_lane_remap(&self, location: FbpaSubp, subp_dword: u32, remap: u16) -> Result<()> {
        if subp_dword >= self.params.dwords_per_subp {
            return Err(HbmRepairError::invalid_coordinate(format!(
                "subpartition DWORD {} out of range",
                subp_dword
            )));
        }
        self.state.lock().gpu_remaps.insert((location, subp_dword), remap);
        Ok(())
    }
}
