//! Per-GPU repair handle
//!
//! `HbmDevice` owns the transport for one GPU together with everything
//! resolved at bring-up: the active sites, the HBM model read back through
//! DEVICE_ID and the dispatch bundle for that model. Nothing here is global;
//! dropping the handle tears it all down.

use hr_vendor::{DieVariant, GpuArch, HbmModel};
use tracing::{debug, info};

use crate::codec::lane as lane_codec;
use crate::data::{Bank, Channel, GpuLane, GpuRow, HbmLane, HbmRow, RepairMode, Row, Site, Stack, Translator};
use crate::dispatch::HbmInterface;
use crate::engine::{self, BatchReport, RepairContext};
use crate::error::{HbmRepairError, Result};
use crate::hw::{ScanChain, ScanLock, Transport};
use crate::settings::RepairSettings;
use crate::wir::{catalog, WirType};

pub struct HbmDevice<T: Transport> {
    transport: T,
    interface: HbmInterface,
    settings: RepairSettings,
    active_sites: Vec<Site>,
}

impl<T: Transport> HbmDevice<T> {
    /// Identify the HBM behind `transport` and resolve its repair interface
    ///
    /// Every active site must report the same model. Unsupported models fail
    /// here, before any repair register is touched.
    pub fn open(transport: T, arch: GpuArch, settings: RepairSettings) -> Result<Self> {
        settings.validate()?;

        let active_sites = Translator::new(&transport, arch).active_sites()?;
        if active_sites.is_empty() {
            return Err(HbmRepairError::generic(format!("no active HBM site on {}", arch)));
        }
        debug!("Active sites: {:?}", active_sites.iter().map(|s| s.value()).collect::<Vec<_>>());

        let model = read_model(&transport, &active_sites)?;
        let interface = HbmInterface::new(model, arch)?;
        info!("Opened {} HBM on {} ({})", model, arch, settings);

        Ok(Self {
            transport,
            interface,
            settings,
            active_sites,
        })
    }

    pub fn model(&self) -> &HbmModel {
        self.interface.model()
    }

    pub fn arch(&self) -> GpuArch {
        self.interface.arch()
    }

    pub fn variant(&self) -> DieVariant {
        self.interface.variant()
    }

    pub fn interface(&self) -> &HbmInterface {
        &self.interface
    }

    pub fn settings(&self) -> &RepairSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RepairSettings) -> Result<()> {
        settings.validate()?;
        info!("Repair policy: {}", settings);
        self.settings = settings;
        Ok(())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn active_sites(&self) -> &[Site] {
        &self.active_sites
    }

    fn context(&self) -> RepairContext<'_> {
        RepairContext::new(&self.transport, &self.interface, &self.settings)
    }

    fn chain(&self) -> ScanChain<'_> {
        // Audit reads never burn anything
        ScanChain::new(&self.transport, self.interface.registry(), false)
    }

    fn check_site(&self, site: Site) -> Result<()> {
        if !self.active_sites.contains(&site) {
            return Err(HbmRepairError::invalid_coordinate(format!("{} is not active", site)));
        }
        Ok(())
    }

    /// Repair lanes reported by the GPU memory controller
    pub fn repair_lanes(&self, lanes: &[GpuLane], mode: RepairMode) -> BatchReport {
        engine::repair_gpu_lanes(&self.context(), lanes, mode)
    }

    /// Repair rows reported by the GPU memory controller
    pub fn repair_rows(&self, rows: &[GpuRow], mode: RepairMode) -> BatchReport {
        engine::repair_gpu_rows(&self.context(), rows, mode)
    }

    pub fn repair_hbm_lanes(&self, lanes: &[HbmLane], mode: RepairMode) -> BatchReport {
        engine::repair_hbm_lanes(&self.context(), lanes, mode)
    }

    pub fn repair_hbm_rows(&self, rows: &[HbmRow], mode: RepairMode) -> BatchReport {
        engine::repair_hbm_rows(&self.context(), rows, mode)
    }

    /// Spare rows usable for a row repair in one bank
    pub fn available_spare_rows(&self, site: Site, stack: Stack, channel: Channel, bank: Bank) -> Result<u32> {
        self.check_site(site)?;
        self.interface.require(&[WirType::SpareRowScan])?;
        let chain = self.chain();
        let _lock = ScanLock::acquire(&self.transport)?;
        let spares = engine::scan_bank(&chain, &self.interface, site, stack, channel, bank)?;
        Ok(spares.available_count())
    }

    /// Lane repairs currently held by the soft or hard remap register
    pub fn read_lane_repairs(&self, site: Site, channel: Channel, mode: RepairMode) -> Result<Vec<HbmLane>> {
        self.check_site(site)?;
        let wir_type = match mode {
            RepairMode::Soft => WirType::SoftLaneRepair,
            RepairMode::Hard => WirType::HardLaneRepair,
        };
        self.interface.require(&[wir_type])?;
        let chain = self.chain();
        let data = {
            let _lock = ScanLock::acquire(&self.transport)?;
            chain.read(wir_type, site, channel)?
        };
        lane_codec::decode_lanes(site, channel, &data)
    }

    /// Rows held by burned spares of one bank
    pub fn read_row_repairs(&self, site: Site, stack: Stack, channel: Channel, bank: Bank) -> Result<Vec<Row>> {
        self.check_site(site)?;
        self.interface.require(&[WirType::SpareRowScan])?;
        let chain = self.chain();
        let _lock = ScanLock::acquire(&self.transport)?;
        let spares = engine::scan_bank(&chain, &self.interface, site, stack, channel, bank)?;
        Ok(spares.repaired_rows())
    }
}

/// Read DEVICE_ID from every active site and insist on one model
fn read_model(transport: &dyn Transport, sites: &[Site]) -> Result<HbmModel> {
    let _lock = ScanLock::acquire(transport)?;
    let mut found: Option<(Site, HbmModel)> = None;
    for &site in sites {
        let data = transport.wir_read(&catalog::DEVICE_ID, site, Channel::default())?;
        if data.bit_width() != catalog::DEVICE_ID.bit_width {
            return Err(HbmRepairError::transport(format!(
                "DEVICE_ID on {} returned {} bits",
                site,
                data.bit_width()
            )));
        }
        let model = HbmModel::from_device_id(data.field(0, 32) as u32)?;
        debug!("{}: {} serial {:#010x}", site, model, data.field(32, 32));

        match found {
            None => found = Some((site, model)),
            Some((first_site, first)) if first != model => {
                return Err(HbmRepairError::UnsupportedModel(format!(
                    "mixed HBM models: {} on {}, {} on {}",
                    first, first_site, model, site
                )));
            }
            Some(_) => {}
        }
    }
    found
        .map(|(_, model)| model)
        .ok_or_else(|| HbmRepairError::generic("no HBM site to identify"))
}
