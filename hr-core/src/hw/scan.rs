//! Registry-checked scan chain access
//!
//! Resolves WIR kinds through the model's registry, checks direction and
//! width before shifting, applies the settle delay, and suppresses
//! destructive writes in dry-run mode.

use tracing::{info, trace};

use super::transport::Transport;
use crate::data::{Channel, Site, WdrData};
use crate::error::{HbmRepairError, Result};
use crate::wir::{Wir, WirRegistry, WirType};

/// Whether a write reached the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    SkippedDryRun,
}

pub struct ScanChain<'a> {
    transport: &'a dyn Transport,
    registry: &'a WirRegistry,
    dry_run: bool,
}

impl<'a> ScanChain<'a> {
    pub fn new(transport: &'a dyn Transport, registry: &'a WirRegistry, dry_run: bool) -> Self {
        Self {
            transport,
            registry,
            dry_run,
        }
    }

    pub fn transport(&self) -> &'a dyn Transport {
        self.transport
    }

    pub fn wir(&self, wir_type: WirType) -> Result<&'a Wir> {
        self.registry.lookup(wir_type)
    }

    /// Select `wir_type` and shift `data` in
    pub fn write(&self, wir_type: WirType, site: Site, channel: Channel, data: &WdrData) -> Result<WriteOutcome> {
        let wir = self.checked_write(wir_type, data)?;
        if self.dry_run && wir.is_destructive() {
            info!("Dry run: not writing {} on {} {} ({})", wir, site, channel, data);
            return Ok(WriteOutcome::SkippedDryRun);
        }
        let channel = Self::target_channel(wir, channel);
        trace!("WIR write {} {} {} <- {}", wir, site, channel, data);
        self.transport.wir_write(wir, site, channel, data)?;
        self.transport.sleep_us(wir.settle_us);
        Ok(WriteOutcome::Written)
    }

    /// Shift `data` into the WDR of `wir_type`, which must already be selected
    pub fn write_selected(&self, wir_type: WirType, site: Site, channel: Channel, data: &WdrData) -> Result<WriteOutcome> {
        let wir = self.checked_write(wir_type, data)?;
        if self.dry_run && wir.is_destructive() {
            info!("Dry run: not writing {} WDR on {} {} ({})", wir, site, channel, data);
            return Ok(WriteOutcome::SkippedDryRun);
        }
        let channel = Self::target_channel(wir, channel);
        trace!("WDR write {} {} {} <- {}", wir, site, channel, data);
        self.transport.wdr_write(site, channel, data)?;
        self.transport.sleep_us(wir.settle_us);
        Ok(WriteOutcome::Written)
    }

    /// Select `wir_type` and shift its WDR out
    pub fn read(&self, wir_type: WirType, site: Site, channel: Channel) -> Result<WdrData> {
        let wir = self.checked_read(wir_type)?;
        let channel = Self::target_channel(wir, channel);
        let data = self.transport.wir_read(wir, site, channel)?;
        self.check_width(wir, &data)?;
        trace!("WIR read {} {} {} -> {}", wir, site, channel, data);
        Ok(data)
    }

    /// Shift the WDR of the already selected `wir_type` out
    pub fn read_selected(&self, wir_type: WirType, site: Site, channel: Channel) -> Result<WdrData> {
        let wir = self.checked_read(wir_type)?;
        let channel = Self::target_channel(wir, channel);
        let data = self.transport.wdr_read_raw(site, channel, wir.bit_width)?;
        self.check_width(wir, &data)?;
        trace!("WDR read {} {} {} -> {}", wir, site, channel, data);
        Ok(data)
    }

    fn checked_write(&self, wir_type: WirType, data: &WdrData) -> Result<&'a Wir> {
        let wir = self.registry.lookup(wir_type)?;
        if !wir.access.writable() {
            return Err(HbmRepairError::unsupported(format!("{} is not writable", wir)));
        }
        self.check_width(wir, data)?;
        Ok(wir)
    }

    fn checked_read(&self, wir_type: WirType) -> Result<&'a Wir> {
        let wir = self.registry.lookup(wir_type)?;
        if !wir.access.readable() {
            return Err(HbmRepairError::unsupported(format!("{} is not readable", wir)));
        }
        Ok(wir)
    }

    fn check_width(&self, wir: &Wir, data: &WdrData) -> Result<()> {
        if data.bit_width() != wir.bit_width {
            return Err(HbmRepairError::transport(format!(
                "{} expects {} bits, got {}",
                wir,
                wir.bit_width,
                data.bit_width()
            )));
        }
        Ok(())
    }

    fn target_channel(wir: &Wir, channel: Channel) -> Channel {
        if wir.is_channel_agnostic() {
            Channel::default()
        } else {
            channel
        }
    }
}
