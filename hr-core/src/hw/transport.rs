//! Scan transport abstraction
//!
//! The repair engine never touches hardware directly. Everything it needs
//! from the platform (IEEE1500 scan access, the scan chain mutex, site
//! reset, delays, floorsweeping topology and the GPU-side lane remap) goes
//! through `Transport`.

use std::time::Duration;
use tracing::trace;

use crate::data::{Channel, FbpaSubp, Site, WdrData};
use crate::error::Result;
use crate::wir::Wir;

#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Select `wir` on one channel and shift `data` into its WDR
    fn wir_write(&self, wir: &Wir, site: Site, channel: Channel, data: &WdrData) -> Result<()>;

    /// Select `wir` on one channel and shift its WDR out
    fn wir_read(&self, wir: &Wir, site: Site, channel: Channel) -> Result<WdrData>;

    /// Shift `data` into the WDR of the currently selected WIR
    fn wdr_write(&self, site: Site, channel: Channel, data: &WdrData) -> Result<()>;

    /// Shift `bit_width` bits out of the WDR of the currently selected WIR
    fn wdr_read_raw(&self, site: Site, channel: Channel, bit_width: u32) -> Result<WdrData>;

    /// Acquire the global scan chain lock; fails if another agent holds it
    fn acquire_scan_lock(&self) -> Result<()>;

    fn release_scan_lock(&self);

    /// Reset one HBM site so burned fuses take effect
    fn reset_site(&self, site: Site) -> Result<()>;

    fn sleep_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn sleep_us(&self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }

    /// Master FBPA of a site, `None` when the site is floorswept
    fn hbm_site_master_fbpa(&self, site: Site) -> Result<Option<u32>>;

    /// FBPA and subpartition wired to a channel, `None` when floorswept
    fn hbm_site_channel_to_hw_fbpa_subp(&self, site: Site, channel: Channel) -> Result<Option<FbpaSubp>>;

    /// Program the GPU-side remap for one DWORD of a subpartition
    fn set_gpu_lane_remap(&self, location: FbpaSubp, subp_dword: u32, remap: u16) -> Result<()>;
}

/// Scoped hold of the scan chain lock
///
/// The lock is released when the guard drops, on every exit path.
pub struct ScanLock<'a> {
    transport: &'a dyn Transport,
}

impl<'a> ScanLock<'a> {
    pub fn acquire(transport: &'a dyn Transport) -> Result<Self> {
        transport.acquire_scan_lock()?;
        trace!("Acquired scan chain lock");
        Ok(Self { transport })
    }
}

impl Drop for ScanLock<'_> {
    fn drop(&mut self) {
        self.transport.release_scan_lock();
        trace!("Released scan chain lock");
    }
}
