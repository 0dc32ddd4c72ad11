//! Vendor and model dispatch
//!
//! An `HbmInterface` is the bundle a resolved model needs: its die variant
//! profile (layouts and tables), the filtered WIR registry and the
//! orchestration overrides that differ between vendors. It is built once
//! per GPU and never changes afterwards.

use hr_vendor::{resolve_variant, skhynix, DieVariant, GpuArch, HbmModel, HbmVendor, VariantProfile};
use tracing::{debug, info};

use crate::constants::timing;
use crate::data::{Channel, RepairMode, Site, WdrData};
use crate::error::Result;
use crate::hw::{ScanChain, ScanLock};
use crate::wir::{WirRegistry, WirType, CATALOG};

/// How a hard lane remap is written into the fuse register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneBurnOrder {
    /// One write of the whole register
    Whole,
    /// One nibble per write, sentinel nibble first
    NibbleOrdered,
}

/// Vendor guard around fuse programming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuseGuard {
    None,
    /// Write `unlock` before and `relock` after burning
    UnlockKey { unlock: u32, relock: u32 },
    /// Enter repair mode before and leave it after burning
    RepairMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairOverrides {
    pub lane_burn_order: LaneBurnOrder,
    pub fuse_guard: FuseGuard,
    /// Adjacent rows share one fuse and are repaired together
    pub couples_adjacent_rows: bool,
}

impl RepairOverrides {
    pub fn for_variant(variant: DieVariant) -> Self {
        match variant.vendor() {
            HbmVendor::SkHynix => Self {
                lane_burn_order: LaneBurnOrder::NibbleOrdered,
                fuse_guard: FuseGuard::UnlockKey {
                    unlock: skhynix::REPAIR_UNLOCK_KEY,
                    relock: skhynix::REPAIR_RELOCK_KEY,
                },
                couples_adjacent_rows: true,
            },
            HbmVendor::Micron => Self {
                lane_burn_order: LaneBurnOrder::Whole,
                fuse_guard: FuseGuard::RepairMode,
                couples_adjacent_rows: false,
            },
            HbmVendor::Samsung => Self {
                lane_burn_order: LaneBurnOrder::Whole,
                fuse_guard: FuseGuard::None,
                couples_adjacent_rows: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HbmInterface {
    model: HbmModel,
    arch: GpuArch,
    profile: &'static VariantProfile,
    registry: WirRegistry,
    overrides: RepairOverrides,
}

impl HbmInterface {
    /// Resolve `model` on `arch`; unsupported models fail here
    pub fn new(model: HbmModel, arch: GpuArch) -> Result<Self> {
        let variant = resolve_variant(&model, arch)?;
        let mut registry = WirRegistry::new(variant);
        registry.add_wirs(CATALOG);
        let overrides = RepairOverrides::for_variant(variant);
        info!(
            "{} interface ready: {} WIRs, {:?} lane burns, guard {:?}",
            variant,
            registry.len(),
            overrides.lane_burn_order,
            overrides.fuse_guard
        );
        Ok(Self {
            model,
            arch,
            profile: hr_vendor::profile(variant),
            registry,
            overrides,
        })
    }

    pub fn model(&self) -> &HbmModel {
        &self.model
    }

    pub fn arch(&self) -> GpuArch {
        self.arch
    }

    pub fn variant(&self) -> DieVariant {
        self.profile.variant
    }

    pub fn profile(&self) -> &'static VariantProfile {
        self.profile
    }

    pub fn registry(&self) -> &WirRegistry {
        &self.registry
    }

    pub fn overrides(&self) -> &RepairOverrides {
        &self.overrides
    }

    /// Fail unless every listed WIR is available on this model
    pub fn require(&self, wirs: &[WirType]) -> Result<()> {
        for wir in wirs {
            self.registry.lookup(*wir)?;
        }
        Ok(())
    }

    /// Open the vendor fuse guard of `site` before a hard repair
    ///
    /// Runs under the caller's scan lock, which must stay held until
    /// `post_repair_hook` has closed the guard again.
    pub fn pre_repair_hook(&self, chain: &ScanChain, lock: &ScanLock, site: Site, mode: RepairMode) -> Result<()> {
        if mode == RepairMode::Soft {
            return Ok(());
        }
        match self.overrides.fuse_guard {
            FuseGuard::None => Ok(()),
            FuseGuard::UnlockKey { unlock, .. } => {
                debug!("Unlocking fuse programming on {}", site);
                self.guard_write(chain, lock, WirType::RepairUnlock, site, u64::from(unlock))
            }
            FuseGuard::RepairMode => {
                debug!("Entering repair mode on {}", site);
                self.guard_write(chain, lock, WirType::RepairMode, site, 1)
            }
        }
    }

    /// Close the vendor fuse guard of `site` after a hard repair
    pub fn post_repair_hook(&self, chain: &ScanChain, lock: &ScanLock, site: Site, mode: RepairMode) -> Result<()> {
        if mode == RepairMode::Soft {
            return Ok(());
        }
        match self.overrides.fuse_guard {
            FuseGuard::None => Ok(()),
            FuseGuard::UnlockKey { relock, .. } => {
                debug!("Relocking fuse programming on {}", site);
                self.guard_write(chain, lock, WirType::RepairUnlock, site, u64::from(relock))
            }
            FuseGuard::RepairMode => {
                debug!("Leaving repair mode on {}", site);
                self.guard_write(chain, lock, WirType::RepairMode, site, 0)
            }
        }
    }

    fn guard_write(&self, chain: &ScanChain, _lock: &ScanLock, wir_type: WirType, site: Site, value: u64) -> Result<()> {
        let wir = chain.wir(wir_type)?;
        chain.write(wir_type, site, Channel::default(), &WdrData::from_u64(wir.bit_width, value))?;
        chain.transport().sleep_us(timing::REPAIR_GUARD_SETTLE_US);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HbmRepairError;
    use crate::hw::SimulatedHbm;
    use hr_vendor::{HbmDie, SpecVersion};

    fn model(vendor: HbmVendor, spec_version: SpecVersion, die: HbmDie, revision: u8) -> HbmModel {
        HbmModel {
            vendor,
            spec_version,
            die,
            stack_height: 8,
            revision,
        }
    }

    #[test]
    fn test_every_variant_builds() {
        let cases = [
            (model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::BDie, 0), GpuArch::Gv100),
            (model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::XDie, 0), GpuArch::Gv100),
            (model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::XDie, 0), GpuArch::Ga100),
            (model(HbmVendor::Samsung, SpecVersion::Hbm2e, HbmDie::Standard, 0), GpuArch::Ga100),
            (model(HbmVendor::SkHynix, SpecVersion::Hbm2, HbmDie::Standard, 1), GpuArch::Gv100),
            (model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard, 0), GpuArch::Ga100),
            (model(HbmVendor::Micron, SpecVersion::Hbm2e, HbmDie::Standard, 0), GpuArch::Ga100),
        ];
        let variants: Vec<DieVariant> = cases
            .iter()
            .map(|(m, arch)| HbmInterface::new(*m, *arch).unwrap().variant())
            .collect();
        assert_eq!(variants, DieVariant::ALL.to_vec());
    }

    #[test]
    fn test_unsupported_model_fails_before_hardware() {
        let early_hynix = model(HbmVendor::SkHynix, SpecVersion::Hbm2, HbmDie::Standard, 0);
        assert!(matches!(
            HbmInterface::new(early_hynix, GpuArch::Gv100),
            Err(HbmRepairError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_bdie_requires_fail_for_hard_lanes() {
        let iface = HbmInterface::new(
            model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::BDie, 0),
            GpuArch::Gv100,
        )
        .unwrap();
        assert!(iface.require(&[WirType::SoftLaneRepair]).is_ok());
        assert!(matches!(
            iface.require(&[WirType::SoftLaneRepair, WirType::HardLaneRepair]),
            Err(HbmRepairError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_unlock_hooks_bracket_hard_repairs() {
        let model = model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard, 0);
        let iface = HbmInterface::new(model, GpuArch::Ga100).unwrap();
        let sim = SimulatedHbm::new(GpuArch::Ga100, model);
        let chain = ScanChain::new(&sim, iface.registry(), false);
        let site = Site::new(5).unwrap();

        {
            let lock = ScanLock::acquire(&sim).unwrap();
            iface.pre_repair_hook(&chain, &lock, site, RepairMode::Soft).unwrap();
            assert!(!sim.is_unlocked(site));

            iface.pre_repair_hook(&chain, &lock, site, RepairMode::Hard).unwrap();
            assert!(sim.is_unlocked(site));
            assert!(sim.lock_held());

            iface.post_repair_hook(&chain, &lock, site, RepairMode::Hard).unwrap();
            assert!(!sim.is_unlocked(site));
        }
        assert!(!sim.lock_held());
        assert_eq!(sim.lock_acquisitions(), 1);
        assert_eq!(sim.releases_with_guard_open(), 0);
    }

    #[test]
    fn test_micron_repair_mode_hooks() {
        let model = model(HbmVendor::Micron, SpecVersion::Hbm2e, HbmDie::Standard, 0);
        let iface = HbmInterface::new(model, GpuArch::Ga100).unwrap();
        let sim = SimulatedHbm::new(GpuArch::Ga100, model);
        let chain = ScanChain::new(&sim, iface.registry(), false);
        let site = Site::new(0).unwrap();

        let lock = ScanLock::acquire(&sim).unwrap();
        iface.pre_repair_hook(&chain, &lock, site, RepairMode::Hard).unwrap();
        assert!(sim.in_repair_mode(site));
        iface.post_repair_hook(&chain, &lock, site, RepairMode::Hard).unwrap();
        assert!(!sim.in_repair_mode(site));
    }
}
