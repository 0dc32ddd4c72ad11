//! HBM vendor support for the repair engine
//!
//! Provides vendor-specific identity decoding and die tables for:
//! - Samsung HBM2 (B-die, X-die) and HBM2e
//! - SK hynix HBM2 and HBM2e
//! - Micron HBM2e
//!
//! Dispatch is closed: a model resolves to exactly one `DieVariant`, and each
//! variant owns one static `VariantProfile`.

pub mod micron;
pub mod samsung;
pub mod skhynix;

pub mod constants;
pub mod layout;
mod types;

pub use layout::{BitField, RowFuseLayout, SpareScanLayout, StackSelect, VariantProfile};
pub use types::*;

use hr_error::HbmRepairError;
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, HbmRepairError>;

/// Resolve the die variant for a model attached to a given GPU architecture
///
/// Unsupported `(vendor, spec version, die, revision)` combinations fail here,
/// before any repair touches the hardware.
pub fn resolve_variant(model: &HbmModel, arch: GpuArch) -> Result<DieVariant> {
    let variant = match (model.vendor, model.spec_version, model.die, arch) {
        (HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::BDie, GpuArch::Gv100) => DieVariant::SamsungBDie,
        (HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::XDie, GpuArch::Gv100) => DieVariant::SamsungXDieGv100,
        (HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::XDie, GpuArch::Ga100) => DieVariant::SamsungXDieGa100,
        (HbmVendor::Samsung, SpecVersion::Hbm2e, _, GpuArch::Ga100) => DieVariant::SamsungHbm2e,
        (HbmVendor::SkHynix, SpecVersion::Hbm2, _, _) if model.revision >= 1 => DieVariant::SkHynixHbm2,
        (HbmVendor::SkHynix, SpecVersion::Hbm2e, _, GpuArch::Ga100) => DieVariant::SkHynixHbm2e,
        (HbmVendor::Micron, SpecVersion::Hbm2e, _, GpuArch::Ga100) => DieVariant::MicronHbm2e,
        _ => {
            debug!("No die variant for {} on {}", model, arch);
            return Err(HbmRepairError::UnsupportedModel(format!("{} on {}", model, arch)));
        }
    };

    let max_stacks = profile(variant).max_stacks();
    if model.stack_count() > max_stacks {
        return Err(HbmRepairError::UnsupportedModel(format!(
            "{} has {} stack IDs, {} addresses at most {}",
            model,
            model.stack_count(),
            variant,
            max_stacks
        )));
    }

    info!("Resolved {} on {} to {}", model, arch, variant);
    Ok(variant)
}

/// Static tables and layouts for a die variant
pub fn profile(variant: DieVariant) -> &'static VariantProfile {
    match variant {
        DieVariant::SamsungBDie => &samsung::BDIE_PROFILE,
        DieVariant::SamsungXDieGv100 => &samsung::XDIE_GV100_PROFILE,
        DieVariant::SamsungXDieGa100 => &samsung::XDIE_GA100_PROFILE,
        DieVariant::SamsungHbm2e => &samsung::HBM2E_PROFILE,
        DieVariant::SkHynixHbm2 => &skhynix::HBM2_PROFILE,
        DieVariant::SkHynixHbm2e => &skhynix::HBM2E_PROFILE,
        DieVariant::MicronHbm2e => &micron::HBM2E_PROFILE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_resolve_samsung() {
        let bdie = model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::BDie, 0);
        assert_eq!(resolve_variant(&bdie, GpuArch::Gv100).unwrap(), DieVariant::SamsungBDie);
        assert!(resolve_variant(&bdie, GpuArch::Ga100).is_err());

        let xdie = model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::XDie, 1);
        assert_eq!(resolve_variant(&xdie, GpuArch::Gv100).unwrap(), DieVariant::SamsungXDieGv100);
        assert_eq!(resolve_variant(&xdie, GpuArch::Ga100).unwrap(), DieVariant::SamsungXDieGa100);

        let unknown = model(HbmVendor::Samsung, SpecVersion::Hbm2, HbmDie::Unknown(9), 1);
        assert!(resolve_variant(&unknown, GpuArch::Gv100).is_err());
    }

    #[test]
    fn test_resolve_skhynix_revision_gate() {
        let early = model(HbmVendor::SkHynix, SpecVersion::Hbm2, HbmDie::Standard, 0);
        assert!(matches!(
            resolve_variant(&early, GpuArch::Gv100),
            Err(HbmRepairError::UnsupportedModel(_))
        ));
        let production = model(HbmVendor::SkHynix, SpecVersion::Hbm2, HbmDie::Standard, 2);
        assert_eq!(resolve_variant(&production, GpuArch::Gv100).unwrap(), DieVariant::SkHynixHbm2);
    }

    #[test]
    fn test_resolve_micron() {
        let hbm2 = model(HbmVendor::Micron, SpecVersion::Hbm2, HbmDie::Standard, 1);
        assert!(resolve_variant(&hbm2, GpuArch::Ga100).is_err());
        let hbm2e = model(HbmVendor::Micron, SpecVersion::Hbm2e, HbmDie::Standard, 1);
        assert_eq!(resolve_variant(&hbm2e, GpuArch::Ga100).unwrap(), DieVariant::MicronHbm2e);
    }

    #[test]
    fn test_resolve_rejects_unaddressable_stacks() {
        let mut tall = model(HbmVendor::SkHynix, SpecVersion::Hbm2e, HbmDie::Standard, 1);
        tall.stack_height = 12;
        assert!(resolve_variant(&tall, GpuArch::Ga100).is_err());

        let mut samsung_tall = model(HbmVendor::Samsung, SpecVersion::Hbm2e, HbmDie::Standard, 1);
        samsung_tall.stack_height = 12;
        assert_eq!(resolve_variant(&samsung_tall, GpuArch::Ga100).unwrap(), DieVariant::SamsungHbm2e);
    }

    #[test]
    fn test_every_variant_has_matching_profile() {
        for variant in DieVariant::ALL {
            assert_eq!(profile(variant).variant, variant);
        }
    }
}
