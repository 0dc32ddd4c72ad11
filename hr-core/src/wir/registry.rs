//! Per-model WIR registry
//!
//! Built once when a model is resolved and read-only afterwards.

use hr_vendor::DieVariant;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::catalog::{Support, Wir, WirType};
use crate::error::{HbmRepairError, Result};

#[derive(Debug, Clone)]
pub struct WirRegistry {
    variant: DieVariant,
    support: Support,
    wirs: BTreeMap<WirType, Wir>,
}

impl WirRegistry {
    pub fn new(variant: DieVariant) -> Self {
        Self {
            variant,
            support: Support::for_variant(variant),
            wirs: BTreeMap::new(),
        }
    }

    /// Register the catalog entries this model supports
    ///
    /// Unsupported entries are skipped silently. Returns the number of
    /// entries registered.
    pub fn add_wirs(&mut self, wirs: &[Wir]) -> usize {
        let mut added = 0;
        for wir in wirs.iter().filter(|w| w.support.intersects(self.support)) {
            if let Some(existing) = self.wirs.get(&wir.wir_type) {
                warn!(
                    "Ignoring duplicate {} for {}: {} already registered",
                    wir, self.variant, existing
                );
                continue;
            }
            self.wirs.insert(wir.wir_type, *wir);
            added += 1;
        }
        debug!("Registered {} WIRs for {}", added, self.variant);
        added
    }

    pub fn lookup(&self, wir_type: WirType) -> Result<&Wir> {
        self.wirs.get(&wir_type).ok_or_else(|| {
            HbmRepairError::unsupported(format!("{} on {}", wir_type, self.variant))
        })
    }

    pub fn supports(&self, wir_type: WirType) -> bool {
        self.wirs.contains_key(&wir_type)
    }

    pub fn variant(&self) -> DieVariant {
        self.variant
    }

    pub fn len(&self) -> usize {
        self.wirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wirs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wir::catalog::CATALOG;

    fn registry(variant: DieVariant) -> WirRegistry {
        let mut registry = WirRegistry::new(variant);
        registry.add_wirs(CATALOG);
        registry
    }

    #[test]
    fn test_lookup_succeeds_iff_supported() {
        for variant in DieVariant::ALL {
            let registry = registry(variant);
            let support = Support::for_variant(variant);
            for wir in CATALOG {
                let supported = wir.support.intersects(support);
                match registry.lookup(wir.wir_type) {
                    Ok(found) => {
                        assert!(found.support.intersects(support));
                    }
                    Err(HbmRepairError::UnsupportedOperation(_)) => {
                        assert!(!supported, "{} missing for {}", wir.wir_type, variant);
                    }
                    Err(other) => panic!("unexpected error {other}"),
                }
            }
        }
    }

    #[test]
    fn test_bdie_has_no_hard_lane_repair() {
        let registry = registry(DieVariant::SamsungBDie);
        assert!(!registry.supports(WirType::HardLaneRepair));
        assert!(registry.supports(WirType::SoftLaneRepair));
        assert_eq!(registry.lookup(WirType::SpareRowScan).unwrap().opcode, 0x1B);
    }

    #[test]
    fn test_vendor_guards() {
        assert!(registry(DieVariant::SkHynixHbm2).supports(WirType::RepairUnlock));
        assert!(!registry(DieVariant::SkHynixHbm2).supports(WirType::RepairMode));
        assert!(registry(DieVariant::MicronHbm2e).supports(WirType::RepairMode));
        assert!(!registry(DieVariant::SamsungHbm2e).supports(WirType::RepairUnlock));
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = WirRegistry::new(DieVariant::MicronHbm2e);
        let first = registry.add_wirs(CATALOG);
        let again = registry.add_wirs(CATALOG);
        assert!(first > 0);
        assert_eq!(again, 0);
        assert_eq!(registry.len(), first);
    }
}
