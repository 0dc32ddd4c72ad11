//! Static catalog of wrapper instruction registers
//!
//! Every WIR any supported die understands is listed here once per distinct
//! encoding. An entry's `support` set names the die variants that accept it;
//! the registry filters the catalog down to the entries of one model.

use bitflags::bitflags;
use hr_vendor::{micron, samsung, skhynix, DieVariant};
use std::fmt;

use crate::constants::{lane, timing};
use crate::codec::row::SOFT_ROW_LAYOUT;

bitflags! {
    /// Die variants accepting a WIR
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Support: u16 {
        const SAMSUNG_B_DIE = 1 << 0;
        const SAMSUNG_X_DIE_GV100 = 1 << 1;
        const SAMSUNG_X_DIE_GA100 = 1 << 2;
        const SAMSUNG_HBM2E = 1 << 3;
        const SK_HYNIX_HBM2 = 1 << 4;
        const SK_HYNIX_HBM2E = 1 << 5;
        const MICRON_HBM2E = 1 << 6;

        const SAMSUNG_X_DIE = Self::SAMSUNG_X_DIE_GV100.bits() | Self::SAMSUNG_X_DIE_GA100.bits();
        const SAMSUNG = Self::SAMSUNG_B_DIE.bits()
            | Self::SAMSUNG_X_DIE.bits()
            | Self::SAMSUNG_HBM2E.bits();
        const SK_HYNIX = Self::SK_HYNIX_HBM2.bits() | Self::SK_HYNIX_HBM2E.bits();
        const ALL = Self::SAMSUNG.bits() | Self::SK_HYNIX.bits() | Self::MICRON_HBM2E.bits();
    }
}

impl Support {
    pub fn for_variant(variant: DieVariant) -> Self {
        match variant {
            DieVariant::SamsungBDie => Support::SAMSUNG_B_DIE,
            DieVariant::SamsungXDieGv100 => Support::SAMSUNG_X_DIE_GV100,
            DieVariant::SamsungXDieGa100 => Support::SAMSUNG_X_DIE_GA100,
            DieVariant::SamsungHbm2e => Support::SAMSUNG_HBM2E,
            DieVariant::SkHynixHbm2 => Support::SK_HYNIX_HBM2,
            DieVariant::SkHynixHbm2e => Support::SK_HYNIX_HBM2E,
            DieVariant::MicronHbm2e => Support::MICRON_HBM2E,
        }
    }
}

bitflags! {
    /// Behavioural attributes of a WIR
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct WirFlags: u8 {
        /// Addresses the whole site; the channel argument is ignored
        const CHANNEL_AGNOSTIC = 1 << 0;
        /// Writing burns fuses and cannot be undone
        const DESTRUCTIVE = 1 << 1;
        /// Only meaningful for one vendor's dies
        const VENDOR_SPECIFIC = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterAccess {
    Read,
    Write,
    ReadWrite,
}

impl RegisterAccess {
    pub fn readable(self) -> bool {
        matches!(self, RegisterAccess::Read | RegisterAccess::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, RegisterAccess::Write | RegisterAccess::ReadWrite)
    }
}

/// Abstract WIR kinds; each model has at most one concrete entry per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WirType {
    Bypass,
    DeviceId,
    SoftRowRepair,
    HardRowRepair,
    SoftLaneRepair,
    HardLaneRepair,
    SpareRowScan,
    RepairUnlock,
    RepairMode,
}

impl fmt::Display for WirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WirType::Bypass => "BYPASS",
            WirType::DeviceId => "DEVICE_ID",
            WirType::SoftRowRepair => "SOFT_ROW_REPAIR",
            WirType::HardRowRepair => "HARD_ROW_REPAIR",
            WirType::SoftLaneRepair => "SOFT_LANE_REPAIR",
            WirType::HardLaneRepair => "HARD_LANE_REPAIR",
            WirType::SpareRowScan => "SPARE_ROW_SCAN",
            WirType::RepairUnlock => "REPAIR_UNLOCK",
            WirType::RepairMode => "REPAIR_MODE",
        };
        write!(f, "{}", name)
    }
}

/// One catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wir {
    pub wir_type: WirType,
    pub opcode: u32,
    pub access: RegisterAccess,
    /// Width of the associated WDR
    pub bit_width: u32,
    pub support: Support,
    pub flags: WirFlags,
    /// Settle time after a write
    pub settle_us: u64,
}

impl Wir {
    pub fn is_destructive(&self) -> bool {
        self.flags.contains(WirFlags::DESTRUCTIVE)
    }

    pub fn is_channel_agnostic(&self) -> bool {
        self.flags.contains(WirFlags::CHANNEL_AGNOSTIC)
    }
}

impl fmt::Display for Wir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#04x})", self.wir_type, self.opcode)
    }
}

// Opcodes shared by every vendor
pub const BYPASS_OPCODE: u32 = 0x00;
pub const DEVICE_ID_OPCODE: u32 = 0x0E;
pub const SOFT_ROW_REPAIR_OPCODE: u32 = 0x07;
pub const SOFT_LANE_REPAIR_OPCODE: u32 = 0x12;
pub const HARD_LANE_REPAIR_OPCODE: u32 = 0x13;

const fn entry(
    wir_type: WirType,
    opcode: u32,
    access: RegisterAccess,
    bit_width: u32,
    support: Support,
    flags: WirFlags,
) -> Wir {
    Wir {
        wir_type,
        opcode,
        access,
        bit_width,
        support,
        flags,
        settle_us: timing::WIR_SETTLE_US,
    }
}

/// DEVICE_ID is readable on every die before the model is known
pub const DEVICE_ID: Wir = entry(
    WirType::DeviceId,
    DEVICE_ID_OPCODE,
    RegisterAccess::Read,
    hr_vendor::constants::device_id::WIDTH_BITS,
    Support::ALL,
    WirFlags::CHANNEL_AGNOSTIC,
);

pub static CATALOG: &[Wir] = &[
    entry(WirType::Bypass, BYPASS_OPCODE, RegisterAccess::Write, 1, Support::ALL, WirFlags::empty()),
    DEVICE_ID,
    entry(
        WirType::SoftRowRepair,
        SOFT_ROW_REPAIR_OPCODE,
        RegisterAccess::ReadWrite,
        SOFT_ROW_LAYOUT.width,
        Support::ALL,
        WirFlags::empty(),
    ),
    entry(
        WirType::SoftLaneRepair,
        SOFT_LANE_REPAIR_OPCODE,
        RegisterAccess::ReadWrite,
        lane::LANE_REMAP_WDR_WIDTH,
        Support::ALL,
        WirFlags::empty(),
    ),
    // B-die has no lane fuses
    entry(
        WirType::HardLaneRepair,
        HARD_LANE_REPAIR_OPCODE,
        RegisterAccess::ReadWrite,
        lane::LANE_REMAP_WDR_WIDTH,
        Support::ALL.difference(Support::SAMSUNG_B_DIE),
        WirFlags::DESTRUCTIVE,
    ),
    // Hard row repair, one encoding per fuse layout
    entry(
        WirType::HardRowRepair,
        samsung::HARD_ROW_REPAIR_OPCODE,
        RegisterAccess::Write,
        samsung::BDIE_ROW_FUSE.width,
        Support::SAMSUNG_B_DIE,
        WirFlags::DESTRUCTIVE,
    ),
    entry(
        WirType::HardRowRepair,
        samsung::HARD_ROW_REPAIR_OPCODE,
        RegisterAccess::Write,
        samsung::XDIE_ROW_FUSE.width,
        Support::SAMSUNG_X_DIE,
        WirFlags::DESTRUCTIVE,
    ),
    entry(
        WirType::HardRowRepair,
        samsung::HARD_ROW_REPAIR_OPCODE,
        RegisterAccess::Write,
        samsung::HBM2E_ROW_FUSE.width,
        Support::SAMSUNG_HBM2E,
        WirFlags::DESTRUCTIVE,
    ),
    entry(
        WirType::HardRowRepair,
        skhynix::HARD_ROW_REPAIR_OPCODE,
        RegisterAccess::Write,
        skhynix::HBM2_ROW_FUSE.width,
        Support::SK_HYNIX_HBM2,
        WirFlags::DESTRUCTIVE,
    ),
    entry(
        WirType::HardRowRepair,
        skhynix::HARD_ROW_REPAIR_OPCODE,
        RegisterAccess::Write,
        skhynix::HBM2E_ROW_FUSE.width,
        Support::SK_HYNIX_HBM2E,
        WirFlags::DESTRUCTIVE,
    ),
    entry(
        WirType::HardRowRepair,
        micron::HARD_ROW_REPAIR_OPCODE,
        RegisterAccess::Write,
        micron::HBM2E_ROW_FUSE.width,
        Support::MICRON_HBM2E,
        WirFlags::DESTRUCTIVE,
    ),
    // Spare-row availability scans
    entry(
        WirType::SpareRowScan,
        samsung::BDIE_FUSE_SCAN_OPCODE,
        RegisterAccess::ReadWrite,
        samsung::BDIE_SPARE_SCAN.width,
        Support::SAMSUNG_B_DIE,
        WirFlags::VENDOR_SPECIFIC,
    ),
    entry(
        WirType::SpareRowScan,
        samsung::FUSE_SCAN_OPCODE,
        RegisterAccess::ReadWrite,
        samsung::XDIE_GV100_SPARE_SCAN.width,
        Support::SAMSUNG_X_DIE_GV100,
        WirFlags::VENDOR_SPECIFIC,
    ),
    entry(
        WirType::SpareRowScan,
        samsung::FUSE_SCAN_OPCODE,
        RegisterAccess::ReadWrite,
        samsung::XDIE_GA100_SPARE_SCAN.width,
        Support::SAMSUNG_X_DIE_GA100,
        WirFlags::VENDOR_SPECIFIC,
    ),
    entry(
        WirType::SpareRowScan,
        samsung::FUSE_SCAN_OPCODE,
        RegisterAccess::ReadWrite,
        samsung::HBM2E_SPARE_SCAN.width,
        Support::SAMSUNG_HBM2E,
        WirFlags::VENDOR_SPECIFIC,
    ),
    entry(
        WirType::SpareRowScan,
        skhynix::SPARE_ROW_SCAN_OPCODE,
        RegisterAccess::ReadWrite,
        skhynix::HBM2_SPARE_SCAN.width,
        Support::SK_HYNIX_HBM2,
        WirFlags::VENDOR_SPECIFIC,
    ),
    entry(
        WirType::SpareRowScan,
        skhynix::SPARE_ROW_SCAN_OPCODE,
        RegisterAccess::ReadWrite,
        skhynix::HBM2E_SPARE_SCAN.width,
        Support::SK_HYNIX_HBM2E,
        WirFlags::VENDOR_SPECIFIC,
    ),
    entry(
        WirType::SpareRowScan,
        micron::SPARE_ROW_SCAN_OPCODE,
        RegisterAccess::ReadWrite,
        micron::HBM2E_SPARE_SCAN.width,
        Support::MICRON_HBM2E,
        WirFlags::VENDOR_SPECIFIC,
    ),
    // Fuse programming guards
    entry(
        WirType::RepairUnlock,
        skhynix::REPAIR_UNLOCK_OPCODE,
        RegisterAccess::Write,
        skhynix::REPAIR_UNLOCK_WIDTH,
        Support::SK_HYNIX,
        WirFlags::CHANNEL_AGNOSTIC.union(WirFlags::VENDOR_SPECIFIC),
    ),
    entry(
        WirType::RepairMode,
        micron::REPAIR_MODE_OPCODE,
        RegisterAccess::Write,
        1,
        Support::MICRON_HBM2E,
        WirFlags::CHANNEL_AGNOSTIC.union(WirFlags::VENDOR_SPECIFIC),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_at_most_one_entry_per_type_and_variant() {
        for variant in DieVariant::ALL {
            let support = Support::for_variant(variant);
            let mut seen = HashSet::new();
            for wir in CATALOG.iter().filter(|w| w.support.intersects(support)) {
                assert!(
                    seen.insert(wir.wir_type),
                    "{} listed twice for {}",
                    wir.wir_type,
                    variant
                );
            }
        }
    }

    #[test]
    fn test_destructive_entries_are_fuse_writes() {
        for wir in CATALOG.iter().filter(|w| w.is_destructive()) {
            assert!(matches!(
                wir.wir_type,
                WirType::HardLaneRepair | WirType::HardRowRepair
            ));
        }
    }

    #[test]
    fn test_scan_widths_match_layouts() {
        for variant in DieVariant::ALL {
            let profile = hr_vendor::profile(variant);
            let support = Support::for_variant(variant);
            let scan = CATALOG
                .iter()
                .find(|w| w.wir_type == WirType::SpareRowScan && w.support.intersects(support))
                .unwrap();
            assert_eq!(scan.bit_width, profile.spare_scan.width);
            assert_eq!(scan.opcode, profile.spare_scan_opcode);

            let hard_row = CATALOG
                .iter()
                .find(|w| w.wir_type == WirType::HardRowRepair && w.support.intersects(support))
                .unwrap();
            assert_eq!(hard_row.bit_width, profile.row_fuse.width);
            assert_eq!(hard_row.opcode, profile.hard_row_opcode);
        }
    }
}
