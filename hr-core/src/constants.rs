//! Constants for the HBM repair engine
//!
//! Centralizes architecture constants, scan register geometry and the
//! mandated protocol delays. Vendor-specific layouts live in `hr_vendor`.

use hr_vendor::GpuArch;

/// GPU-side memory partition geometry
pub mod arch {
    use super::GpuArch;

    /// HBM channels per site
    pub const CHANNELS_PER_SITE: u32 = 8;

    /// Physical FBPAs wired to one site
    pub const FBPAS_PER_SITE: u32 = 2;

    /// Subpartitions per FBPA
    pub const SUBPS_PER_FBPA: u32 = 2;

    /// Channels sharing one subpartition
    pub const CHANNELS_PER_SUBP: u32 = 2;

    /// Geometry that differs between GPU architectures
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArchParams {
        pub arch: GpuArch,
        /// HBM sites on the package (before floorsweeping)
        pub sites: u32,
        /// Data bus width of one subpartition, in bits
        pub subp_bus_width_bits: u32,
        /// DWORDs carried by one subpartition
        pub dwords_per_subp: u32,
    }

    pub const fn params(arch: GpuArch) -> ArchParams {
        match arch {
            GpuArch::Gv100 => ArchParams {
                arch,
                sites: 4,
                subp_bus_width_bits: 256,
                dwords_per_subp: 8,
            },
            GpuArch::Ga100 => ArchParams {
                arch,
                sites: 6,
                subp_bus_width_bits: 256,
                dwords_per_subp: 8,
            },
        }
    }
}

/// HBM-side addressing limits
pub mod hbm {
    pub const MAX_SITES: u32 = 8;
    pub const MAX_STACKS: u32 = 4;
    pub const CHANNELS: u32 = super::arch::CHANNELS_PER_SITE;
    pub const PSEUDO_CHANNELS: u32 = 2;
    pub const BANKS: u32 = 16;
    pub const DWORDS_PER_CHANNEL: u32 = 4;
    pub const DWORDS_PER_PSEUDO_CHANNEL: u32 = 2;
    pub const BYTES_PER_DWORD: u32 = 4;
    pub const BITS_PER_BYTE: u32 = 8;
    /// Largest row address of any supported die
    pub const MAX_ROW_BITS: u32 = 15;
}

/// Lane remap encoding
pub mod lane {
    /// Width of a DWORD remap value
    pub const DWORD_REMAP_WIDTH: u32 = 16;

    /// Data bits in a DWORD
    pub const DWORD_WIDTH_BITS: u32 = 32;

    /// Data bits covered by one byte pair, which shares one spare lane
    pub const BYTE_PAIR_WIDTH_BITS: u32 = 16;

    /// Independent byte-pair repairs one DWORD remap can hold
    pub const REPAIRS_PER_DWORD: u32 = DWORD_WIDTH_BITS / BYTE_PAIR_WIDTH_BITS;

    /// DWORD remap meaning "no repair"
    pub const NO_REMAP: u16 = 0xFFFF;

    /// Byte-pair field meaning "no repair"
    pub const PAIR_NO_REPAIR: u8 = 0xFF;

    /// Nibble placed in the unrepaired byte of a repaired pair
    pub const PAIRED_BYTE_SENTINEL: u8 = 0xA;

    /// Unprogrammed nibble
    pub const NIBBLE_UNSET: u8 = 0xF;

    /// Repair-type nibbles
    pub const DM_NIBBLE: u8 = 0;
    pub const DATA_NIBBLE_BASE: u8 = 1;
    pub const DBI_NIBBLE: u8 = 9;

    /// SOFT/HARD_LANE_REPAIR WDR geometry
    pub const LANE_REMAP_WDR_WIDTH: u32 = 72;
    pub const AWORD_REMAP_OFFSET: u32 = 64;
    pub const AWORD_REMAP_WIDTH: u32 = 8;
}

/// Mandated protocol delays
pub mod timing {
    /// Settle time after every WIR/WDR write
    pub const WIR_SETTLE_US: u64 = 10;

    /// Settle time between a spare-scan select and its readback
    pub const SCAN_SETTLE_US: u64 = 5;

    /// Settle time after a soft repair register write
    pub const SOFT_REPAIR_SETTLE_US: u64 = 100;

    /// Settle time after the vendor unlock / repair-mode write
    pub const REPAIR_GUARD_SETTLE_US: u64 = 50;

    /// Wait after a hard lane fuse burn
    pub const HARD_LANE_BURN_DELAY_MS: u64 = 250;

    /// Wait between ordered nibble burns
    pub const NIBBLE_BURN_DELAY_MS: u64 = 20;

    /// Wait after a site reset before the die accepts scan traffic again
    pub const SITE_RESET_SETTLE_MS: u64 = 50;
}
