//! Vendor identification constants

/// JEDEC manufacturer ID reported by Samsung HBM stacks
pub const SAMSUNG_MANUFACTURER_ID: u32 = 0x1;

/// JEDEC manufacturer ID reported by SK hynix HBM stacks
pub const SKHYNIX_MANUFACTURER_ID: u32 = 0x6;

/// JEDEC manufacturer ID reported by Micron HBM stacks
pub const MICRON_MANUFACTURER_ID: u32 = 0xF;

/// Samsung part codes carried in the DEVICE_ID die field
pub mod samsung_die {
    /// HBM2e parts carry no die code
    pub const STANDARD: u32 = 0x0;
    pub const B_DIE: u32 = 0x2;
    pub const X_DIE: u32 = 0x4;
}

/// DEVICE_ID register field positions (first 32-bit word of the 82-bit WDR)
pub mod device_id {
    /// Total DEVICE_ID WDR width in bits
    pub const WIDTH_BITS: u32 = 82;

    pub const MANUFACTURER_SHIFT: u32 = 0;
    pub const MANUFACTURER_MASK: u32 = 0xF;

    pub const DIE_SHIFT: u32 = 4;
    pub const DIE_MASK: u32 = 0xF;

    pub const REVISION_SHIFT: u32 = 8;
    pub const REVISION_MASK: u32 = 0xF;

    pub const STACK_HEIGHT_SHIFT: u32 = 12;
    pub const STACK_HEIGHT_MASK: u32 = 0x3;

    pub const SPEC_VERSION_SHIFT: u32 = 14;
    pub const SPEC_VERSION_MASK: u32 = 0x3;
}

/// Banks per pseudo-channel on every supported die
pub const BANKS_PER_PSEUDO_CHANNEL: usize = 16;

/// Pseudo-channels per channel
pub const PSEUDO_CHANNELS_PER_CHANNEL: usize = 2;

/// Dies per stack ID; a stack height of 8 yields two stack IDs
pub const DIES_PER_STACK_ID: u8 = 4;
