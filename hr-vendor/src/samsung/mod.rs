//! Samsung HBM2 / HBM2e fuse layouts and spare-scan tables
//!
//! B-die and X-die parts expose the spare-row fuse scan through a vendor WIR
//! whose payload is a per-(pseudo-channel, bank, spare) mask taken from the
//! die's electrical design. The masks are not derivable from the address.

use crate::layout::{BitField, RowFuseLayout, SpareScanLayout, StackSelect, VariantProfile};
use crate::types::DieVariant;

/// JEDEC HARD_REPAIR opcode, shared by all Samsung dies
pub const HARD_ROW_REPAIR_OPCODE: u32 = 0x08;

/// Fuse scan opcode on B-die
pub const BDIE_FUSE_SCAN_OPCODE: u32 = 0x1B;

/// Fuse scan opcode on X-die and HBM2e
pub const FUSE_SCAN_OPCODE: u32 = 0x1C;

// ============================================================================
// B-die
// ============================================================================

pub const BDIE_ROW_FUSE: RowFuseLayout = RowFuseLayout {
    width: 23,
    row: BitField::new(0, 14),
    row_shift: 0,
    bank: BitField::new(14, 4),
    pseudo_channel: BitField::new(18, 1),
    stack: BitField::new(19, 1),
    fuse_index: None,
    start_bit: Some(20),
    reserved_mask: 0x60_0000,
};

pub const BDIE_SPARE_SCAN: SpareScanLayout = SpareScanLayout {
    width: 24,
    status_bit: 0,
    mask: BitField::new(1, 19),
    stack_select: StackSelect::OneHot { offset: 20, stacks: 2 },
    readback_row: BitField::new(1, 14),
};

pub const BDIE_SPARES_PER_BANK: usize = 2;

/// B-die fuse scan masks, `[pseudo_channel][bank][spare]`
pub const BDIE_SPARE_SCAN_MASKS: [[[u32; BDIE_SPARES_PER_BANK]; 16]; 2] = [
    // PC0
    [
        [0x5D5D3, 0x66B43], // bank 0
        [0x07503, 0x0EA0A], // bank 1
        [0x3F9B7, 0x66D1C], // bank 2
        [0x73B00, 0x67C11], // bank 3
        [0x43F93, 0x3B01C], // bank 4
        [0x5EC86, 0x1DB35], // bank 5
        [0x26789, 0x41997], // bank 6
        [0x6BED5, 0x023B4], // bank 7
        [0x3A2F9, 0x18D26], // bank 8
        [0x68176, 0x7C8C8], // bank 9
        [0x60CAE, 0x01096], // bank 10
        [0x5DAF4, 0x166CE], // bank 11
        [0x787FD, 0x2E353], // bank 12
        [0x0E61B, 0x3C3AA], // bank 13
        [0x15B3E, 0x367DD], // bank 14
        [0x008DB, 0x6F4D3], // bank 15
    ],
    // PC1
    [
        [0x3EAB6, 0x19705], // bank 0
        [0x4DA68, 0x0A809], // bank 1
        [0x0BC78, 0x7989C], // bank 2
        [0x20E1E, 0x0F220], // bank 3
        [0x22ACA, 0x51FAD], // bank 4
        [0x59D9F, 0x3783D], // bank 5
        [0x67BE7, 0x0842C], // bank 6
        [0x287FD, 0x06498], // bank 7
        [0x773FB, 0x2FD55], // bank 8
        [0x4BAFA, 0x26D1A], // bank 9
        [0x49365, 0x0BCDD], // bank 10
        [0x6880A, 0x6A98E], // bank 11
        [0x04546, 0x5B874], // bank 12
        [0x3D9E9, 0x2BBBB], // bank 13
        [0x1BE2B, 0x4731A], // bank 14
        [0x7EA13, 0x66742], // bank 15
    ],
];

fn bdie_scan_mask(pc: usize, bank: usize, slot: usize) -> Option<u32> {
    BDIE_SPARE_SCAN_MASKS.get(pc)?.get(bank)?.get(slot).copied()
}

pub static BDIE_PROFILE: VariantProfile = VariantProfile {
    variant: DieVariant::SamsungBDie,
    row_fuse: BDIE_ROW_FUSE,
    spare_scan: BDIE_SPARE_SCAN,
    spare_slots_per_bank: BDIE_SPARES_PER_BANK,
    row_bits: 14,
    burn_delay_ms: 400,
    hard_row_opcode: HARD_ROW_REPAIR_OPCODE,
    spare_scan_opcode: BDIE_FUSE_SCAN_OPCODE,
    scan_mask: bdie_scan_mask,
};

// ============================================================================
// X-die (GV100 and GA100 share the die, differ in scan stack select)
// ============================================================================

pub const XDIE_ROW_FUSE: RowFuseLayout = RowFuseLayout {
    width: 26,
    row: BitField::new(0, 14),
    row_shift: 0,
    bank: BitField::new(14, 4),
    pseudo_channel: BitField::new(18, 1),
    stack: BitField::new(19, 1),
    fuse_index: Some(BitField::new(20, 2)),
    start_bit: Some(22),
    reserved_mask: 0x380_0000,
};

pub const XDIE_GV100_SPARE_SCAN: SpareScanLayout = SpareScanLayout {
    width: 23,
    status_bit: 0,
    mask: BitField::new(1, 20),
    stack_select: StackSelect::OneHot { offset: 21, stacks: 2 },
    readback_row: BitField::new(1, 14),
};

pub const XDIE_GA100_SPARE_SCAN: SpareScanLayout = SpareScanLayout {
    width: 22,
    status_bit: 0,
    mask: BitField::new(1, 20),
    stack_select: StackSelect::Binary(BitField::new(21, 1)),
    readback_row: BitField::new(1, 14),
};

pub const XDIE_SPARES_PER_BANK: usize = 4;

/// X-die fuse scan masks, `[pseudo_channel][bank][spare]`
pub const XDIE_SPARE_SCAN_MASKS: [[[u32; XDIE_SPARES_PER_BANK]; 16]; 2] = [
    // PC0
    [
        [0x1F0C4, 0x20A8F, 0x28326, 0x20276], // bank 0
        [0x7DE2A, 0x58E0A, 0x53803, 0x5DCFC], // bank 1
        [0xDC7A6, 0x75ECC, 0x98427, 0x42CF8], // bank 2
        [0x46473, 0x789ED, 0x5738E, 0x729A3], // bank 3
        [0xDDAAD, 0x4765B, 0x07B11, 0xC7201], // bank 4
        [0x8CFC5, 0x932DB, 0x7FA67, 0x16240], // bank 5
        [0x6065D, 0x2BDA0, 0xA7E03, 0x33323], // bank 6
        [0x2F4E6, 0x3ABD5, 0xD6DE1, 0x7E956], // bank 7
        [0x72CFF, 0xC804A, 0xC9021, 0x11F7C], // bank 8
        [0x47BE2, 0xD018E, 0x47009, 0x680D6], // bank 9
        [0x87B02, 0x9C2CC, 0xEE950, 0x4B3EE], // bank 10
        [0xC963B, 0xF4AFF, 0x3342C, 0xC5147], // bank 11
        [0x09A55, 0x9BA12, 0xB84CD, 0x8FDF7], // bank 12
        [0x2FB68, 0x52C58, 0x23E89, 0x3BF5A], // bank 13
        [0xCD613, 0xE8816, 0x8DE6F, 0x8CE02], // bank 14
        [0xD1E79, 0x697CA, 0x3C095, 0x272D1], // bank 15
    ],
    // PC1
    [
        [0x72802, 0xCC06F, 0xDE56F, 0x26466], // bank 0
        [0xF8544, 0x93868, 0xA6653, 0x57869], // bank 1
        [0x2F0FE, 0xD3FAB, 0x3DD42, 0xE0BBC], // bank 2
        [0xE2B91, 0xF96E9, 0x59BF6, 0x7AF54], // bank 3
        [0x3820D, 0x24F19, 0xF9438, 0x2D52F], // bank 4
        [0x93EAB, 0x488F4, 0xF1838, 0x50ECE], // bank 5
        [0x67D8A, 0x31165, 0x739F7, 0x81E49], // bank 6
        [0x90685, 0x0EF37, 0x83183, 0x809BE], // bank 7
        [0xEFCD1, 0x96DFB, 0xA8A9E, 0x98DD4], // bank 8
        [0xC5A99, 0xCF704, 0xBCA84, 0xE4999], // bank 9
        [0x527FE, 0x57D65, 0xE1204, 0x6C9E9], // bank 10
        [0x0B674, 0x8DDD1, 0x544FA, 0xEFA08], // bank 11
        [0x251F5, 0x9CFE8, 0x18D35, 0x858A6], // bank 12
        [0xE52A1, 0x2BF36, 0xB6FBC, 0x4BAF2], // bank 13
        [0x4E523, 0xF8F1D, 0x3A9EC, 0x62B02], // bank 14
        [0xFC735, 0xAC594, 0x45CBE, 0x57D6E], // bank 15
    ],
];

fn xdie_scan_mask(pc: usize, bank: usize, slot: usize) -> Option<u32> {
    XDIE_SPARE_SCAN_MASKS.get(pc)?.get(bank)?.get(slot).copied()
}

pub static XDIE_GV100_PROFILE: VariantProfile = VariantProfile {
    variant: DieVariant::SamsungXDieGv100,
    row_fuse: XDIE_ROW_FUSE,
    spare_scan: XDIE_GV100_SPARE_SCAN,
    spare_slots_per_bank: XDIE_SPARES_PER_BANK,
    row_bits: 14,
    burn_delay_ms: 200,
    hard_row_opcode: HARD_ROW_REPAIR_OPCODE,
    spare_scan_opcode: FUSE_SCAN_OPCODE,
    scan_mask: xdie_scan_mask,
};

pub static XDIE_GA100_PROFILE: VariantProfile = VariantProfile {
    variant: DieVariant::SamsungXDieGa100,
    row_fuse: XDIE_ROW_FUSE,
    spare_scan: XDIE_GA100_SPARE_SCAN,
    spare_slots_per_bank: XDIE_SPARES_PER_BANK,
    row_bits: 14,
    burn_delay_ms: 200,
    hard_row_opcode: HARD_ROW_REPAIR_OPCODE,
    spare_scan_opcode: FUSE_SCAN_OPCODE,
    scan_mask: xdie_scan_mask,
};

// ============================================================================
// HBM2e
// ============================================================================

pub const HBM2E_ROW_FUSE: RowFuseLayout = RowFuseLayout {
    width: 28,
    row: BitField::new(0, 15),
    row_shift: 0,
    bank: BitField::new(15, 4),
    pseudo_channel: BitField::new(19, 1),
    stack: BitField::new(20, 2),
    fuse_index: Some(BitField::new(22, 2)),
    start_bit: Some(24),
    reserved_mask: 0xE00_0000,
};

pub const HBM2E_SPARE_SCAN: SpareScanLayout = SpareScanLayout {
    width: 23,
    status_bit: 0,
    mask: BitField::new(1, 20),
    stack_select: StackSelect::Binary(BitField::new(21, 2)),
    readback_row: BitField::new(1, 15),
};

pub const HBM2E_SPARES_PER_BANK: usize = 4;

/// HBM2e fuse scan masks, `[pseudo_channel][bank][spare]`
pub const HBM2E_SPARE_SCAN_MASKS: [[[u32; HBM2E_SPARES_PER_BANK]; 16]; 2] = [
    // PC0
    [
        [0x6E2AF, 0x6CE17, 0xD30DC, 0xCFA0F], // bank 0
        [0x0EABC, 0x6556A, 0xEAAEF, 0xDA592], // bank 1
        [0x5416A, 0xC346F, 0x313FD, 0xE5028], // bank 2
        [0x69947, 0x40B1C, 0x58E40, 0xED8F2], // bank 3
        [0xD2F83, 0x54A6D, 0x0EA31, 0x3347A], // bank 4
        [0xFEA32, 0x5656F, 0x720DE, 0x2B6C5], // bank 5
        [0xE5623, 0x7B55D, 0xA28A9, 0xADD0F], // bank 6
        [0x07C2E, 0xA4D1E, 0xCD539, 0xB9115], // bank 7
        [0xFD097, 0x834CA, 0xF8DB0, 0x5B138], // bank 8
        [0x3A563, 0xC07CD, 0xA5A55, 0x0A63A], // bank 9
        [0xF8CCB, 0xE2EEF, 0x4F617, 0x6F745], // bank 10
        [0x5C1CC, 0xC519F, 0xBB12C, 0x8EB36], // bank 11
        [0xAF853, 0x11261, 0xC7F0B, 0x50E7F], // bank 12
        [0xACB1B, 0x341D9, 0xC61E6, 0x74105], // bank 13
        [0xE4390, 0x6B19F, 0x053DF, 0x81C42], // bank 14
        [0x1C7AC, 0x1D083, 0x7CDF0, 0x1D531], // bank 15
    ],
    // PC1
    [
        [0xAC0E4, 0x7983F, 0x72926, 0x95FAD], // bank 0
        [0xFFFAE, 0xCB56E, 0x65D82, 0xD8880], // bank 1
        [0x6DF9A, 0xBEA3C, 0x2C6EC, 0xE8AE8], // bank 2
        [0xAC7EE, 0x2202A, 0x59254, 0xB88D3], // bank 3
        [0xDF461, 0xF0E9A, 0x51790, 0xF9369], // bank 4
        [0xFBB0C, 0xE20AC, 0xCD767, 0x4FAC7], // bank 5
        [0xB87F5, 0xE174A, 0x626C4, 0x8AEF3], // bank 6
        [0x051B4, 0x46EF2, 0x21D28, 0x80FAE], // bank 7
        [0xF0915, 0xCC34C, 0xAF1A3, 0xCBC0A], // bank 8
        [0x9E25B, 0x8CD6C, 0x6E230, 0x11557], // bank 9
        [0x74190, 0x2A959, 0x804CA, 0x9FCB4], // bank 10
        [0x51501, 0xB617C, 0x665C2, 0xFE5CC], // bank 11
        [0xDA65B, 0x661A4, 0x32011, 0xC355C], // bank 12
        [0x0324C, 0xA51A7, 0x55D9A, 0x9192E], // bank 13
        [0x80163, 0x1D9D3, 0x8D967, 0x57DD3], // bank 14
        [0x8C936, 0xEA6E1, 0x16D91, 0x56806], // bank 15
    ],
];

fn hbm2e_scan_mask(pc: usize, bank: usize, slot: usize) -> Option<u32> {
    HBM2E_SPARE_SCAN_MASKS.get(pc)?.get(bank)?.get(slot).copied()
}

pub static HBM2E_PROFILE: VariantProfile = VariantProfile {
    variant: DieVariant::SamsungHbm2e,
    row_fuse: HBM2E_ROW_FUSE,
    spare_scan: HBM2E_SPARE_SCAN,
    spare_slots_per_bank: HBM2E_SPARES_PER_BANK,
    row_bits: 15,
    burn_delay_ms: 300,
    hard_row_opcode: HARD_ROW_REPAIR_OPCODE,
    spare_scan_opcode: FUSE_SCAN_OPCODE,
    scan_mask: hbm2e_scan_mask,
};
