//! SK hynix HBM2 / HBM2e fuse layouts and spare-scan tables
//!
//! SK hynix couples two physically adjacent rows (same bank, row address
//! bits [13:1] equal) to one spare fuse, so the fuse only stores `row >> 1`.
//! Hard repairs must be preceded by an unlock key write and followed by a relock.

use crate::layout::{BitField, RowFuseLayout, SpareScanLayout, StackSelect, VariantProfile};
use crate::types::DieVariant;

pub const HARD_ROW_REPAIR_OPCODE: u32 = 0x08;

pub const SPARE_ROW_SCAN_OPCODE: u32 = 0x1E;

/// Vendor repair unlock instruction
pub const REPAIR_UNLOCK_OPCODE: u32 = 0x1D;
pub const REPAIR_UNLOCK_WIDTH: u32 = 16;
pub const REPAIR_UNLOCK_KEY: u32 = 0xA5C3;
pub const REPAIR_RELOCK_KEY: u32 = 0x0000;

/// Number of low row-address bits shared by a coupled row pair
pub const COUPLED_ROW_SHIFT: u32 = 1;

// ============================================================================
// HBM2
// ============================================================================

pub const HBM2_ROW_FUSE: RowFuseLayout = RowFuseLayout {
    width: 21,
    row: BitField::new(0, 13),
    row_shift: COUPLED_ROW_SHIFT,
    bank: BitField::new(13, 4),
    pseudo_channel: BitField::new(17, 1),
    stack: BitField::new(18, 1),
    fuse_index: None,
    start_bit: Some(19),
    reserved_mask: 0x10_0000,
};

pub const HBM2_SPARE_SCAN: SpareScanLayout = SpareScanLayout {
    width: 21,
    status_bit: 0,
    mask: BitField::new(1, 19),
    stack_select: StackSelect::Binary(BitField::new(20, 1)),
    readback_row: BitField::new(1, 13),
};

pub const HBM2_SPARES_PER_BANK: usize = 2;

/// HBM2 spare-row scan masks, `[pseudo_channel][bank][spare]`
pub const HBM2_SPARE_SCAN_MASKS: [[[u32; HBM2_SPARES_PER_BANK]; 16]; 2] = [
    // PC0
    [
        [0x0C195, 0x3B7B0], // bank 0
        [0x59DC9, 0x7FC34], // bank 1
        [0x3DA99, 0x38FCA], // bank 2
        [0x09B1A, 0x0B13F], // bank 3
        [0x269A9, 0x231A3], // bank 4
        [0x2370E, 0x674BC], // bank 5
        [0x11901, 0x07D52], // bank 6
        [0x7F75B, 0x4280A], // bank 7
        [0x2331E, 0x34E70], // bank 8
        [0x756F1, 0x226ED], // bank 9
        [0x29A86, 0x037F7], // bank 10
        [0x784A6, 0x5CE6A], // bank 11
        [0x62976, 0x5DFDC], // bank 12
        [0x41568, 0x09E99], // bank 13
        [0x49650, 0x5B93F], // bank 14
        [0x36DD4, 0x17997], // bank 15
    ],
    // PC1
    [
        [0x6F075, 0x17A13], // bank 0
        [0x280D6, 0x0217C], // bank 1
        [0x136F0, 0x79248], // bank 2
        [0x37FDA, 0x37A92], // bank 3
        [0x7498B, 0x4D3EE], // bank 4
        [0x44382, 0x08595], // bank 5
        [0x5A910, 0x2D9E8], // bank 6
        [0x669A5, 0x42F75], // bank 7
        [0x2AC2B, 0x2C84E], // bank 8
        [0x5DD69, 0x29DE8], // bank 9
        [0x5D703, 0x37851], // bank 10
        [0x67206, 0x45E70], // bank 11
        [0x0B869, 0x21769], // bank 12
        [0x53AA7, 0x04359], // bank 13
        [0x3BCB1, 0x3F8FE], // bank 14
        [0x3B893, 0x50E64], // bank 15
    ],
];

fn hbm2_scan_mask(pc: usize, bank: usize, slot: usize) -> Option<u32> {
    HBM2_SPARE_SCAN_MASKS.get(pc)?.get(bank)?.get(slot).copied()
}

pub static HBM2_PROFILE: VariantProfile = VariantProfile {
    variant: DieVariant::SkHynixHbm2,
    row_fuse: HBM2_ROW_FUSE,
    spare_scan: HBM2_SPARE_SCAN,
    spare_slots_per_bank: HBM2_SPARES_PER_BANK,
    row_bits: 14,
    burn_delay_ms: 500,
    hard_row_opcode: HARD_ROW_REPAIR_OPCODE,
    spare_scan_opcode: SPARE_ROW_SCAN_OPCODE,
    scan_mask: hbm2_scan_mask,
};

// ============================================================================
// HBM2e
// ============================================================================

pub const HBM2E_ROW_FUSE: RowFuseLayout = RowFuseLayout {
    width: 24,
    row: BitField::new(0, 14),
    row_shift: COUPLED_ROW_SHIFT,
    bank: BitField::new(14, 4),
    pseudo_channel: BitField::new(18, 1),
    stack: BitField::new(19, 1),
    fuse_index: Some(BitField::new(20, 1)),
    start_bit: Some(21),
    reserved_mask: 0xC0_0000,
};

pub const HBM2E_SPARE_SCAN: SpareScanLayout = SpareScanLayout {
    width: 22,
    status_bit: 0,
    mask: BitField::new(1, 20),
    stack_select: StackSelect::Binary(BitField::new(21, 1)),
    readback_row: BitField::new(1, 14),
};

pub const HBM2E_SPARES_PER_BANK: usize = 2;

/// HBM2e spare-row scan masks, `[pseudo_channel][bank][spare]`
pub const HBM2E_SPARE_SCAN_MASKS: [[[u32; HBM2E_SPARES_PER_BANK]; 16]; 2] = [
    // PC0
    [
        [0xE5C73, 0x7C013], // bank 0
        [0x9A405, 0x2AFBA], // bank 1
        [0x8F292, 0x4B991], // bank 2
        [0x6CDA9, 0x8E43B], // bank 3
        [0x0BF7A, 0xAD37D], // bank 4
        [0xC2F4D, 0xCA95A], // bank 5
        [0xE1014, 0x729D1], // bank 6
        [0xDF3FD, 0xB29E1], // bank 7
        [0xEEE48, 0x830C0], // bank 8
        [0xEF2C4, 0xEAA69], // bank 9
        [0x4551E, 0x828AC], // bank 10
        [0xE8186, 0xF0208], // bank 11
        [0xDCBBC, 0x01676], // bank 12
        [0xA1039, 0x7104D], // bank 13
        [0x244BA, 0x327D4], // bank 14
        [0x8C04A, 0x70E60], // bank 15
    ],
    // PC1
    [
        [0x9DA48, 0xEA567], // bank 0
        [0x28DAD, 0x95445], // bank 1
        [0x88A63, 0xE54C1], // bank 2
        [0xD727C, 0x49E3E], // bank 3
        [0xFEF96, 0x25E49], // bank 4
        [0x02CCE, 0x5A456], // bank 5
        [0x4E047, 0x2DB50], // bank 6
        [0x6A4CC, 0xC7353], // bank 7
        [0x709D8, 0x2BD5E], // bank 8
        [0x497AD, 0x68382], // bank 9
        [0x84DC8, 0xE6E64], // bank 10
        [0x06D29, 0x9AECD], // bank 11
        [0xD99A8, 0xAADD7], // bank 12
        [0x2414D, 0x82C12], // bank 13
        [0xD89E6, 0x74AF9], // bank 14
        [0x14FED, 0xFC62A], // bank 15
    ],
];

fn hbm2e_scan_mask(pc: usize, bank: usize, slot: usize) -> Option<u32> {
    HBM2E_SPARE_SCAN_MASKS.get(pc)?.get(bank)?.get(slot).copied()
}

pub static HBM2E_PROFILE: VariantProfile = VariantProfile {
    variant: DieVariant::SkHynixHbm2e,
    row_fuse: HBM2E_ROW_FUSE,
    spare_scan: HBM2E_SPARE_SCAN,
    spare_slots_per_bank: HBM2E_SPARES_PER_BANK,
    row_bits: 15,
    burn_delay_ms: 500,
    hard_row_opcode: HARD_ROW_REPAIR_OPCODE,
    spare_scan_opcode: SPARE_ROW_SCAN_OPCODE,
    scan_mask: hbm2e_scan_mask,
};

/// Whether two rows of the same bank are burned by the same fuse
pub fn rows_share_fuse(a: u32, b: u32) -> bool {
    a >> COUPLED_ROW_SHIFT == b >> COUPLED_ROW_SHIFT
}
