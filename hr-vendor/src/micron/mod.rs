//! Micron HBM2e fuse layout and spare-scan table
//!
//! Micron places reserved guard nibbles at both ends of the hard repair
//! register and requires the die to be switched into repair mode around
//! every hard repair.

use crate::layout::{BitField, RowFuseLayout, SpareScanLayout, StackSelect, VariantProfile};
use crate::types::DieVariant;

pub const HARD_ROW_REPAIR_OPCODE: u32 = 0x08;

pub const SPARE_ROW_SCAN_OPCODE: u32 = 0x19;

/// Repair mode select instruction (1 = enter, 0 = exit)
pub const REPAIR_MODE_OPCODE: u32 = 0x18;

pub const HBM2E_ROW_FUSE: RowFuseLayout = RowFuseLayout {
    width: 32,
    row: BitField::new(13, 15),
    row_shift: 0,
    bank: BitField::new(9, 4),
    pseudo_channel: BitField::new(7, 1),
    stack: BitField::new(8, 1),
    fuse_index: Some(BitField::new(5, 2)),
    start_bit: Some(4),
    reserved_mask: 0xF000_000F,
};

pub const HBM2E_SPARE_SCAN: SpareScanLayout = SpareScanLayout {
    width: 25,
    status_bit: 0,
    mask: BitField::new(1, 23),
    stack_select: StackSelect::Binary(BitField::new(24, 1)),
    readback_row: BitField::new(1, 15),
};

pub const HBM2E_SPARES_PER_BANK: usize = 4;

/// HBM2e spare-row scan masks, `[pseudo_channel][bank][spare]`
pub const HBM2E_SPARE_SCAN_MASKS: [[[u32; HBM2E_SPARES_PER_BANK]; 16]; 2] = [
    // PC0
    [
        [0x52E245, 0x77A853, 0x7F63E4, 0x076057], // bank 0
        [0x00EF2B, 0x11801F, 0x7724C6, 0x371F1B], // bank 1
        [0x5DEAE5, 0x0C8786, 0x422563, 0x493520], // bank 2
        [0x587376, 0x1A7DDF, 0x0D0396, 0x28622F], // bank 3
        [0x64F8F8, 0x11371B, 0x317452, 0x4B005A], // bank 4
        [0x02EBEC, 0x4B8308, 0x68AB55, 0x7A9301], // bank 5
        [0x7F9F6D, 0x49C85E, 0x344004, 0x29DD87], // bank 6
        [0x190056, 0x6F6238, 0x6C1DA1, 0x6CFC72], // bank 7
        [0x2DBBE3, 0x09F5EB, 0x07A037, 0x48A27B], // bank 8
        [0x4D0D04, 0x56B86E, 0x58C72D, 0x7AE4DB], // bank 9
        [0x3CE36E, 0x727820, 0x2D0245, 0x479FE6], // bank 10
        [0x6F26F6, 0x720412, 0x568C23, 0x48884F], // bank 11
        [0x5B0CC8, 0x526737, 0x610BD0, 0x52A139], // bank 12
        [0x669D0E, 0x24BFD4, 0x2B0C1B, 0x0AA661], // bank 13
        [0x6DD87A, 0x2825E6, 0x0F8E5F, 0x7B0E5F], // bank 14
        [0x1F31DC, 0x3484EF, 0x1AD526, 0x1296F9], // bank 15
    ],
    // PC1
    [
        [0x593B32, 0x45CD40, 0x1577B7, 0x604F43], // bank 0
        [0x7F6F75, 0x1320CC, 0x50A2BB, 0x30159F], // bank 1
        [0x0BEAF3, 0x39D39C, 0x362708, 0x0BECB5], // bank 2
        [0x005273, 0x454579, 0x751CA3, 0x05BA5B], // bank 3
        [0x213072, 0x6F633A, 0x4D9B15, 0x4D72BF], // bank 4
        [0x05D778, 0x24B8A3, 0x74E4DE, 0x101C68], // bank 5
        [0x16887E, 0x303552, 0x64D249, 0x5B6DE9], // bank 6
        [0x046D39, 0x42E43D, 0x174A72, 0x63E50A], // bank 7
        [0x409572, 0x1B4E77, 0x6C24F2, 0x5062CF], // bank 8
        [0x078943, 0x0B5FD4, 0x0062F3, 0x287BE6], // bank 9
        [0x33ADCC, 0x5F77BD, 0x10B749, 0x226778], // bank 10
        [0x7572CD, 0x2D1194, 0x48340E, 0x079276], // bank 11
        [0x406B1F, 0x776FF9, 0x763ADE, 0x08D612], // bank 12
        [0x47CEF5, 0x57FC80, 0x54F7B1, 0x3FC057], // bank 13
        [0x52E81D, 0x395B9A, 0x5A8F5E, 0x2DDF71], // bank 14
        [0x00A4A5, 0x621756, 0x0C4DCB, 0x64E9BD], // bank 15
    ],
];

fn hbm2e_scan_mask(pc: usize, bank: usize, slot: usize) -> Option<u32> {
    HBM2E_SPARE_SCAN_MASKS.get(pc)?.get(bank)?.get(slot).copied()
}

pub static HBM2E_PROFILE: VariantProfile = VariantProfile {
    variant: DieVariant::MicronHbm2e,
    row_fuse: HBM2E_ROW_FUSE,
    spare_scan: HBM2E_SPARE_SCAN,
    spare_slots_per_bank: HBM2E_SPARES_PER_BANK,
    row_bits: 15,
    burn_delay_ms: 100,
    hard_row_opcode: HARD_ROW_REPAIR_OPCODE,
    spare_scan_opcode: SPARE_ROW_SCAN_OPCODE,
    scan_mask: hbm2e_scan_mask,
};
