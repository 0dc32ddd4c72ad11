//! Field layout descriptions for vendor fuse and scan registers
//!
//! These are plain data: the generic codecs in the core crate interpret them.
//! Each die variant provides one `VariantProfile` built from these types.

use crate::types::DieVariant;

/// A contiguous bit field inside a scan register value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    pub offset: u32,
    pub width: u32,
}

impl BitField {
    pub const fn new(offset: u32, width: u32) -> Self {
        Self { offset, width }
    }

    /// Mask of the field's bits at their final position
    pub const fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            ((1u64 << self.width) - 1) << self.offset
        }
    }

    /// Largest value the field can hold
    pub const fn max_value(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    pub const fn fits(&self, value: u64) -> bool {
        value <= self.max_value()
    }

    pub const fn extract(&self, raw: u64) -> u64 {
        (raw & self.mask()) >> self.offset
    }

    /// Insert `value` into `raw`, truncating to the field width
    pub const fn insert(&self, raw: u64, value: u64) -> u64 {
        (raw & !self.mask()) | ((value << self.offset) & self.mask())
    }
}

/// Hard row-repair fuse write layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowFuseLayout {
    /// Register width in bits
    pub width: u32,
    pub row: BitField,
    /// Low row-address bits not stored in the fuse (rows sharing one fuse)
    pub row_shift: u32,
    pub bank: BitField,
    pub pseudo_channel: BitField,
    pub stack: BitField,
    /// Spare slot selector; `None` when the die picks the next free spare itself
    pub fuse_index: Option<BitField>,
    /// Bit that must be set to start the burn
    pub start_bit: Option<u32>,
    /// Bits that must always read as zero
    pub reserved_mask: u64,
}

/// How the stack ID is selected in a spare-scan command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackSelect {
    /// One bit per stack starting at `offset`
    OneHot { offset: u32, stacks: u32 },
    /// Binary stack index
    Binary(BitField),
}

impl StackSelect {
    pub const fn max_stacks(&self) -> u32 {
        match *self {
            StackSelect::OneHot { stacks, .. } => stacks,
            StackSelect::Binary(field) => 1 << field.width,
        }
    }
}

/// Spare-row availability scan layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpareScanLayout {
    pub width: u32,
    /// Readback bit: 0 = spare available, 1 = spare consumed
    pub status_bit: u32,
    /// Position of the table-provided fuse scan mask
    pub mask: BitField,
    pub stack_select: StackSelect,
    /// Readback field holding the (shifted) row stored in a consumed spare
    pub readback_row: BitField,
}

/// Everything the codecs need to know about one die variant
#[derive(Debug, Clone, Copy)]
pub struct VariantProfile {
    pub variant: DieVariant,
    pub row_fuse: RowFuseLayout,
    pub spare_scan: SpareScanLayout,
    pub spare_slots_per_bank: usize,
    /// Row address bits of the die
    pub row_bits: u32,
    /// Mandated wait after a fuse burn command, in milliseconds
    pub burn_delay_ms: u64,
    pub hard_row_opcode: u32,
    pub spare_scan_opcode: u32,
    /// `[pseudo_channel][bank][slot]` lookup into the variant's scan mask table
    pub scan_mask: fn(usize, usize, usize) -> Option<u32>,
}

impl VariantProfile {
    /// Number of rows per bank
    pub fn rows_per_bank(&self) -> u32 {
        1 << self.row_bits
    }

    /// Highest stack index the variant can address
    pub fn max_stacks(&self) -> u32 {
        let row_stacks = 1u32 << self.row_fuse.stack.width;
        row_stacks.min(self.spare_scan.stack_select.max_stacks())
    }

    /// Reverse lookup of a scan mask to its `(pseudo_channel, bank, slot)`
    pub fn locate_scan_mask(&self, mask: u32) -> Option<(usize, usize, usize)> {
        for pc in 0..crate::constants::PSEUDO_CHANNELS_PER_CHANNEL {
            for bank in 0..crate::constants::BANKS_PER_PSEUDO_CHANNEL {
                for slot in 0..self.spare_slots_per_bank {
                    if (self.scan_mask)(pc, bank, slot) == Some(mask) {
                        return Some((pc, bank, slot));
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitfield_insert_extract() {
        let field = BitField::new(14, 4);
        assert_eq!(field.mask(), 0x3C000);
        let raw = field.insert(0, 0xB);
        assert_eq!(raw, 0xB << 14);
        assert_eq!(field.extract(raw), 0xB);
        assert!(field.fits(15));
        assert!(!field.fits(16));
    }

    #[test]
    fn test_bitfield_insert_preserves_other_bits() {
        let field = BitField::new(4, 4);
        assert_eq!(field.insert(0xFFFF, 0x3), 0xFF3F);
    }

    #[test]
    fn test_stack_select_capacity() {
        assert_eq!(StackSelect::OneHot { offset: 20, stacks: 2 }.max_stacks(), 2);
        assert_eq!(StackSelect::Binary(BitField::new(21, 2)).max_stacks(), 4);
    }
}
