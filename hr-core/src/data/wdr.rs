//! Wrapper data register values
//!
//! A WDR value is an arbitrary-width bit vector stored as little-endian
//! 32-bit words. Bits above `bit_width` are always zero.

use serde::{Deserialize, Serialize};
use std::fmt;

const WORD_BITS: u32 = 32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct WdrData {
    bit_width: u32,
    words: Vec<u32>,
}

impl WdrData {
    pub fn zeroed(bit_width: u32) -> Self {
        Self {
            bit_width,
            words: vec![0; Self::word_count(bit_width)],
        }
    }

    /// All-ones value, the unprogrammed state of a fuse register
    pub fn ones(bit_width: u32) -> Self {
        let mut wdr = Self {
            bit_width,
            words: vec![u32::MAX; Self::word_count(bit_width)],
        };
        wdr.clear_unused_bits();
        wdr
    }

    pub fn from_u64(bit_width: u32, value: u64) -> Self {
        let mut wdr = Self::zeroed(bit_width);
        let width = bit_width.min(64);
        wdr.set_field(0, width, value);
        wdr
    }

    /// Build from raw words; missing words read as zero, extra bits are dropped
    pub fn from_words(bit_width: u32, words: &[u32]) -> Self {
        let mut wdr = Self::zeroed(bit_width);
        for (dst, src) in wdr.words.iter_mut().zip(words) {
            *dst = *src;
        }
        wdr.clear_unused_bits();
        wdr
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn bit(&self, index: u32) -> bool {
        if index >= self.bit_width {
            return false;
        }
        self.words[(index / WORD_BITS) as usize] >> (index % WORD_BITS) & 1 == 1
    }

    pub fn set_bit(&mut self, index: u32, value: bool) {
        if index >= self.bit_width {
            return;
        }
        let word = &mut self.words[(index / WORD_BITS) as usize];
        let mask = 1u32 << (index % WORD_BITS);
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    /// Read up to 64 bits starting at `offset`
    pub fn field(&self, offset: u32, width: u32) -> u64 {
        (0..width.min(64)).fold(0u64, |acc, i| {
            acc | (u64::from(self.bit(offset + i)) << i)
        })
    }

    /// Write the low `width` bits of `value` starting at `offset`
    pub fn set_field(&mut self, offset: u32, width: u32, value: u64) {
        for i in 0..width.min(64) {
            self.set_bit(offset + i, value >> i & 1 == 1);
        }
    }

    /// Low 64 bits of the register
    pub fn to_u64(&self) -> u64 {
        self.field(0, 64)
    }

    /// Bits set in `self` but clear in `other`
    pub fn bits_set_over(&self, other: &WdrData) -> Vec<u32> {
        (0..self.bit_width)
            .filter(|&i| self.bit(i) && !other.bit(i))
            .collect()
    }

    fn word_count(bit_width: u32) -> usize {
        bit_width.div_ceil(WORD_BITS).max(1) as usize
    }

    fn clear_unused_bits(&mut self) {
        let used = self.bit_width % WORD_BITS;
        if self.bit_width == 0 {
            self.words.iter_mut().for_each(|w| *w = 0);
        } else if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u32 << used) - 1;
            }
        }
    }
}

impl fmt::Display for WdrData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for (i, word) in self.words.iter().rev().enumerate() {
            if i == 0 {
                write!(f, "{:x}", word)?;
            } else {
                write!(f, "_{:08x}", word)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ones_masks_unused_bits() {
        let wdr = WdrData::ones(72);
        assert_eq!(wdr.words(), &[u32::MAX, u32::MAX, 0xFF]);
        assert!(wdr.bit(71));
        assert!(!wdr.bit(72));
    }

    #[test]
    fn test_field_across_word_boundary() {
        let mut wdr = WdrData::zeroed(72);
        wdr.set_field(60, 8, 0xA5);
        assert_eq!(wdr.field(60, 8), 0xA5);
        assert_eq!(wdr.words()[1], 0x5000_0000);
        assert_eq!(wdr.words()[2], 0xA);
    }

    #[test]
    fn test_from_u64_truncates_to_width() {
        let wdr = WdrData::from_u64(20, 0xFFF_FFFF);
        assert_eq!(wdr.to_u64(), 0xF_FFFF);
    }

    #[test]
    fn test_bits_set_over() {
        let burned = WdrData::from_u64(16, 0xFF0F);
        let attempt = WdrData::from_u64(16, 0xFF1F);
        assert_eq!(attempt.bits_set_over(&burned), vec![4]);
        assert!(burned.bits_set_over(&attempt).is_empty());
    }

    #[test]
    fn test_display() {
        let wdr = WdrData::from_words(72, &[0xFFFF_A4FF, 0xFFFF_FFFF, 0xFF]);
        assert_eq!(wdr.to_string(), "0xff_ffffffff_ffffa4ff");
    }
}
