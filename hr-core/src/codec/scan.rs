//! Spare-row scan codec
//!
//! A scan selects one spare slot with a table-provided mask plus a stack
//! select, then reads back a status bit (0 = available) and, for consumed
//! spares, the row that was repaired into it.

use hr_vendor::{SpareScanLayout, StackSelect, VariantProfile};

use crate::data::{Bank, PseudoChannel, Row, Stack, WdrData};
use crate::error::{HbmRepairError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpareState {
    Available,
    Consumed { row: Row },
}

impl SpareState {
    pub fn is_available(self) -> bool {
        self == SpareState::Available
    }
}

/// One spare slot of one bank and pseudo-channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpareSlot {
    pub stack: Stack,
    pub pseudo_channel: PseudoChannel,
    pub bank: Bank,
    pub slot: usize,
}

/// Build the scan select value from a stack and a raw fuse scan mask
pub fn encode_scan_select(layout: &SpareScanLayout, stack: Stack, scan_mask: u32) -> Result<WdrData> {
    if !layout.mask.fits(u64::from(scan_mask)) {
        return Err(HbmRepairError::invalid_fuse(
            u64::from(scan_mask),
            "scan mask wider than its field",
        ));
    }
    let mut raw = layout.mask.insert(0, u64::from(scan_mask));
    match layout.stack_select {
        StackSelect::OneHot { offset, stacks } => {
            if stack.value() >= stacks {
                return Err(HbmRepairError::invalid_coordinate(format!(
                    "{} not addressable by a {}-stack scan",
                    stack, stacks
                )));
            }
            raw |= 1 << (offset + stack.value());
        }
        StackSelect::Binary(field) => {
            if !field.fits(u64::from(stack.value())) {
                return Err(HbmRepairError::invalid_coordinate(format!(
                    "{} not addressable by a {}-bit stack select",
                    stack, field.width
                )));
            }
            raw = field.insert(raw, u64::from(stack.value()));
        }
    }
    Ok(WdrData::from_u64(layout.width, raw))
}

/// Scan select value for one spare slot
pub fn encode_spare_scan(profile: &VariantProfile, slot: &SpareSlot) -> Result<WdrData> {
    let mask = (profile.scan_mask)(slot.pseudo_channel.index(), slot.bank.index(), slot.slot)
        .ok_or_else(|| {
            HbmRepairError::invalid_coordinate(format!(
                "no spare slot {} for {} {} on {}",
                slot.slot, slot.pseudo_channel, slot.bank, profile.variant
            ))
        })?;
    encode_scan_select(&profile.spare_scan, slot.stack, mask)
}

/// Recover the slot a scan select value addresses
pub fn decode_scan_select(profile: &VariantProfile, select: &WdrData) -> Result<SpareSlot> {
    let layout = &profile.spare_scan;
    let raw = select.to_u64();
    let stack = match layout.stack_select {
        StackSelect::OneHot { offset, stacks } => {
            let bits = (raw >> offset) & ((1 << stacks) - 1);
            if bits.count_ones() != 1 {
                return Err(HbmRepairError::invalid_fuse(raw, "stack select is not one-hot"));
            }
            bits.trailing_zeros()
        }
        StackSelect::Binary(field) => field.extract(raw) as u32,
    };
    let mask = layout.mask.extract(raw) as u32;
    let (pc, bank, slot) = profile
        .locate_scan_mask(mask)
        .ok_or_else(|| HbmRepairError::invalid_fuse(raw, "scan mask not in the spare table"))?;
    Ok(SpareSlot {
        stack: Stack::new(stack)?,
        pseudo_channel: PseudoChannel::new(pc as u32)?,
        bank: Bank::new(bank as u32)?,
        slot,
    })
}

pub fn decode_spare_scan(profile: &VariantProfile, readback: &WdrData) -> Result<SpareState> {
    let layout = &profile.spare_scan;
    if !readback.bit(layout.status_bit) {
        return Ok(SpareState::Available);
    }
    let stored = layout.readback_row.extract(readback.to_u64()) as u32;
    let row = Row::new(stored << profile.row_fuse.row_shift)?;
    Ok(SpareState::Consumed { row })
}

/// Readback a die produces for a scan of a slot in `state`
pub fn encode_spare_readback(profile: &VariantProfile, select: &WdrData, state: SpareState) -> WdrData {
    let layout = &profile.spare_scan;
    match state {
        SpareState::Available => {
            let mut readback = select.clone();
            readback.set_bit(layout.status_bit, false);
            readback
        }
        SpareState::Consumed { row } => {
            let stored = row.value() >> profile.row_fuse.row_shift;
            let raw = layout.readback_row.insert(0, u64::from(stored)) | (1 << layout.status_bit);
            WdrData::from_u64(layout.width, raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_vendor::{profile, DieVariant};

    #[test]
    fn test_bdie_stack_zero_mask_zero() {
        let profile = profile(DieVariant::SamsungBDie);
        let select = encode_scan_select(&profile.spare_scan, Stack::new(0).unwrap(), 0).unwrap();
        assert_eq!(select.to_u64(), 1 << 20);
        assert_eq!(select.bit_width(), 24);
        assert_eq!(decode_spare_scan(profile, &select).unwrap(), SpareState::Available);
    }

    #[test]
    fn test_one_hot_stack_limit() {
        let profile = profile(DieVariant::SamsungBDie);
        assert!(encode_scan_select(&profile.spare_scan, Stack::new(2).unwrap(), 0).is_err());
    }

    #[test]
    fn test_select_round_trip_every_variant() {
        for variant in DieVariant::ALL {
            let profile = profile(variant);
            let last_stack = Stack::new(profile.max_stacks() - 1).unwrap();
            for (pc, bank, slot) in [(0, 0, 0), (1, 15, profile.spare_slots_per_bank - 1), (1, 6, 1)] {
                let spare = SpareSlot {
                    stack: last_stack,
                    pseudo_channel: PseudoChannel::new(pc).unwrap(),
                    bank: Bank::new(bank).unwrap(),
                    slot,
                };
                let select = encode_spare_scan(profile, &spare).unwrap();
                assert_eq!(decode_scan_select(profile, &select).unwrap(), spare, "{}", variant);
            }
        }
    }

    #[test]
    fn test_consumed_readback_reports_row() {
        for variant in DieVariant::ALL {
            let profile = profile(variant);
            let spare = SpareSlot {
                stack: Stack::new(0).unwrap(),
                pseudo_channel: PseudoChannel::new(1).unwrap(),
                bank: Bank::new(4).unwrap(),
                slot: 0,
            };
            let select = encode_spare_scan(profile, &spare).unwrap();
            let row = Row::new(0x1F0).unwrap();
            let readback = encode_spare_readback(profile, &select, SpareState::Consumed { row });
            assert_eq!(
                decode_spare_scan(profile, &readback).unwrap(),
                SpareState::Consumed { row }
            );

            let idle = encode_spare_readback(profile, &select, SpareState::Available);
            assert!(decode_spare_scan(profile, &idle).unwrap().is_available());
        }
    }

    #[test]
    fn test_unknown_mask_rejected() {
        let profile = profile(DieVariant::MicronHbm2e);
        let select = WdrData::from_u64(profile.spare_scan.width, 0x7F_FFFE);
        assert!(matches!(
            decode_scan_select(profile, &select),
            Err(HbmRepairError::InvalidFuseData { .. })
        ));
    }
}
