//! Row repair codecs
//!
//! Hard row repairs are encoded with the die variant's `RowFuseLayout`.
//! Soft row repairs use one layout shared by every die.

use hr_vendor::{BitField, VariantProfile};

use crate::data::{Bank, PseudoChannel, Row, Stack, WdrData};
use crate::error::{HbmRepairError, Result};

/// SOFT_ROW_REPAIR register layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftRowLayout {
    pub width: u32,
    pub row: BitField,
    pub bank: BitField,
    pub pseudo_channel: BitField,
    pub stack: BitField,
    /// Set when the register holds an active remap
    pub enable_bit: u32,
}

pub const SOFT_ROW_LAYOUT: SoftRowLayout = SoftRowLayout {
    width: 23,
    row: BitField::new(0, 15),
    bank: BitField::new(15, 4),
    pseudo_channel: BitField::new(19, 1),
    stack: BitField::new(20, 2),
    enable_bit: 22,
};

/// Decoded contents of a row repair register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowFuseFields {
    pub stack: Stack,
    pub pseudo_channel: PseudoChannel,
    pub bank: Bank,
    pub row: Row,
    /// Spare slot, for dies whose fuse layout selects one
    pub fuse_index: Option<u32>,
}

/// Reject rows outside the die's address range
pub fn check_row(profile: &VariantProfile, row: Row) -> Result<()> {
    if row.value() >= profile.rows_per_bank() {
        return Err(HbmRepairError::invalid_coordinate(format!(
            "row {:#x} exceeds the {}-bit row address of {}",
            row.value(),
            profile.row_bits,
            profile.variant
        )));
    }
    Ok(())
}

/// The row actually stored for `row`, with fuse-shared low bits cleared
pub fn canonical_row(profile: &VariantProfile, row: Row) -> Row {
    let shift = profile.row_fuse.row_shift;
    Row::new((row.value() >> shift) << shift).unwrap_or(row)
}

fn insert_checked(field: BitField, raw: u64, value: u64, name: &str) -> Result<u64> {
    if !field.fits(value) {
        return Err(HbmRepairError::invalid_coordinate(format!(
            "{} {} does not fit a {}-bit field",
            name, value, field.width
        )));
    }
    Ok(field.insert(raw, value))
}

pub fn encode_hard_row(profile: &VariantProfile, fields: &RowFuseFields) -> Result<WdrData> {
    let layout = &profile.row_fuse;
    check_row(profile, fields.row)?;

    let mut raw = 0u64;
    raw = insert_checked(layout.row, raw, u64::from(fields.row.value() >> layout.row_shift), "row")?;
    raw = insert_checked(layout.bank, raw, u64::from(fields.bank.value()), "bank")?;
    raw = insert_checked(
        layout.pseudo_channel,
        raw,
        u64::from(fields.pseudo_channel.value()),
        "pseudo-channel",
    )?;
    raw = insert_checked(layout.stack, raw, u64::from(fields.stack.value()), "stack")?;

    match (layout.fuse_index, fields.fuse_index) {
        (Some(field), Some(index)) => {
            if index as usize >= profile.spare_slots_per_bank {
                return Err(HbmRepairError::invalid_coordinate(format!(
                    "spare slot {} out of range for {}",
                    index, profile.variant
                )));
            }
            raw = insert_checked(field, raw, u64::from(index), "spare slot")?;
        }
        (Some(_), None) => {
            return Err(HbmRepairError::invalid_coordinate(format!(
                "{} requires a spare slot index",
                profile.variant
            )));
        }
        (None, _) => {}
    }

    if let Some(bit) = layout.start_bit {
        raw |= 1 << bit;
    }
    Ok(WdrData::from_u64(layout.width, raw))
}

pub fn decode_hard_row(profile: &VariantProfile, data: &WdrData) -> Result<RowFuseFields> {
    let layout = &profile.row_fuse;
    let raw = data.to_u64();
    if data.bit_width() != layout.width {
        return Err(HbmRepairError::invalid_fuse(
            raw,
            format!("expected {} bits, got {}", layout.width, data.bit_width()),
        ));
    }
    if raw & layout.reserved_mask != 0 {
        return Err(HbmRepairError::invalid_fuse(raw, "reserved bits set"));
    }
    if let Some(bit) = layout.start_bit {
        if raw >> bit & 1 == 0 {
            return Err(HbmRepairError::invalid_fuse(raw, "start bit clear"));
        }
    }

    let row = (layout.row.extract(raw) as u32) << layout.row_shift;
    let fields = RowFuseFields {
        stack: Stack::new(layout.stack.extract(raw) as u32)?,
        pseudo_channel: PseudoChannel::new(layout.pseudo_channel.extract(raw) as u32)?,
        bank: Bank::new(layout.bank.extract(raw) as u32)?,
        row: Row::new(row)?,
        fuse_index: layout.fuse_index.map(|field| field.extract(raw) as u32),
    };
    if let Some(index) = fields.fuse_index {
        if index as usize >= profile.spare_slots_per_bank {
            return Err(HbmRepairError::invalid_fuse(raw, "spare slot out of range"));
        }
    }
    Ok(fields)
}

pub fn encode_soft_row(stack: Stack, pseudo_channel: PseudoChannel, bank: Bank, row: Row) -> Result<WdrData> {
    let layout = &SOFT_ROW_LAYOUT;
    let mut raw = 1u64 << layout.enable_bit;
    raw = insert_checked(layout.row, raw, u64::from(row.value()), "row")?;
    raw = insert_checked(layout.bank, raw, u64::from(bank.value()), "bank")?;
    raw = insert_checked(layout.pseudo_channel, raw, u64::from(pseudo_channel.value()), "pseudo-channel")?;
    raw = insert_checked(layout.stack, raw, u64::from(stack.value()), "stack")?;
    Ok(WdrData::from_u64(layout.width, raw))
}

/// Decode a SOFT_ROW_REPAIR value; `None` when no remap is active
pub fn decode_soft_row(data: &WdrData) -> Result<Option<RowFuseFields>> {
    let layout = &SOFT_ROW_LAYOUT;
    let raw = data.to_u64();
    if raw >> layout.enable_bit & 1 == 0 {
        return Ok(None);
    }
    Ok(Some(RowFuseFields {
        stack: Stack::new(layout.stack.extract(raw) as u32)?,
        pseudo_channel: PseudoChannel::new(layout.pseudo_channel.extract(raw) as u32)?,
        bank: Bank::new(layout.bank.extract(raw) as u32)?,
        row: Row::new(layout.row.extract(raw) as u32)?,
        fuse_index: None,
    }))
}
