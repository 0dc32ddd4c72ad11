//! Lane remap codec
//!
//! The SOFT/HARD_LANE_REPAIR WDR holds one 16-bit remap per DWORD at bits
//! `[16d+15:16d]`, followed by an 8-bit AWORD remap that is carried through
//! unchanged. Each DWORD remap is two byte-pair fields of 8 bits; within a
//! field the low nibble describes the even byte and the high nibble the odd
//! byte. A repaired pair stores the repair-type nibble for the faulty byte
//! and the 0xA sentinel for its partner; 0xFF means the pair is unrepaired.

use crate::constants::lane;
use crate::data::{Byte, Channel, Dword, HbmLane, LaneRepairType, Site, WdrData};
use crate::error::{HbmRepairError, Result};

/// A DWORD remap value and the bits it programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwordRemap {
    pub value: u16,
    pub mask: u16,
}

fn pair_shift(byte: Byte) -> u32 {
    byte.pair() * 8
}

/// Byte-pair field for a repair of `byte`
fn pair_field(byte: Byte, repair: LaneRepairType) -> u8 {
    if byte.is_odd() {
        (repair.nibble() << 4) | lane::PAIRED_BYTE_SENTINEL
    } else {
        (lane::PAIRED_BYTE_SENTINEL << 4) | repair.nibble()
    }
}

/// Encode one lane repair as a DWORD remap
///
/// Bits outside `mask` are left at the "no repair" value.
pub fn encode_dword_remap(byte: Byte, repair: LaneRepairType) -> DwordRemap {
    let shift = pair_shift(byte);
    let mask = 0xFFu16 << shift;
    let value = (lane::NO_REMAP & !mask) | ((pair_field(byte, repair) as u16) << shift);
    DwordRemap { value, mask }
}

/// Decode a DWORD remap into the repairs it holds
pub fn decode_dword_remap(value: u16) -> Result<Vec<(Byte, LaneRepairType)>> {
    let mut repairs = Vec::new();
    for pair in 0..lane::REPAIRS_PER_DWORD {
        let field = (value >> (pair * 8)) as u8;
        if field == lane::PAIR_NO_REPAIR {
            continue;
        }
        let low = field & 0xF;
        let high = field >> 4;
        let (odd, nibble) = if low == lane::PAIRED_BYTE_SENTINEL {
            (true, high)
        } else if high == lane::PAIRED_BYTE_SENTINEL {
            (false, low)
        } else {
            return Err(HbmRepairError::InvalidRemapValue {
                value,
                reason: format!("byte pair {} field {:#04x} has no sentinel nibble", pair, field),
            });
        };
        let repair = LaneRepairType::from_nibble(nibble).ok_or_else(|| {
            HbmRepairError::InvalidRemapValue {
                value,
                reason: format!("byte pair {} has unknown repair type {:#x}", pair, nibble),
            }
        })?;
        let byte = Byte::new(pair * 2 + u32::from(odd))?;
        repairs.push((byte, repair));
    }
    Ok(repairs)
}

/// Merge a new remap into an existing DWORD remap
///
/// A pair can hold one repair. Re-requesting the stored repair yields
/// `AlreadyRepaired`; a different repair in an occupied pair yields
/// `SpareResourceExhausted`.
pub fn merge_dword_remap(existing: u16, remap: DwordRemap, location: &str) -> Result<u16> {
    let current = existing & remap.mask;
    if current == remap.value & remap.mask {
        return Err(HbmRepairError::AlreadyRepaired {
            location: location.to_string(),
        });
    }
    if current != lane::NO_REMAP & remap.mask {
        return Err(HbmRepairError::SpareResourceExhausted {
            location: location.to_string(),
        });
    }
    Ok((existing & !remap.mask) | (remap.value & remap.mask))
}

/// Overwrite a pair regardless of its current contents
pub fn force_dword_remap(existing: u16, remap: DwordRemap) -> u16 {
    (existing & !remap.mask) | (remap.value & remap.mask)
}

pub fn dword_remap(wdr: &WdrData, dword: Dword) -> u16 {
    wdr.field(dword.value() * lane::DWORD_REMAP_WIDTH, lane::DWORD_REMAP_WIDTH) as u16
}

pub fn set_dword_remap(wdr: &mut WdrData, dword: Dword, value: u16) {
    wdr.set_field(
        dword.value() * lane::DWORD_REMAP_WIDTH,
        lane::DWORD_REMAP_WIDTH,
        u64::from(value),
    );
}

pub fn aword_remap(wdr: &WdrData) -> u8 {
    wdr.field(lane::AWORD_REMAP_OFFSET, lane::AWORD_REMAP_WIDTH) as u8
}

/// Unprogrammed lane remap register
pub fn empty_lane_wdr() -> WdrData {
    WdrData::ones(lane::LANE_REMAP_WDR_WIDTH)
}

/// Read-modify-write `lane` into a baseline register value
pub fn encode_lane(baseline: &WdrData, lane: &HbmLane) -> Result<WdrData> {
    check_width(baseline)?;
    let remap = encode_dword_remap(lane.byte, lane.repair);
    let merged = merge_dword_remap(dword_remap(baseline, lane.dword), remap, &lane.to_string())?;
    let mut wdr = baseline.clone();
    set_dword_remap(&mut wdr, lane.dword, merged);
    Ok(wdr)
}

/// Decode every lane repair held by a register value
pub fn decode_lanes(site: Site, channel: Channel, wdr: &WdrData) -> Result<Vec<HbmLane>> {
    check_width(wdr)?;
    let mut lanes = Vec::new();
    for dword in Dword::all() {
        for (byte, repair) in decode_dword_remap(dword_remap(wdr, dword))? {
            lanes.push(HbmLane {
                site,
                channel,
                dword,
                byte,
                repair,
            });
        }
    }
    Ok(lanes)
}

/// Register values for a nibble-ordered fuse burn from `baseline` to `target`
///
/// Each stage differs from the previous one in exactly one nibble of the
/// byte pair holding `byte`. The partner byte's sentinel nibble is burned
/// before the repair-type nibble.
pub fn nibble_ordered_stages(baseline: &WdrData, target: &WdrData, dword: Dword, byte: Byte) -> Vec<WdrData> {
    let base = dword.value() * lane::DWORD_REMAP_WIDTH + pair_shift(byte);
    let (sentinel_offset, type_offset) = if byte.is_odd() {
        (base, base + 4)
    } else {
        (base + 4, base)
    };

    let mut stages = Vec::with_capacity(2);
    let mut stage = baseline.clone();
    for offset in [sentinel_offset, type_offset] {
        let nibble = target.field(offset, 4);
        if stage.field(offset, 4) != nibble {
            stage.set_field(offset, 4, nibble);
            stages.push(stage.clone());
        }
    }
    stages
}

fn check_width(wdr: &WdrData) -> Result<()> {
    if wdr.bit_width() != lane::LANE_REMAP_WDR_WIDTH {
        return Err(HbmRepairError::InvalidRemapValue {
            value: wdr.to_u64() as u16,
            reason: format!(
                "lane remap register must be {} bits, got {}",
                lane::LANE_REMAP_WDR_WIDTH,
                wdr.bit_width()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte(b: u32) -> Byte {
        Byte::new(b).unwrap()
    }

    fn lane_at(dword: u32, b: u32, repair: LaneRepairType) -> HbmLane {
        HbmLane {
            site: Site::new(2).unwrap(),
            channel: Channel::new(5).unwrap(),
            dword: Dword::new(dword).unwrap(),
            byte: byte(b),
            repair,
        }
    }

    #[test]
    fn test_encode_data_bit_in_even_byte() {
        let remap = encode_dword_remap(byte(0), LaneRepairType::Data(3));
        assert_eq!(remap.value, 0xFFA4);
        assert_eq!(remap.mask, 0x00FF);
    }

    #[test]
    fn test_encode_odd_and_upper_pair() {
        assert_eq!(encode_dword_remap(byte(1), LaneRepairType::Dbi).value, 0xFF9A);
        let remap = encode_dword_remap(byte(2), LaneRepairType::Dm);
        assert_eq!(remap.value, 0xA0FF);
        assert_eq!(remap.mask, 0xFF00);
        assert_eq!(encode_dword_remap(byte(3), LaneRepairType::Data(7)).value, 0x8AFF);
    }

    #[test]
    fn test_decode_no_remap_is_empty() {
        assert!(decode_dword_remap(lane::NO_REMAP).unwrap().is_empty());
        let lanes = decode_lanes(Site::default(), Channel::default(), &empty_lane_wdr()).unwrap();
        assert!(lanes.is_empty());
    }

    #[test]
    fn test_decode_both_pairs() {
        let repairs = decode_dword_remap(0x8AA4).unwrap();
        assert_eq!(
            repairs,
            vec![(byte(0), LaneRepairType::Data(3)), (byte(3), LaneRepairType::Data(7))]
        );
    }

    #[test]
    fn test_decode_rejects_missing_sentinel() {
        assert!(matches!(
            decode_dword_remap(0xFF34),
            Err(HbmRepairError::InvalidRemapValue { value: 0xFF34, .. })
        ));
        assert!(matches!(
            decode_dword_remap(0xFFAB),
            Err(HbmRepairError::InvalidRemapValue { .. })
        ));
    }

    #[test]
    fn test_every_repair_round_trips() {
        let mut repairs = vec![LaneRepairType::Dm, LaneRepairType::Dbi];
        repairs.extend((0..8).map(LaneRepairType::Data));
        for b in 0..4 {
            for repair in &repairs {
                let remap = encode_dword_remap(byte(b), *repair);
                assert_eq!(decode_dword_remap(remap.value).unwrap(), vec![(byte(b), *repair)]);
            }
        }
    }

    #[test]
    fn test_merge_rules() {
        let first = encode_dword_remap(byte(0), LaneRepairType::Data(3));
        let merged = merge_dword_remap(lane::NO_REMAP, first, "x").unwrap();
        assert_eq!(merged, 0xFFA4);

        assert!(matches!(
            merge_dword_remap(merged, first, "x"),
            Err(HbmRepairError::AlreadyRepaired { .. })
        ));

        let partner = encode_dword_remap(byte(1), LaneRepairType::Dm);
        assert!(matches!(
            merge_dword_remap(merged, partner, "x"),
            Err(HbmRepairError::SpareResourceExhausted { .. })
        ));

        let other_pair = encode_dword_remap(byte(2), LaneRepairType::Dbi);
        assert_eq!(merge_dword_remap(merged, other_pair, "x").unwrap(), 0xA9A4);
    }

    #[test]
    fn test_encode_lane_preserves_aword_and_other_dwords() {
        let mut baseline = empty_lane_wdr();
        baseline.set_field(lane::AWORD_REMAP_OFFSET, lane::AWORD_REMAP_WIDTH, 0x5C);
        set_dword_remap(&mut baseline, Dword::new(1).unwrap(), 0xFF9A);

        let wdr = encode_lane(&baseline, &lane_at(3, 0, LaneRepairType::Data(3))).unwrap();
        assert_eq!(aword_remap(&wdr), 0x5C);
        assert_eq!(dword_remap(&wdr, Dword::new(0).unwrap()), 0xFFFF);
        assert_eq!(dword_remap(&wdr, Dword::new(1).unwrap()), 0xFF9A);
        assert_eq!(dword_remap(&wdr, Dword::new(3).unwrap()), 0xFFA4);

        let lanes = decode_lanes(Site::new(2).unwrap(), Channel::new(5).unwrap(), &wdr).unwrap();
        assert_eq!(lanes.len(), 2);
        assert!(lanes.contains(&lane_at(3, 0, LaneRepairType::Data(3))));
        assert!(lanes.contains(&lane_at(1, 1, LaneRepairType::Dbi)));
    }

    #[test]
    fn test_nibble_stages_burn_sentinel_first() {
        let baseline = empty_lane_wdr();
        let lane = lane_at(0, 0, LaneRepairType::Data(3));
        let target = encode_lane(&baseline, &lane).unwrap();
        let stages = nibble_ordered_stages(&baseline, &target, lane.dword, lane.byte);
        assert_eq!(stages.len(), 2);
        assert_eq!(dword_remap(&stages[0], Dword::default()), 0xFFAF);
        assert_eq!(dword_remap(&stages[1], Dword::default()), 0xFFA4);
        assert_eq!(stages[1], target);

        let lane = lane_at(0, 1, LaneRepairType::Dbi);
        let target = encode_lane(&baseline, &lane).unwrap();
        let stages = nibble_ordered_stages(&baseline, &target, lane.dword, lane.byte);
        assert_eq!(dword_remap(&stages[0], Dword::default()), 0xFFFA);
        assert_eq!(dword_remap(&stages[1], Dword::default()), 0xFF9A);
    }
}
