//! Spare-row accounting
//!
//! Counts spares by scanning every physical slot of a bank through the
//! variant's spare-scan WIR. A slot is usable for a row repair only when it
//! is free in both pseudo-channels, since a row repair always burns the
//! same slot in both.

use tracing::debug;

use crate::codec::scan::{self as scan_codec, SpareSlot, SpareState};
use crate::constants::timing;
use crate::data::{Bank, Channel, PseudoChannel, Row, Site, Stack};
use crate::dispatch::HbmInterface;
use crate::error::{HbmRepairError, Result};
use crate::hw::ScanChain;
use crate::wir::WirType;

/// How far a row is already held by the spares of a bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFuseState {
    Unrepaired,
    /// Burned in one pseudo-channel only, at `slot`
    Partial { slot: usize, missing: PseudoChannel },
    Repaired,
}

/// Scan result for one bank, indexed `[slot][pseudo_channel]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankSpares {
    slots: Vec<[SpareState; 2]>,
}

impl BankSpares {
    pub fn slots(&self) -> &[[SpareState; 2]] {
        &self.slots
    }

    pub fn available_count(&self) -> u32 {
        self.slots
            .iter()
            .filter(|pcs| pcs.iter().all(|s| s.is_available()))
            .count() as u32
    }

    pub fn first_available_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|pcs| pcs.iter().all(|s| s.is_available()))
    }

    /// Rows held by consumed spares, in slot order without duplicates
    pub fn repaired_rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for state in self.slots.iter().flatten() {
            if let SpareState::Consumed { row } = state {
                if !rows.contains(row) {
                    rows.push(*row);
                }
            }
        }
        rows
    }

    /// Slot holding `row` in one pseudo-channel
    fn slot_of(&self, row: Row, pseudo_channel: PseudoChannel) -> Option<usize> {
        self.slots
            .iter()
            .position(|pcs| pcs[pseudo_channel.index()] == SpareState::Consumed { row })
    }

    /// A row counts as repaired only once both pseudo-channels hold it
    pub fn row_state(&self, row: Row) -> RowFuseState {
        let mut held = None;
        let mut missing = None;
        for pseudo_channel in PseudoChannel::all() {
            match self.slot_of(row, pseudo_channel) {
                Some(slot) => held = Some(slot),
                None => missing = Some(pseudo_channel),
            }
        }
        match (held, missing) {
            (None, _) => RowFuseState::Unrepaired,
            (Some(_), None) => RowFuseState::Repaired,
            (Some(slot), Some(missing)) => RowFuseState::Partial { slot, missing },
        }
    }

    pub fn is_slot_free(&self, slot: usize, pseudo_channel: PseudoChannel) -> bool {
        self.slots
            .get(slot)
            .map_or(false, |pcs| pcs[pseudo_channel.index()].is_available())
    }
}

/// Scan every spare slot of one bank; the caller holds the scan lock
pub fn scan_bank(
    chain: &ScanChain,
    interface: &HbmInterface,
    site: Site,
    stack: Stack,
    channel: Channel,
    bank: Bank,
) -> Result<BankSpares> {
    let profile = interface.profile();
    if stack.value() >= interface.model().stack_count() {
        return Err(HbmRepairError::invalid_coordinate(format!(
            "{} not populated on {}-Hi stacks",
            stack,
            interface.model().stack_height
        )));
    }

    let mut slots = Vec::with_capacity(profile.spare_slots_per_bank);
    for slot in 0..profile.spare_slots_per_bank {
        let mut states = [SpareState::Available; 2];
        for pseudo_channel in PseudoChannel::all() {
            let spare = SpareSlot {
                stack,
                pseudo_channel,
                bank,
                slot,
            };
            let select = scan_codec::encode_spare_scan(profile, &spare)?;
            chain.write(WirType::SpareRowScan, site, channel, &select)?;
            chain.transport().sleep_us(timing::SCAN_SETTLE_US);
            let readback = chain.read_selected(WirType::SpareRowScan, site, channel)?;
            states[pseudo_channel.index()] = scan_codec::decode_spare_scan(profile, &readback)?;
        }
        slots.push(states);
    }

    let spares = BankSpares { slots };
    debug!(
        "{} {} {} {}: {} of {} spares available",
        site,
        stack,
        channel,
        bank,
        spares.available_count(),
        profile.spare_slots_per_bank
    );
    Ok(spares)
}

/// Check that a hard repair consumed exactly one spare
pub fn check_consumed(before: &BankSpares, after: &BankSpares, location: &str) -> Result<()> {
    let consumed = i64::from(before.available_count()) - i64::from(after.available_count());
    if consumed != 1 {
        return Err(HbmRepairError::VerificationMismatch {
            location: location.to_string(),
            expected: 1,
            actual: consumed,
        });
    }
    Ok(())
}

/// Check that a row burned in one pseudo-channel is now held by both
pub fn check_completed(after: &BankSpares, row: Row, location: &str) -> Result<()> {
    if after.row_state(row) != RowFuseState::Repaired {
        return Err(HbmRepairError::VerificationMismatch {
            location: location.to_string(),
            expected: 1,
            actual: 0,
        });
    }
    Ok(())
}
