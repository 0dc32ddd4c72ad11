//! HBM-side and GPU-side coordinate types
//!
//! HBM coordinates address the memory die over the scan chain. GPU
//! coordinates are what the memory controller reports for a faulty bit or
//! row; `translate` maps between the two.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{hbm, lane};
use crate::error::{HbmRepairError, Result};

/// Defines a bounded index newtype with a validating constructor
macro_rules! bounded_index {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $limit:expr, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name($repr);

        impl $name {
            /// Exclusive upper bound
            pub const LIMIT: u32 = $limit;

            pub fn new(value: u32) -> Result<Self> {
                if value >= Self::LIMIT {
                    return Err(HbmRepairError::invalid_coordinate(format!(
                        "{} {} out of range (limit {})",
                        $label,
                        value,
                        Self::LIMIT
                    )));
                }
                Ok(Self(value as $repr))
            }

            pub fn value(self) -> u32 {
                self.0 as u32
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Every valid value in ascending order
            pub fn all() -> impl Iterator<Item = Self> {
                (0..Self::LIMIT).map(|v| Self(v as $repr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $label, self.0)
            }
        }
    };
}

bounded_index!(
    /// HBM site (one physical stack position on the package)
    Site, u8, hbm::MAX_SITES, "site"
);
bounded_index!(
    /// Stack ID (rank) inside a site
    Stack, u8, hbm::MAX_STACKS, "sid"
);
bounded_index!(Channel, u8, hbm::CHANNELS, "ch");
bounded_index!(PseudoChannel, u8, hbm::PSEUDO_CHANNELS, "pc");

impl PseudoChannel {
    /// The partner pseudo-channel of the same channel
    pub fn other(self) -> Self {
        Self(self.0 ^ 1)
    }
}
bounded_index!(Bank, u8, hbm::BANKS, "bank");
bounded_index!(
    /// DWORD within a channel
    Dword, u8, hbm::DWORDS_PER_CHANNEL, "dword"
);
bounded_index!(
    /// Byte within a DWORD
    Byte, u8, hbm::BYTES_PER_DWORD, "byte"
);
bounded_index!(
    /// Row address; per-die width is checked against the variant profile
    Row, u32, 1 << hbm::MAX_ROW_BITS, "row"
);

impl Dword {
    /// Pseudo-channel carrying this DWORD
    pub fn pseudo_channel(self) -> PseudoChannel {
        PseudoChannel(self.0 / hbm::DWORDS_PER_PSEUDO_CHANNEL as u8)
    }
}

impl Byte {
    /// Byte pair sharing one spare lane (0 for bytes 0-1, 1 for bytes 2-3)
    pub fn pair(self) -> u32 {
        self.0 as u32 / 2
    }

    pub fn is_odd(self) -> bool {
        self.0 % 2 == 1
    }
}

/// Kind of GPU-side lane reported by the memory controller
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneType {
    Data,
    Dbi,
    Dm,
}

impl fmt::Display for LaneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneType::Data => write!(f, "DATA"),
            LaneType::Dbi => write!(f, "DBI"),
            LaneType::Dm => write!(f, "DM"),
        }
    }
}

/// Which signal of a byte is remapped onto the spare lane
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneRepairType {
    Dm,
    /// Data bit 0..8 within the byte
    Data(u8),
    Dbi,
}

impl LaneRepairType {
    pub fn data(bit: u32) -> Result<Self> {
        if bit >= hbm::BITS_PER_BYTE {
            return Err(HbmRepairError::invalid_coordinate(format!(
                "data bit {} out of range for a byte",
                bit
            )));
        }
        Ok(LaneRepairType::Data(bit as u8))
    }

    /// Type nibble stored in the remap register
    pub fn nibble(self) -> u8 {
        match self {
            LaneRepairType::Dm => lane::DM_NIBBLE,
            LaneRepairType::Data(bit) => lane::DATA_NIBBLE_BASE + bit,
            LaneRepairType::Dbi => lane::DBI_NIBBLE,
        }
    }

    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            lane::DM_NIBBLE => Some(LaneRepairType::Dm),
            lane::DBI_NIBBLE => Some(LaneRepairType::Dbi),
            n if (lane::DATA_NIBBLE_BASE..lane::DATA_NIBBLE_BASE + hbm::BITS_PER_BYTE as u8)
                .contains(&n) =>
            {
                Some(LaneRepairType::Data(n - lane::DATA_NIBBLE_BASE))
            }
            _ => None,
        }
    }
}

impl fmt::Display for LaneRepairType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneRepairType::Dm => write!(f, "DM"),
            LaneRepairType::Data(bit) => write!(f, "DQ{}", bit),
            LaneRepairType::Dbi => write!(f, "DBI"),
        }
    }
}

/// Soft repairs are volatile, hard repairs burn fuses
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairMode {
    Soft,
    Hard,
}

impl fmt::Display for RepairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairMode::Soft => write!(f, "SOFT"),
            RepairMode::Hard => write!(f, "HARD"),
        }
    }
}

/// A faulty lane in HBM coordinates
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HbmLane {
    pub site: Site,
    pub channel: Channel,
    pub dword: Dword,
    pub byte: Byte,
    pub repair: LaneRepairType,
}

impl HbmLane {
    pub fn pseudo_channel(&self) -> PseudoChannel {
        self.dword.pseudo_channel()
    }
}

impl fmt::Display for HbmLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.site, self.channel, self.dword, self.byte, self.repair
        )
    }
}

/// A faulty row in HBM coordinates
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HbmRow {
    pub site: Site,
    pub stack: Stack,
    pub channel: Channel,
    pub bank: Bank,
    pub row: Row,
}

impl fmt::Display for HbmRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} row {:#x}",
            self.site,
            self.stack,
            self.channel,
            self.bank,
            self.row.value()
        )
    }
}

/// Physical FBPA and subpartition pair
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FbpaSubp {
    pub hw_fbpa: u32,
    pub subp: u32,
}

impl fmt::Display for FbpaSubp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fbpa{} subp{}", self.hw_fbpa, self.subp)
    }
}

/// A faulty lane as reported by the GPU
///
/// For `Data` lanes `lane_bit` is the bit index on the 256-bit subpartition
/// bus; for `Dbi` and `Dm` it is the byte index on that bus.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuLane {
    pub hw_fbpa: u32,
    pub subp: u32,
    pub lane_bit: u32,
    pub lane_type: LaneType,
}

impl GpuLane {
    pub fn location(&self) -> FbpaSubp {
        FbpaSubp {
            hw_fbpa: self.hw_fbpa,
            subp: self.subp,
        }
    }
}

impl fmt::Display for GpuLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fbpa{} subp{} {} lane {}",
            self.hw_fbpa, self.subp, self.lane_type, self.lane_bit
        )
    }
}

/// A faulty row as reported by the GPU
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuRow {
    pub hw_fbpa: u32,
    pub subp: u32,
    /// Channel within the subpartition
    pub subp_channel: u32,
    /// Maps to the HBM stack ID
    pub rank: u32,
    pub bank: u32,
    pub row: u32,
}

impl GpuRow {
    pub fn location(&self) -> FbpaSubp {
        FbpaSubp {
            hw_fbpa: self.hw_fbpa,
            subp: self.subp,
        }
    }
}

impl fmt::Display for GpuRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fbpa{} subp{} ch{} rank{} bank{} row {:#x}",
            self.hw_fbpa, self.subp, self.subp_channel, self.rank, self.bank, self.row
        )
    }
}
