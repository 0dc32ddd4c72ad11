//! HBM identity types

use hr_error::HbmRepairError;
use serde::{Deserialize, Serialize};

use crate::constants::{self, device_id, samsung_die};
use crate::Result;

/// HBM vendor
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HbmVendor {
    Samsung,
    SkHynix,
    Micron,
}

impl HbmVendor {
    /// Map a JEDEC manufacturer ID to a vendor
    pub fn from_manufacturer_id(id: u32) -> Option<Self> {
        match id {
            constants::SAMSUNG_MANUFACTURER_ID => Some(HbmVendor::Samsung),
            constants::SKHYNIX_MANUFACTURER_ID => Some(HbmVendor::SkHynix),
            constants::MICRON_MANUFACTURER_ID => Some(HbmVendor::Micron),
            _ => None,
        }
    }

    pub fn manufacturer_id(self) -> u32 {
        match self {
            HbmVendor::Samsung => constants::SAMSUNG_MANUFACTURER_ID,
            HbmVendor::SkHynix => constants::SKHYNIX_MANUFACTURER_ID,
            HbmVendor::Micron => constants::MICRON_MANUFACTURER_ID,
        }
    }
}

impl std::fmt::Display for HbmVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HbmVendor::Samsung => write!(f, "Samsung"),
            HbmVendor::SkHynix => write!(f, "SK hynix"),
            HbmVendor::Micron => write!(f, "Micron"),
        }
    }
}

/// JEDEC HBM generation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecVersion {
    Hbm2,
    Hbm2e,
}

impl std::fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecVersion::Hbm2 => write!(f, "HBM2"),
            SpecVersion::Hbm2e => write!(f, "HBM2e"),
        }
    }
}

/// Die family within a vendor's generation
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HbmDie {
    /// Samsung HBM2 B-die
    BDie,
    /// Samsung HBM2 X-die
    XDie,
    /// Any die whose vendor does not distinguish families
    Standard,
    /// Unrecognised part code
    Unknown(u8),
}

impl std::fmt::Display for HbmDie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HbmDie::BDie => write!(f, "B-die"),
            HbmDie::XDie => write!(f, "X-die"),
            HbmDie::Standard => write!(f, "standard"),
            HbmDie::Unknown(code) => write!(f, "unknown die {:#x}", code),
        }
    }
}

/// GPU architecture the stacks are attached to
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuArch {
    Gv100,
    Ga100,
}

impl std::fmt::Display for GpuArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuArch::Gv100 => write!(f, "GV100"),
            GpuArch::Ga100 => write!(f, "GA100"),
        }
    }
}

/// Immutable identity of the HBM stacks on one GPU, resolved once from DEVICE_ID
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HbmModel {
    pub vendor: HbmVendor,
    pub spec_version: SpecVersion,
    pub die: HbmDie,
    /// Dies per stack (4, 8 or 12)
    pub stack_height: u8,
    pub revision: u8,
}

impl HbmModel {
    /// Decode the first word of a DEVICE_ID readback
    pub fn from_device_id(word: u32) -> Result<Self> {
        let manufacturer = (word >> device_id::MANUFACTURER_SHIFT) & device_id::MANUFACTURER_MASK;
        let vendor = HbmVendor::from_manufacturer_id(manufacturer).ok_or_else(|| {
            HbmRepairError::UnsupportedModel(format!("unknown manufacturer ID {:#x}", manufacturer))
        })?;

        let spec_code = (word >> device_id::SPEC_VERSION_SHIFT) & device_id::SPEC_VERSION_MASK;
        let spec_version = match spec_code {
            0 => SpecVersion::Hbm2,
            1 => SpecVersion::Hbm2e,
            other => {
                return Err(HbmRepairError::UnsupportedModel(format!(
                    "unknown spec version code {}",
                    other
                )))
            }
        };

        let height_code = (word >> device_id::STACK_HEIGHT_SHIFT) & device_id::STACK_HEIGHT_MASK;
        let stack_height = match height_code {
            1 => 4,
            2 => 8,
            3 => 12,
            _ => {
                return Err(HbmRepairError::UnsupportedModel(format!(
                    "invalid stack height code {}",
                    height_code
                )))
            }
        };

        let die_code = (word >> device_id::DIE_SHIFT) & device_id::DIE_MASK;
        let die = match (vendor, die_code) {
            (HbmVendor::Samsung, samsung_die::STANDARD) => HbmDie::Standard,
            (HbmVendor::Samsung, samsung_die::B_DIE) => HbmDie::BDie,
            (HbmVendor::Samsung, samsung_die::X_DIE) => HbmDie::XDie,
            (HbmVendor::Samsung, code) => HbmDie::Unknown(code as u8),
            _ => HbmDie::Standard,
        };

        let revision = ((word >> device_id::REVISION_SHIFT) & device_id::REVISION_MASK) as u8;

        Ok(Self {
            vendor,
            spec_version,
            die,
            stack_height,
            revision,
        })
    }

    /// Encode this model into a DEVICE_ID first word (inverse of `from_device_id`)
    pub fn to_device_id(&self) -> u32 {
        let die_code = match self.die {
            HbmDie::BDie => samsung_die::B_DIE,
            HbmDie::XDie => samsung_die::X_DIE,
            HbmDie::Standard => samsung_die::STANDARD,
            HbmDie::Unknown(code) => code as u32 & device_id::DIE_MASK,
        };
        let height_code = match self.stack_height {
            4 => 1,
            8 => 2,
            12 => 3,
            _ => 0,
        };
        let spec_code = match self.spec_version {
            SpecVersion::Hbm2 => 0,
            SpecVersion::Hbm2e => 1,
        };

        (self.vendor.manufacturer_id() << device_id::MANUFACTURER_SHIFT)
            | (die_code << device_id::DIE_SHIFT)
            | ((self.revision as u32 & device_id::REVISION_MASK) << device_id::REVISION_SHIFT)
            | (height_code << device_id::STACK_HEIGHT_SHIFT)
            | (spec_code << device_id::SPEC_VERSION_SHIFT)
    }

    /// Number of stack IDs (ranks) exposed by this stack height
    pub fn stack_count(&self) -> u32 {
        (self.stack_height / constants::DIES_PER_STACK_ID).max(1) as u32
    }
}

impl std::fmt::Display for HbmModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}-Hi rev {}",
            self.vendor, self.spec_version, self.die, self.stack_height, self.revision
        )
    }
}

/// Closed set of die variants with their own tables and layouts
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DieVariant {
    SamsungBDie,
    SamsungXDieGv100,
    SamsungXDieGa100,
    SamsungHbm2e,
    SkHynixHbm2,
    SkHynixHbm2e,
    MicronHbm2e,
}

impl DieVariant {
    pub const ALL: [DieVariant; 7] = [
        DieVariant::SamsungBDie,
        DieVariant::SamsungXDieGv100,
        DieVariant::SamsungXDieGa100,
        DieVariant::SamsungHbm2e,
        DieVariant::SkHynixHbm2,
        DieVariant::SkHynixHbm2e,
        DieVariant::MicronHbm2e,
    ];

    pub fn vendor(self) -> HbmVendor {
        match self {
            DieVariant::SamsungBDie
            | DieVariant::SamsungXDieGv100
            | DieVariant::SamsungXDieGa100
            | DieVariant::SamsungHbm2e => HbmVendor::Samsung,
            DieVariant::SkHynixHbm2 | DieVariant::SkHynixHbm2e => HbmVendor::SkHynix,
            DieVariant::MicronHbm2e => HbmVendor::Micron,
        }
    }
}

impl std::fmt::Display for DieVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DieVariant::SamsungBDie => write!(f, "Samsung HBM2 B-die"),
            DieVariant::SamsungXDieGv100 => write!(f, "Samsung HBM2 X-die (GV100)"),
            DieVariant::SamsungXDieGa100 => write!(f, "Samsung HBM2 X-die (GA100)"),
            DieVariant::SamsungHbm2e => write!(f, "Samsung HBM2e"),
            DieVariant::SkHynixHbm2 => write!(f, "SK hynix HBM2"),
            DieVariant::SkHynixHbm2e => write!(f, "SK hynix HBM2e"),
            DieVariant::MicronHbm2e => write!(f, "Micron HBM2e"),
        }
    }
}
