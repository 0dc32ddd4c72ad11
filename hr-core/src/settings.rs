//! Repair policy settings
//!
//! Policy flags consumed by repair orchestration, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::fmt;

use crate::error::{HbmRepairError, Result};

/// Caller-supplied repair policy
///
/// The two risk flags are independent: skipping the availability check does
/// not silence verification, and ignoring verification does not skip the
/// availability check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairSettings {
    /// Attempt a repair even when no spare reads as available
    pub skip_availability_check: bool,

    /// Report a verification mismatch without failing the repair
    pub ignore_verification_result: bool,

    /// Run every step except destructive fuse writes
    pub dry_run: bool,

    /// Override the die's mandated burn delay
    pub burn_delay_ms: Option<u64>,
}

impl RepairSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| HbmRepairError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.burn_delay_ms == Some(0) {
            return Err(HbmRepairError::InvalidConfig {
                field: "burn_delay_ms".to_string(),
                reason: "a fuse burn needs a non-zero settle time".to_string(),
            });
        }
        Ok(())
    }

    /// Burn delay to use for a die whose mandated delay is `default_ms`
    pub fn burn_delay_ms(&self, default_ms: u64) -> u64 {
        self.burn_delay_ms.unwrap_or(default_ms)
    }
}

impl fmt::Display for RepairSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skip_avail={} ignore_verify={} dry_run={}",
            self.skip_availability_check, self.ignore_verification_result, self.dry_run
        )?;
        if let Some(ms) = self.burn_delay_ms {
            write!(f, " burn_delay={}ms", ms)?;
        }
        Ok(())
    }
}
