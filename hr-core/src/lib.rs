//! HBM Repair Core Library
//!
//! Lane and row repair for HBM stacks behind a GPU, driven over the IEEE1500
//! WIR/WDR scan chain of each die.
//!
//! # Features
//!
//! - **Coordinate Translation**: GPU FBPA/subpartition faults to HBM site, channel, DWORD and byte
//! - **WIR Catalog**: Per-model registry of the scan instructions a die supports
//! - **Bit Codecs**: Lane remap, hard/soft row fuse and spare-scan encodings per die variant
//! - **Spare Accounting**: Available spare rows per bank, before and after every burn
//! - **Repair Orchestration**: Soft and hard lane/row repairs with per-item batch reporting
//!
//! # Module Structure
//!
//! - `data/` - Coordinates, WDR values, GPU/HBM translation
//! - `hw/` - Transport seam, scan chain access, simulated HBM
//! - `wir/` - WIR catalog and registry
//! - `codec/` - Bit-level encodings
//! - `engine/` - Spare accounting and repair flows
//!
//! # Example
//!
//! ```no_run
//! use hr_core::{GpuArch, GpuLane, HbmDevice, LaneType, RepairMode, RepairSettings, SimulatedHbm};
//! # fn model() -> hr_core::HbmModel { unimplemented!() }
//!
//! let sim = SimulatedHbm::new(GpuArch::Ga100, model());
//! let device = HbmDevice::open(sim, GpuArch::Ga100, RepairSettings::default()).unwrap();
//! let lane = GpuLane { hw_fbpa: 0, subp: 0, lane_bit: 3, lane_type: LaneType::Data };
//! let report = device.repair_lanes(&[lane], RepairMode::Soft);
//! assert!(report.is_success());
//! ```

// Grouped modules
pub mod codec;
pub mod data;
pub mod engine;
pub mod hw;
pub mod wir;

// Standalone modules
pub mod constants;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod settings;

pub use data::{
    Bank, Byte, Channel, Dword, FbpaSubp, GpuLane, GpuRow, HbmLane, HbmRow, LaneRepairType, LaneType,
    PseudoChannel, RepairMode, Row, Site, Stack, Translator, WdrData,
};

pub use device::HbmDevice;
pub use dispatch::{FuseGuard, HbmInterface, LaneBurnOrder, RepairOverrides};
pub use engine::{BatchReport, RepairOutcome, RepairStatus, RepairTarget};
pub use error::{HbmRepairError, Result};
pub use hw::{ScanChain, ScanLock, SimulatedHbm, Transport, WriteOutcome};
pub use settings::RepairSettings;
pub use wir::{Wir, WirRegistry, WirType};

pub use hr_vendor::{DieVariant, GpuArch, HbmDie, HbmModel, HbmVendor, SpecVersion};
