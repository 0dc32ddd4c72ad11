//! Data types for HBM repair
//!
//! Contains coordinates, scan register values and GPU/HBM translation.

mod coords;
pub mod translate;
mod wdr;

pub use coords::{
    Bank, Byte, Channel, Dword, FbpaSubp, GpuLane, GpuRow, HbmLane, HbmRow, LaneRepairType,
    LaneType, PseudoChannel, RepairMode, Row, Site, Stack,
};
pub use translate::Translator;
pub use wdr::WdrData;
