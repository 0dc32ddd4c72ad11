//! Bit-level codecs for lane remaps, row fuses and spare scans

pub mod lane;
pub mod row;
pub mod scan;

pub use lane::DwordRemap;
pub use row::{RowFuseFields, SoftRowLayout, SOFT_ROW_LAYOUT};
pub use scan::{SpareSlot, SpareState};
