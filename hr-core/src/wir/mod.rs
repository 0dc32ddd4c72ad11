//! Wrapper instruction register catalog and per-model registry

pub mod catalog;
mod registry;

pub use catalog::{RegisterAccess, Support, Wir, WirFlags, WirType, CATALOG};
pub use registry::WirRegistry;
