//! Hardware access
//!
//! `Transport` is the platform seam; `ScanChain` layers registry checks and
//! dry-run handling over it; `SimulatedHbm` is an in-memory die model.

mod scan;
pub mod sim;
pub mod transport;

pub use scan::{ScanChain, WriteOutcome};
pub use sim::SimulatedHbm;
pub use transport::{ScanLock, Transport};
