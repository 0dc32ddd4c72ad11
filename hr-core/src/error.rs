//! Error types for repair operations
//!
//! Re-exports the shared error type so modules can `use crate::error`.

pub use hr_error::{HbmRepairError, Result};
