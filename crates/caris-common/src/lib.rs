//! Common types for the CÁRIS backup and disaster-recovery subsystem
//!
//! Provides the shared error taxonomy and small cross-crate utilities used
//! by the backup, recovery and conversation-backup crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;

pub use error::{CarisError, Result};
