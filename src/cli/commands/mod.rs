//! Command execution functions.
//!
//! Each command returns the process exit code. Build failures are reported
//! and still exit 0; only a missing or unloadable config file exits 1.

pub mod build;
pub mod init;
pub mod passthrough;
