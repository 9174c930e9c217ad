//! panelink: Command-line front end
//!
//! Provides the `panelink` binary for capturing the device's front panel,
//! running shell commands on it and watching connection state.

pub mod commands;
pub mod output;
pub mod session;
