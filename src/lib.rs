// file: src/lib.rs
// version: 3.0.0
// guid: 0f5c2a8e-71b4-4d39-9e6a-c4d8b2f1e073

//! # Kangaroo
//!
//! Shared jump-account SSH management. A master host owns one key pair,
//! provisions a `kangaroo` account on each slave, and keeps a `Host` block
//! per server in every eligible local user's `~/.ssh/config`. Slaves can
//! also self-register over a small token-gated HTTP service.

pub mod cli;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod logs;
pub mod network;
pub mod provision;
pub mod security;
pub mod server;
pub mod ssh_config;
pub mod users;
pub mod utils;

pub use error::{KangarooError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub const BUILD_INFO: &str = concat!(
    "Version: ",
    env!("CARGO_PKG_VERSION"),
    "\n",
    "Package: ",
    env!("CARGO_PKG_NAME"),
    "\n"
);
