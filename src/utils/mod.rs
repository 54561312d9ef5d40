// file: src/utils/mod.rs
// version: 2.0.0
// guid: 0d7e4a91-5b2c-4f38-8e16-a9c3b5f07d12

//! Utility modules for system operations

pub mod system;

pub use system::SystemUtils;
