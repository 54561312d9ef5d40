// file: src/logging/mod.rs
// version: 1.1.0
// guid: 2726f458-6ef8-4cec-87a9-d85d36246fb5

//! Logging system for Kangaroo

pub mod logger;

pub use logger::{init_logger, init_service_logger};
