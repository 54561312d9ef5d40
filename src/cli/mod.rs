// file: src/cli/mod.rs
// version: 2.0.0
// guid: d3f81b6a-0c27-4e95-a4d8-6b1e9f2c7a50

//! Command line interface for Kangaroo

pub mod args;
pub mod commands;

pub use args::Cli;
pub use commands::*;
