// file: src/ssh_config/mod.rs
// version: 1.0.0
// guid: 92277693-a6a2-415b-b618-3029b86fc5e8

//! Per-user SSH client configuration: model, parser and mutator
//!
//! Parsing is lossy: comments and blank lines inside blocks are
//! dropped. Mutation never goes through the model; it edits the raw text so
//! untouched regions keep their exact bytes.

pub mod lock;
pub mod model;
pub mod mutator;
pub mod parser;

pub use model::{ConfigFile, ConfigStatus, Directives, HostBlock};
pub use mutator::{
    append_block, ensure_ssh_dir, remove_block, validate_description, validate_host_field, HostEntry,
    RemoveOutcome,
};
pub use parser::{parse_file, parse_str};
