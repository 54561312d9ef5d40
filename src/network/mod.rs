// file: src/network/mod.rs
// version: 2.0.0
// guid: 7ba40d84-0f06-46c4-a7d6-90d1592e6e87

//! External command and SSH operations

pub mod executor;
pub mod ssh;

pub use executor::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use ssh::{remote_provision_script, SshClient, SshTarget};
