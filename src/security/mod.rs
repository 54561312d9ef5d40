// file: src/security/mod.rs
// version: 2.0.0
// guid: 6a0c3e57-91d2-4b8f-a4e6-05c7d93b1f28

//! Shared secrets: the registration token and the master key pair

pub mod keys;
pub mod token;

pub use keys::{fingerprint, KeyPair};
pub use token::RegistrationToken;
