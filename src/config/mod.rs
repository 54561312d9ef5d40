// file: src/config/mod.rs
// version: 2.1.0
// guid: 27e91ab8-8e13-453d-b5a8-cee786522b81

//! Configuration module for Kangaroo
//!
//! Handles loading of the master settings file: filesystem locations of the
//! shared state, the registration service listener and provisioning policy.

pub mod loader;

pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub service: ServiceConfig,
    pub registration: RegistrationConfig,
    pub provision: ProvisionConfig,
}

/// Locations of persisted state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Shared private key; the public half lives next to it with `.pub`
    pub key_path: PathBuf,
    pub token_path: PathBuf,
    pub servers_file: PathBuf,
    pub login_log: PathBuf,
    pub passwd_file: PathBuf,
    /// known_hosts scrubbed before password-based key deployment
    pub known_hosts: PathBuf,
    /// Advisory lock files for every mutated path
    pub lock_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            key_path: PathBuf::from("/etc/ssh/kangaroo_key_id_rsa"),
            token_path: PathBuf::from("/etc/kangaroo/registration_token"),
            servers_file: PathBuf::from("/var/lib/kangaroo/jump_servers.conf"),
            login_log: PathBuf::from("/var/log/kangaroo/ssh_login.log"),
            passwd_file: PathBuf::from("/etc/passwd"),
            known_hosts: PathBuf::from("/root/.ssh/known_hosts"),
            lock_dir: PathBuf::from("/run/kangaroo/locks"),
        }
    }
}

/// Registration service listener
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_address: String,
    pub port: u16,
    /// Address printed in the bootstrap one-liner when set
    pub advertised_address: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            advertised_address: None,
            request_timeout_secs: 30,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Self-registration policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Local users whose SSH config receives self-registered slaves.
    /// The literal `all` expands to every eligible local user.
    pub target_users: Vec<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            target_users: vec!["kangaroo".to_string()],
        }
    }
}

/// Provisioning policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Jump account created on every slave
    pub remote_user: String,
    pub default_ssh_user: String,
    /// File name of the private key installed in each local user's `.ssh`
    pub identity_file_name: String,
    pub command_timeout_secs: u64,
    /// Accounts with a uid strictly above this value are eligible
    pub min_uid: u32,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            remote_user: "kangaroo".to_string(),
            default_ssh_user: "root".to_string(),
            identity_file_name: "kangaroo_key_id_rsa".to_string(),
            command_timeout_secs: 120,
            min_uid: 1000,
        }
    }
}

impl ProvisionConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Settings {
    /// Public half of the shared key pair
    pub fn public_key_path(&self) -> PathBuf {
        let mut path = self.paths.key_path.clone().into_os_string();
        path.push(".pub");
        PathBuf::from(path)
    }
}
