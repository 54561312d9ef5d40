// file: src/users/mod.rs
// version: 1.0.1
// guid: 5b883429-7ea7-40e0-b05f-920e648b3608

//! Local accounts eligible for jump-server access
//!
//! The account database is re-read on every call so results always reflect
//! its live state.

use crate::config::Settings;
use crate::ssh_config::{parse_file, ConfigStatus};
use crate::Result;
use std::path::PathBuf;
use tracing::{error, warn};

/// Shells that deny interactive login; matched as substrings
const DENIED_SHELLS: [&str; 2] = ["nologin", "false"];

/// One row of the account database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
    pub shell: String,
}

impl PasswdEntry {
    /// Parse a `name:pw:uid:gid:gecos:home:shell` line
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() || line.starts_with('#') {
            return None;
        }

        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            return None;
        }

        Some(Self {
            name: fields[0].to_string(),
            uid: fields[2].parse().ok()?,
            gid: fields[3].parse().ok()?,
            home: PathBuf::from(fields[5]),
            shell: fields[6].to_string(),
        })
    }

    fn is_eligible(&self, min_uid: u32) -> bool {
        self.uid > min_uid && !DENIED_SHELLS.iter().any(|s| self.shell.contains(s))
    }
}

/// A local account together with its parsed SSH client config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
    pub config: ConfigStatus,
}

impl LocalUser {
    fn from_entry(entry: PasswdEntry) -> Self {
        let config = parse_file(entry.home.join(".ssh").join("config"));
        Self {
            username: entry.name,
            uid: entry.uid,
            gid: entry.gid,
            home: entry.home,
            config,
        }
    }

    pub fn ssh_dir(&self) -> PathBuf {
        self.home.join(".ssh")
    }

    pub fn config_path(&self) -> PathBuf {
        self.ssh_dir().join("config")
    }

    /// Host aliases in this user's config
    pub fn hosts(&self) -> Vec<&str> {
        self.config.aliases()
    }
}

/// Which local users a provisioning run touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetUsers {
    All,
    Named(Vec<String>),
}

impl TargetUsers {
    /// Parse `all` or a comma separated list of names
    pub fn parse(spec: &str) -> Self {
        if spec.trim().eq_ignore_ascii_case("all") {
            return Self::All;
        }
        Self::Named(
            spec.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    /// Build from a configured list, where an `all` entry wins
    pub fn from_list(names: &[String]) -> Self {
        if names.iter().any(|n| n.trim().eq_ignore_ascii_case("all")) {
            Self::All
        } else {
            Self::Named(names.to_vec())
        }
    }
}

/// Targets resolved against the account database
#[derive(Debug, Clone, Default)]
pub struct ResolvedTargets {
    pub users: Vec<LocalUser>,
    /// Requested names with no account
    pub missing: Vec<String>,
}

/// Reader over the system account database
#[derive(Debug, Clone)]
pub struct UserRegistry {
    passwd_path: PathBuf,
    min_uid: u32,
}

impl UserRegistry {
    pub fn new(passwd_path: impl Into<PathBuf>, min_uid: u32) -> Self {
        Self {
            passwd_path: passwd_path.into(),
            min_uid,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.paths.passwd_file, settings.provision.min_uid)
    }

    /// Every parseable account, unfiltered
    pub fn read_accounts(&self) -> Result<Vec<PasswdEntry>> {
        let content = std::fs::read_to_string(&self.passwd_path)?;
        Ok(content.lines().filter_map(PasswdEntry::parse).collect())
    }

    /// Eligible accounts: uid above the threshold and a login shell.
    ///
    /// An unreadable database is logged and yields no users.
    pub fn list_local_users(&self) -> Vec<LocalUser> {
        match self.read_accounts() {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| e.is_eligible(self.min_uid))
                .map(LocalUser::from_entry)
                .collect(),
            Err(e) => {
                error!(
                    "Error reading passwd database {}: {}",
                    self.passwd_path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Eligible user by name
    pub fn find(&self, username: &str) -> Option<LocalUser> {
        self.list_local_users()
            .into_iter()
            .find(|u| u.username == username)
    }

    /// Any account by name, eligible or not
    pub fn lookup_account(&self, username: &str) -> Option<LocalUser> {
        match self.read_accounts() {
            Ok(entries) => entries
                .into_iter()
                .find(|e| e.name == username)
                .map(LocalUser::from_entry),
            Err(e) => {
                error!("Error reading passwd database: {}", e);
                None
            }
        }
    }

    /// Resolve a target set. `All` uses the eligible list; named users are
    /// looked up directly and unknown names are reported back.
    pub fn resolve(&self, targets: &TargetUsers) -> ResolvedTargets {
        match targets {
            TargetUsers::All => ResolvedTargets {
                users: self.list_local_users(),
                missing: Vec::new(),
            },
            TargetUsers::Named(names) => {
                let mut resolved = ResolvedTargets::default();
                for name in names {
                    match self.lookup_account(name) {
                        Some(user) => resolved.users.push(user),
                        None => {
                            warn!("User '{}' not found. Skipping.", name);
                            resolved.missing.push(name.clone());
                        }
                    }
                }
                resolved
            }
        }
    }
}
