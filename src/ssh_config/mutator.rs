// file: src/ssh_config/mutator.rs
// version: 1.1.0
// guid: afec33f4-df37-463e-8d02-1d82f908ef66

//! SSH client config mutation: block removal and block append

use super::lock::{with_path_lock, write_atomic, FileOwnership};
use super::parser::host_line_aliases;
use crate::{KangarooError, Result};
use std::fs::{DirBuilder, OpenOptions};
use std::io::{ErrorKind, Read};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;
use tracing::{debug, info};

/// Result of [`remove_block`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// At least one block was dropped and the file rewritten
    Removed,
    /// The file exists but no block carries the alias
    NotPresent,
    /// There is no config file
    FileMissing,
}

impl RemoveOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// Drop every line belonging to a block that lists `alias`.
///
/// Removal is block-granular: all aliases of a matching block go with it.
/// Lines before the first `Host` line are always kept, and kept lines are
/// reproduced byte for byte.
pub fn filter_blocks(content: &str, alias: &str) -> (String, bool) {
    let mut kept = String::with_capacity(content.len());
    let mut skipping = false;
    let mut removed = false;

    for line in content.split_inclusive('\n') {
        if let Some(aliases) = host_line_aliases(line) {
            skipping = aliases.iter().any(|a| a == alias);
            removed |= skipping;
        }
        if !skipping {
            kept.push_str(line);
        }
    }

    (kept, removed)
}

/// Read a config file without following a symlink at `path`.
///
/// `Ok(None)` when there is no file. `O_NONBLOCK` keeps a FIFO from
/// stalling the open; anything but a regular file is rejected.
fn read_config(path: &Path) -> Result<Option<(String, FileOwnership)>> {
    let mut file = match OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW | libc::O_NONBLOCK)
        .open(path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.raw_os_error() == Some(libc::ELOOP) => {
            return Err(KangarooError::system(format!(
                "refusing to follow symlink at {}",
                path.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let meta = file.metadata()?;
    if !meta.is_file() {
        return Err(KangarooError::system(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some((content, FileOwnership::from_metadata(&meta))))
}

/// `Ok(false)` when `dir` does not exist; an error when it is a symlink or
/// not a directory.
fn check_real_dir(dir: &Path) -> Result<bool> {
    match std::fs::symlink_metadata(dir) {
        Ok(meta) if meta.file_type().is_symlink() => Err(KangarooError::system(format!(
            "refusing to use symlinked directory {}",
            dir.display()
        ))),
        Ok(meta) if meta.is_dir() => Ok(true),
        Ok(_) => Err(KangarooError::system(format!(
            "{} is not a directory",
            dir.display()
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove the blocks carrying `alias` from the config at `path`
pub fn remove_block(path: &Path, alias: &str) -> Result<RemoveOutcome> {
    let dir_exists = match path.parent() {
        Some(parent) => check_real_dir(parent)?,
        None => true,
    };
    if !dir_exists {
        debug!("No config at {}, nothing to remove", path.display());
        return Ok(RemoveOutcome::FileMissing);
    }

    with_path_lock(path, || {
        let Some((content, owner)) = read_config(path)? else {
            debug!("No config at {}, nothing to remove", path.display());
            return Ok(RemoveOutcome::FileMissing);
        };

        let (filtered, removed) = filter_blocks(&content, alias);
        if !removed {
            return Ok(RemoveOutcome::NotPresent);
        }

        write_atomic(path, filtered.as_bytes(), Some(owner))?;
        info!("Removed host '{}' from {}", alias, path.display());
        Ok(RemoveOutcome::Removed)
    })
}

/// Append `block_text` verbatim to the config at `path`.
///
/// Creates the parent directory (0700, owned by the account) when missing,
/// then leaves the whole file owned by `uid:gid` with mode 0600. Symlinks at
/// the directory or the file are refused.
pub fn append_block(path: &Path, uid: u32, gid: u32, block_text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_ssh_dir(parent, uid, gid)?;
    }

    with_path_lock(path, || {
        let mut content = read_config(path)?.map(|(content, _)| content).unwrap_or_default();
        content.push_str(block_text);

        let owner = FileOwnership {
            uid,
            gid,
            mode: 0o600,
        };
        write_atomic(path, content.as_bytes(), Some(owner))?;
        info!("Appended host block to {}", path.display());
        Ok(())
    })
}

/// Create an account's `.ssh` directory (0700, owned by `uid:gid`) if missing.
/// An existing directory is left untouched; a symlink is refused.
pub fn ensure_ssh_dir(dir: &Path, uid: u32, gid: u32) -> Result<()> {
    if check_real_dir(dir)? {
        return Ok(());
    }
    match DirBuilder::new().mode(0o700).create(dir) {
        Ok(()) => {
            std::os::unix::fs::chown(dir, Some(uid), Some(gid))?;
            debug!("Created {}", dir.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => check_real_dir(dir).map(|_| ()),
        Err(e) => Err(e.into()),
    }
}

/// Reject values that would break out of a `Host` line, a directive or a
/// directory record: empty, whitespace, control characters or `#`.
pub fn validate_host_field(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(KangarooError::validation(format!("{} must not be empty", field)));
    }
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '#')
    {
        return Err(KangarooError::validation(format!(
            "{} must not contain whitespace, control characters or '#'",
            field
        )));
    }
    Ok(())
}

/// Descriptions are a single comment line
pub fn validate_description(value: &str) -> Result<()> {
    if value.chars().any(char::is_control) {
        return Err(KangarooError::validation(
            "description must not contain control characters",
        ));
    }
    Ok(())
}

/// Host block written for every provisioned server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub alias: String,
    pub ip: String,
    pub port: u16,
    pub description: Option<String>,
    pub remote_user: String,
    pub identity_file_name: String,
}

impl HostEntry {
    /// Every field must stay on its own line and token
    pub fn validate(&self) -> Result<()> {
        validate_host_field("hostname", &self.alias)?;
        validate_host_field("ip", &self.ip)?;
        validate_host_field("remote user", &self.remote_user)?;
        validate_host_field("identity file name", &self.identity_file_name)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    /// Render with a leading blank line and trailing newline
    pub fn render(&self) -> String {
        let description = self
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or("none");

        format!(
            "\n# Description: {}\nHost {}\n    HostName {}\n    User {}\n    Port {}\n    IdentityFile ~/.ssh/{}\n",
            description, self.alias, self.ip, self.remote_user, self.port, self.identity_file_name
        )
    }
}
