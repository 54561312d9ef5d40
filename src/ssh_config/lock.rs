// file: src/ssh_config/lock.rs
// version: 1.1.0
// guid: dbc8bd71-e5fe-40a4-bef6-2878501617e8

//! Serialized, atomic rewrites of shared files
//!
//! Two layers guard every mutation of a path: an in-process mutex keyed by
//! the canonical path (concurrent HTTP registrations) and an advisory `flock`
//! (concurrent CLI invocations). Lock files live in a directory owned by the
//! running account, keyed by a digest of the canonical path, so nothing is
//! left in the directories being edited. Writes land in a temp file in the
//! target's directory and are renamed over the target.

use crate::{KangarooError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{DirBuilder, File, Metadata, OpenOptions, Permissions};
use std::io::{ErrorKind, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

static PATH_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
static LOCK_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Directory holding the advisory lock files. The first call wins.
pub fn set_lock_dir(dir: impl Into<PathBuf>) {
    let dir = dir.into();
    if LOCK_DIR.set(dir.clone()).is_err() {
        debug!("Lock directory already set, ignoring {}", dir.display());
    }
}

fn lock_dir() -> PathBuf {
    LOCK_DIR.get().cloned().unwrap_or_else(|| {
        let euid = unsafe { libc::geteuid() };
        std::env::temp_dir().join(format!("kangaroo-locks-{}", euid))
    })
}

/// Create `dir` (0700) when missing; otherwise it must be a real directory
/// owned by the effective user.
fn prepare_lock_dir(dir: &Path) -> Result<()> {
    match std::fs::symlink_metadata(dir) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
        }
        Err(e) => return Err(e.into()),
    }

    let meta = std::fs::symlink_metadata(dir)?;
    let euid = unsafe { libc::geteuid() };
    if !meta.is_dir() || meta.uid() != euid {
        return Err(KangarooError::system(format!(
            "lock directory {} is not a directory owned by uid {}",
            dir.display(),
            euid
        )));
    }
    Ok(())
}

fn process_lock_for(path: &Path) -> Arc<Mutex<()>> {
    let registry = PATH_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = registry.lock().unwrap_or_else(|e| e.into_inner());
    map.entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// `<lock_dir>/<digest of key>.lock`
fn lock_file_for(lock_dir: &Path, key: &Path) -> PathBuf {
    let digest = Sha256::digest(key.as_os_str().as_bytes());
    lock_dir.join(format!("{}.lock", URL_SAFE_NO_PAD.encode(digest)))
}

/// Exclusive `flock` held until drop
struct AdvisoryLock {
    file: File,
}

impl AdvisoryLock {
    fn acquire(lock_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .mode(0o600)
            .custom_flags(libc::O_NOFOLLOW)
            .open(lock_path)?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        debug!("Acquired file lock {}", lock_path.display());
        Ok(Self { file })
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// Run `f` while holding both the in-process and the advisory lock for `path`.
///
/// The parent directory must already exist.
pub fn with_path_lock<T>(path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let key = path
        .parent()
        .and_then(|p| p.canonicalize().ok())
        .and_then(|p| path.file_name().map(|n| p.join(n)))
        .unwrap_or_else(|| path.to_path_buf());

    let process_lock = process_lock_for(&key);
    let _guard = process_lock.lock().unwrap_or_else(|e| e.into_inner());

    let dir = lock_dir();
    prepare_lock_dir(&dir)?;
    let _flock = AdvisoryLock::acquire(&lock_file_for(&dir, &key))?;

    f()
}

/// Ownership and mode applied to a freshly written file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOwnership {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl FileOwnership {
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode() & 0o7777,
        }
    }
}

/// Replace `path` with `contents`: temp file, fsync, chown/chmod, rename.
///
/// A symlink at `path` is replaced, never followed.
pub fn write_atomic(path: &Path, contents: &[u8], ownership: Option<FileOwnership>) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    if let Some(owner) = ownership {
        if let Err(e) = std::os::unix::fs::fchown(tmp.as_file(), Some(owner.uid), Some(owner.gid)) {
            warn!("Failed to set ownership on {}: {}", path.display(), e);
            return Err(e.into());
        }
        tmp.as_file()
            .set_permissions(Permissions::from_mode(owner.mode))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
