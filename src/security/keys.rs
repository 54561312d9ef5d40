// file: src/security/keys.rs
// version: 1.0.0
// guid: 2e6f1d8a-4c0b-4a57-9d3e-7b1f0c52a9e4

//! The master's shared SSH key pair

use crate::network::executor::{CommandRunner, CommandSpec};
use crate::{KangarooError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::sync::Mutex;
use tracing::info;

/// Serializes first-time generation across concurrent callers
fn keygen_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Private key path plus its `.pub` companion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    private_key: PathBuf,
    public_key: PathBuf,
}

impl KeyPair {
    pub fn new(private_key: impl Into<PathBuf>) -> Self {
        let private_key = private_key.into();
        let mut public = private_key.clone().into_os_string();
        public.push(".pub");
        Self {
            private_key,
            public_key: PathBuf::from(public),
        }
    }

    pub fn private_key(&self) -> &Path {
        &self.private_key
    }

    pub fn public_key(&self) -> &Path {
        &self.public_key
    }

    pub fn exists(&self) -> bool {
        self.private_key.is_file()
    }

    /// Generate the pair if absent. Returns whether a key was created.
    ///
    /// An existing private key is never replaced.
    pub async fn ensure(&self, runner: &dyn CommandRunner) -> Result<bool> {
        let _guard = keygen_lock().lock().await;

        if self.exists() {
            info!("Reusing existing SSH key at {}", self.private_key.display());
            return Ok(false);
        }

        if let Some(parent) = self.private_key.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("Generating SSH key at {}", self.private_key.display());
        let spec = CommandSpec::new("ssh-keygen")
            .args(["-t", "rsa", "-b", "4096", "-f"])
            .arg(self.private_key.to_string_lossy())
            .args(["-N", "", "-q"]);
        runner.run_checked(&spec).await?;

        if !self.exists() {
            return Err(KangarooError::system(format!(
                "ssh-keygen did not produce {}",
                self.private_key.display()
            )));
        }
        tokio::fs::set_permissions(&self.private_key, std::fs::Permissions::from_mode(0o600))
            .await?;

        Ok(true)
    }

    /// Public key text, or `None` when the pair has not been generated
    pub async fn read_public_key(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.public_key).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// `SHA256:<base64>` fingerprint of an OpenSSH public key line
pub fn fingerprint(public_key: &str) -> Result<String> {
    let blob = public_key
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| KangarooError::validation("Invalid SSH public key format"))?;

    let key_data = STANDARD
        .decode(blob)
        .map_err(|e| KangarooError::validation(format!("Failed to decode SSH key data: {}", e)))?;

    let hash = Sha256::digest(&key_data);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(hash)))
}
