// file: src/security/token.rs
// version: 1.0.0
// guid: 857fe0d1-b938-413a-b455-ae7c3fc1fd4e

//! Registration token gating slave bootstrap and self-registration

use crate::ssh_config::lock::{with_path_lock, write_atomic};
use crate::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use std::io::ErrorKind;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use tracing::info;

const TOKEN_BYTES: usize = 32;

/// Process-wide shared secret, loaded or created once at startup
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationToken {
    value: String,
}

impl std::fmt::Debug for RegistrationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RegistrationToken(..)")
    }
}

impl RegistrationToken {
    /// Fresh URL-safe random token
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            value: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// Read the persisted token, creating it (mode 0600) on first use.
    /// An empty token file is treated as absent.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if let Some(token) = Self::read(path)? {
            return Ok(token);
        }

        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                std::fs::DirBuilder::new()
                    .recursive(true)
                    .mode(0o700)
                    .create(parent)?;
            }
        }

        with_path_lock(path, || {
            if let Some(token) = Self::read(path)? {
                return Ok(token);
            }
            let token = Self::generate();
            write_atomic(path, format!("{}\n", token.value).as_bytes(), None)?;
            info!("Generated registration token at {}", path.display());
            Ok(token)
        })
    }

    fn read(path: &Path) -> Result<Option<Self>> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let value = content.trim();
                if value.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Self {
                        value: value.to_string(),
                    }))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Exact string match; absence never matches
    pub fn verify(&self, candidate: Option<&str>) -> bool {
        matches!(candidate, Some(c) if c == self.value)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl From<String> for RegistrationToken {
    fn from(value: String) -> Self {
        Self { value }
    }
}
