// file: src/directory.rs
// version: 1.0.0
// guid: cf42811b-8e66-411d-a73d-90f051bc9247

//! Append-only record of every server ever added

use crate::ssh_config::lock::{with_path_lock, write_atomic};
use crate::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// An `(alias, ip)` pair; duplicates are expected after re-adds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub alias: String,
    pub ip: String,
}

impl ServerRecord {
    pub fn new(alias: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ip: ip.into(),
        }
    }

    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let alias = parts.next()?;
        let ip = parts.next().unwrap_or_default();
        Some(Self::new(alias, ip))
    }

    fn to_line(&self) -> String {
        format!("{} {}\n", self.alias, self.ip)
    }
}

/// Flat `<alias> <ip>` file, mode 0600
#[derive(Debug, Clone)]
pub struct ServerDirectory {
    path: PathBuf,
}

impl ServerDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file (and its directory) if needed
    pub fn append(&self, record: &ServerRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        with_path_lock(&self.path, || {
            let mut content = match std::fs::read_to_string(&self.path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e.into()),
            };
            if !content.is_empty() && !content.ends_with('\n') {
                content.push('\n');
            }
            content.push_str(&record.to_line());

            // Temp files are created 0600, which the rename carries over
            write_atomic(&self.path, content.as_bytes(), None)
        })?;

        info!("Recorded server {} ({})", record.alias, record.ip);
        Ok(())
    }

    /// All records in file order; a missing file is an empty directory
    pub fn records(&self) -> Result<Vec<ServerRecord>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().filter_map(ServerRecord::parse).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No server directory at {}", self.path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::MetadataExt;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_list_tolerates_duplicates() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let directory = ServerDirectory::new(dir.path().join("state/jump_servers.conf"));

        assert!(directory.records()?.is_empty());

        directory.append(&ServerRecord::new("web1", "10.0.0.5"))?;
        directory.append(&ServerRecord::new("db", "10.0.0.6"))?;
        directory.append(&ServerRecord::new("web1", "10.0.0.7"))?;

        let records = directory.records()?;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], ServerRecord::new("web1", "10.0.0.5"));
        assert_eq!(records[2], ServerRecord::new("web1", "10.0.0.7"));

        let content = std::fs::read_to_string(directory.path())?;
        assert_eq!(content, "web1 10.0.0.5\ndb 10.0.0.6\nweb1 10.0.0.7\n");
        assert_eq!(std::fs::metadata(directory.path())?.mode() & 0o777, 0o600);
        Ok(())
    }

    #[test]
    fn test_blank_lines_ignored() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers");
        std::fs::write(&path, "a 1.1.1.1\n\nb\n")?;

        let records = ServerDirectory::new(&path).records()?;
        assert_eq!(records, vec![ServerRecord::new("a", "1.1.1.1"), ServerRecord::new("b", "")]);
        Ok(())
    }
}
