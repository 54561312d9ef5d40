// file: src/ssh_config/model.rs
// version: 1.0.1
// guid: 3f04fed1-51cc-40c6-bf51-415d3f34d53e

//! In-memory model of an SSH client config file
//!
//! A [`ConfigFile`] owns its [`HostBlock`]s once, in file order. Aliases are
//! resolved through an index into that sequence rather than by handing the
//! same directive map to every alias.

use std::collections::HashMap;
use std::fmt::Write as _;

/// Ordered directive mapping; re-inserting a key overwrites its value in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    entries: Vec<(String, String)>,
}

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. An existing key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate sorted by key, the order used for human-readable listings
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut items: Vec<_> = self.iter().collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        items
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A `Host` block: one or more aliases sharing a directive mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock {
    aliases: Vec<String>,
    pub directives: Directives,
}

impl HostBlock {
    /// Create a block. Duplicate aliases on the same line collapse to one.
    pub fn new<I, S>(aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for alias in aliases {
            let alias = alias.into();
            if !unique.contains(&alias) {
                unique.push(alias);
            }
        }

        Self {
            aliases: unique,
            directives: Directives::new(),
        }
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    pub fn host_name(&self) -> Option<&str> {
        self.directives.get("HostName")
    }

    /// Render as `Host` header plus indented directives
    pub fn render(&self) -> String {
        let mut out = format!("Host {}\n", self.aliases.join(" "));
        for (key, value) in self.directives.iter() {
            if value.is_empty() {
                let _ = writeln!(out, "    {}", key);
            } else {
                let _ = writeln!(out, "    {} {}", key, value);
            }
        }
        out
    }
}

/// Parsed contents of one user's SSH client config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Raw text before the first `Host` line, kept verbatim
    pub preamble: String,
    /// Directives found in the preamble; read-only, never rewritten
    pub globals: Directives,
    blocks: Vec<HostBlock>,
    index: HashMap<String, usize>,
}

impl ConfigFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block. An alias already present elsewhere now resolves to this
    /// block, mirroring how a later `Host` line shadows an earlier one.
    pub fn push_block(&mut self, block: HostBlock) {
        let position = self.blocks.len();
        for alias in block.aliases() {
            self.index.insert(alias.clone(), position);
        }
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[HostBlock] {
        &self.blocks
    }

    /// Block an alias resolves to
    pub fn get(&self, alias: &str) -> Option<&HostBlock> {
        self.index.get(alias).map(|&i| &self.blocks[i])
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.index.contains_key(alias)
    }

    /// Every alias once, in order of first appearance
    pub fn aliases(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for block in &self.blocks {
            for alias in block.aliases() {
                if !seen.contains(&alias.as_str()) {
                    seen.push(alias.as_str());
                }
            }
        }
        seen
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serialize. Comments and blank lines inside blocks are not retained.
    pub fn render(&self) -> String {
        let mut out = self.preamble.clone();
        for block in &self.blocks {
            out.push_str(&block.render());
        }
        out
    }
}

/// Outcome of reading a config file from disk.
///
/// Lets callers tell "no config" from "unreadable config" from "empty config".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    Missing,
    Unreadable(String),
    Loaded(ConfigFile),
}

impl ConfigStatus {
    pub fn file(&self) -> Option<&ConfigFile> {
        match self {
            Self::Loaded(file) => Some(file),
            _ => None,
        }
    }

    /// Aliases, or none when the file is absent or unreadable
    pub fn aliases(&self) -> Vec<&str> {
        self.file().map(ConfigFile::aliases).unwrap_or_default()
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Unreadable(msg) => Some(msg),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_last_wins_in_place() {
        let mut d = Directives::new();
        d.insert("HostName", "1.1.1.1");
        d.insert("Port", "22");
        d.insert("HostName", "2.2.2.2");

        assert_eq!(d.get("HostName"), Some("2.2.2.2"));
        let keys: Vec<_> = d.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["HostName", "Port"]);
    }

    #[test]
    fn test_alias_index_points_at_shared_block() {
        let mut block = HostBlock::new(["a", "b", "a"]);
        block.directives.insert("HostName", "1.1.1.1");

        let mut file = ConfigFile::new();
        file.push_block(block);

        assert_eq!(file.blocks().len(), 1);
        assert_eq!(file.get("a").unwrap().aliases(), &["a", "b"]);
        assert!(std::ptr::eq(file.get("a").unwrap(), file.get("b").unwrap()));
    }

    #[test]
    fn test_later_block_shadows_alias() {
        let mut first = HostBlock::new(["web"]);
        first.directives.insert("HostName", "old");
        let mut second = HostBlock::new(["web", "www"]);
        second.directives.insert("HostName", "new");

        let mut file = ConfigFile::new();
        file.push_block(first);
        file.push_block(second);

        assert_eq!(file.get("web").unwrap().host_name(), Some("new"));
        assert_eq!(file.aliases(), vec!["web", "www"]);
    }

    #[test]
    fn test_render_block() {
        let mut block = HostBlock::new(["db"]);
        block.directives.insert("HostName", "10.0.0.2");
        block.directives.insert("ForwardAgent", "");

        assert_eq!(
            block.render(),
            "Host db\n    HostName 10.0.0.2\n    ForwardAgent\n"
        );
    }

    #[test]
    fn test_status_accessors() {
        assert!(ConfigStatus::Missing.aliases().is_empty());
        assert_eq!(
            ConfigStatus::Unreadable("denied".into()).error(),
            Some("denied")
        );
        assert!(ConfigStatus::Loaded(ConfigFile::new()).file().unwrap().is_empty());
    }
}
