// file: src/ssh_config/parser.rs
// version: 1.0.1
// guid: 0ca580ed-9ef8-47c9-a320-0e3a961a1c56

//! SSH client config parsing

use super::model::{ConfigFile, ConfigStatus, Directives, HostBlock};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Aliases of a `Host` header line, or `None` for any other line.
///
/// The keyword is matched case-insensitively, must be followed by a space
/// and then at least one alias.
pub fn host_line_aliases(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    let keyword = trimmed.get(..5)?;
    if !keyword.eq_ignore_ascii_case("host ") {
        return None;
    }

    let aliases: Vec<String> = trimmed[5..].split_whitespace().map(String::from).collect();
    if aliases.is_empty() {
        None
    } else {
        Some(aliases)
    }
}

/// Split a directive line on the first run of whitespace
fn split_directive(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((key, value)) => (key, value.trim()),
        None => (line, ""),
    }
}

fn is_skippable(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parse config text into a [`ConfigFile`]
pub fn parse_str(content: &str) -> ConfigFile {
    let mut file = ConfigFile::new();
    let mut preamble = String::new();
    let mut globals = Directives::new();
    let mut current: Option<HostBlock> = None;

    for raw_line in content.split_inclusive('\n') {
        if let Some(aliases) = host_line_aliases(raw_line) {
            if let Some(block) = current.take() {
                file.push_block(block);
            }
            current = Some(HostBlock::new(aliases));
            continue;
        }

        let trimmed = raw_line.trim();
        match current.as_mut() {
            None => {
                preamble.push_str(raw_line);
                if !is_skippable(trimmed) {
                    let (key, value) = split_directive(trimmed);
                    globals.insert(key, value);
                }
            }
            Some(block) => {
                if !is_skippable(trimmed) {
                    let (key, value) = split_directive(trimmed);
                    block.directives.insert(key, value);
                }
            }
        }
    }

    if let Some(block) = current.take() {
        file.push_block(block);
    }

    file.preamble = preamble;
    file.globals = globals;
    file
}

/// Read and parse a config file. Read failures are reported in the returned
/// status rather than raised.
pub fn parse_file<P: AsRef<Path>>(path: P) -> ConfigStatus {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => ConfigStatus::Loaded(parse_str(&content)),
        Err(e) if e.kind() == ErrorKind::NotFound => ConfigStatus::Missing,
        Err(e) => {
            debug!("Unable to read {}: {}", path.display(), e);
            ConfigStatus::Unreadable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
# managed by kangaroo
ServerAliveInterval 30

Host a b
  HostName 1.1.1.1
  # inline comment
  Port 22
  HostName 1.1.1.9

host c
\tHostName 2.2.2.2
\tForwardAgent
";

    #[test]
    fn test_host_line_detection() {
        assert_eq!(
            host_line_aliases("  HOST web1 web2 "),
            Some(vec!["web1".to_string(), "web2".to_string()])
        );
        assert_eq!(host_line_aliases("HostName 1.2.3.4"), None);
        assert_eq!(host_line_aliases("Host"), None);
        assert_eq!(host_line_aliases("# Host x"), None);
        assert_eq!(host_line_aliases("Host\tweb"), None);
    }

    #[test]
    fn test_parse_multi_alias_blocks() {
        let file = parse_str(SAMPLE);

        assert_eq!(file.blocks().len(), 2);
        assert_eq!(file.aliases(), vec!["a", "b", "c"]);

        let a = file.get("a").unwrap();
        assert_eq!(a.host_name(), Some("1.1.1.9"));
        assert_eq!(a.directives.get("Port"), Some("22"));
        assert_eq!(file.get("b"), Some(a));

        let c = file.get("c").unwrap();
        assert_eq!(c.host_name(), Some("2.2.2.2"));
        assert_eq!(c.directives.get("ForwardAgent"), Some(""));
    }

    #[test]
    fn test_preamble_is_kept_verbatim() {
        let file = parse_str(SAMPLE);

        assert_eq!(file.preamble, "# managed by kangaroo\nServerAliveInterval 30\n\n");
        assert_eq!(file.globals.get("ServerAliveInterval"), Some("30"));
    }

    #[test]
    fn test_file_without_hosts_is_empty() {
        let file = parse_str("# nothing here\n\n");
        assert!(file.is_empty());
        assert!(parse_str("").is_empty());
    }

    #[test]
    fn test_render_round_trip_keeps_directive_order() {
        let file = parse_str(SAMPLE);
        let reparsed = parse_str(&file.render());

        assert_eq!(reparsed.blocks(), file.blocks());
        let keys: Vec<_> = reparsed
            .get("a")
            .unwrap()
            .directives
            .iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["HostName", "Port"]);
    }

    #[test]
    fn test_parse_file_states() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("config");
        assert_eq!(parse_file(&missing), ConfigStatus::Missing);

        std::fs::write(&missing, "").unwrap();
        assert_eq!(parse_file(&missing), ConfigStatus::Loaded(ConfigFile::new()));

        // A directory cannot be read as a file
        assert!(matches!(
            parse_file(dir.path()),
            ConfigStatus::Unreadable(_)
        ));
    }
}
