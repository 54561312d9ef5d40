// file: src/config/loader.rs
// version: 2.0.0
// guid: 8d7319cc-1115-4351-96c8-dc58a41bd639

//! Settings file loading and environment variable substitution

use super::Settings;
use crate::{KangarooError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// System-wide settings location
pub const SYSTEM_CONFIG_PATH: &str = "/etc/kangaroo/config.toml";

/// Settings loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Resolve and load settings.
    ///
    /// An explicit path must exist. Without one, the system file and then the
    /// user config directory are tried; if neither exists defaults are used.
    pub fn load(&self, explicit: Option<&Path>) -> Result<Settings> {
        let settings = match explicit {
            Some(path) => self.load_settings(path)?,
            None => match self.candidate_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => self.load_settings(&path)?,
                None => {
                    debug!("No settings file found, using defaults");
                    Settings::default()
                }
            },
        };

        self.apply_env_overrides(settings)
    }

    /// Load settings from a TOML file
    pub fn load_settings<P: AsRef<Path>>(&self, path: P) -> Result<Settings> {
        let content = fs::read_to_string(&path).map_err(|e| {
            KangarooError::config(format!(
                "Failed to read settings file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        info!("Loading settings from {}", path.as_ref().display());
        let expanded = self.expand_env_vars(&content)?;
        let settings: Settings = toml::from_str(&expanded)?;
        Ok(settings)
    }

    fn candidate_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("kangaroo").join("config.toml"));
        }
        paths
    }

    /// Expand `${VAR}` references in settings content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| KangarooError::config(format!("Invalid regex pattern: {}", e)))?;

        let mut result = content.to_string();
        let mut missing_vars = Vec::new();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];

            if let Some(value) = self.env_vars.get(var_name) {
                result = result.replace(placeholder, value);
            } else {
                missing_vars.push(var_name.to_string());
            }
        }

        if !missing_vars.is_empty() {
            return Err(KangarooError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result)
    }

    /// Apply `KANGAROO_*` environment overrides
    fn apply_env_overrides(&self, mut settings: Settings) -> Result<Settings> {
        if let Some(bind) = self.env_vars.get("KANGAROO_BIND") {
            settings.service.bind_address = bind.clone();
        }

        if let Some(port) = self.env_vars.get("KANGAROO_PORT") {
            settings.service.port = port
                .parse()
                .map_err(|_| KangarooError::config(format!("Invalid KANGAROO_PORT: {}", port)))?;
        }

        if let Some(path) = self.env_vars.get("KANGAROO_KEY_PATH") {
            settings.paths.key_path = PathBuf::from(path);
        }

        if let Some(path) = self.env_vars.get("KANGAROO_TOKEN_PATH") {
            settings.paths.token_path = PathBuf::from(path);
        }

        if let Some(path) = self.env_vars.get("KANGAROO_SERVERS_FILE") {
            settings.paths.servers_file = PathBuf::from(path);
        }

        if let Some(users) = self.env_vars.get("KANGAROO_TARGET_USERS") {
            settings.registration.target_users = users
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(timeout) = self.env_vars.get("KANGAROO_COMMAND_TIMEOUT") {
            if let Ok(secs) = timeout.parse::<u64>() {
                settings.provision.command_timeout_secs = secs;
            }
        }

        Ok(settings)
    }

    /// Set environment variable for substitution and overrides
    pub fn set_env_var(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }

    /// Drop all captured environment variables
    pub fn clear_env(&mut self) {
        self.env_vars.clear();
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn isolated_loader() -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        loader.clear_env();
        loader
    }

    #[test]
    fn test_env_var_expansion() {
        let mut loader = isolated_loader();
        loader.set_env_var("TEST_VAR".to_string(), "test_value".to_string());

        let result = loader.expand_env_vars("key = \"${TEST_VAR}\"").unwrap();
        assert_eq!(result, "key = \"test_value\"");
    }

    #[test]
    fn test_missing_env_var() {
        let loader = isolated_loader();

        let result = loader.expand_env_vars("key = \"${MISSING_VAR}\"");
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Missing environment variables"));
    }

    #[test]
    fn test_load_settings_file() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[paths]
key_path = "/tmp/kangaroo/key"
servers_file = "${{STATE_DIR}}/servers.conf"

[registration]
target_users = ["alice", "bob"]
"#
        )
        .unwrap();

        let mut loader = isolated_loader();
        loader.set_env_var("STATE_DIR".to_string(), "/srv/state".to_string());
        let settings = loader.load(Some(file.path()))?;

        assert_eq!(settings.paths.key_path, PathBuf::from("/tmp/kangaroo/key"));
        assert_eq!(
            settings.paths.servers_file,
            PathBuf::from("/srv/state/servers.conf")
        );
        assert_eq!(settings.registration.target_users, vec!["alice", "bob"]);
        assert_eq!(settings.service.port, 5000);
        Ok(())
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let mut loader = isolated_loader();
        loader.set_env_var("KANGAROO_PORT".to_string(), "7000".to_string());
        loader.set_env_var("KANGAROO_TARGET_USERS".to_string(), "ops, dev ,".to_string());

        let settings = loader.apply_env_overrides(Settings::default())?;
        assert_eq!(settings.service.port, 7000);
        assert_eq!(settings.registration.target_users, vec!["ops", "dev"]);
        Ok(())
    }

    #[test]
    fn test_invalid_port_override() {
        let mut loader = isolated_loader();
        loader.set_env_var("KANGAROO_PORT".to_string(), "not-a-port".to_string());

        assert!(loader.apply_env_overrides(Settings::default()).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let loader = isolated_loader();
        assert!(loader
            .load(Some(Path::new("/nonexistent/kangaroo.toml")))
            .is_err());
    }
}
