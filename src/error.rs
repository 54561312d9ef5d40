// file: src/error.rs
// version: 3.0.0
// guid: c6d607d3-3e56-4dae-9927-fe9cd4203a5c

use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, KangarooError>;

/// Error types for the Kangaroo jump server
#[derive(Error, Debug)]
pub enum KangarooError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication rejected")]
    AuthRejected,

    #[error("Command '{command}' failed with exit code {exit_code:?}: {stderr}")]
    ProcessError {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("SSH error: {0}")]
    SshError(String),

    #[error("System error: {0}")]
    SystemError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl KangarooError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a new not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new SSH error
    pub fn ssh(msg: impl Into<String>) -> Self {
        Self::SshError(msg.into())
    }

    /// Create a new system error
    pub fn system(msg: impl Into<String>) -> Self {
        Self::SystemError(msg.into())
    }

    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Whether the error came from a spawned external command
    pub fn is_external_command_failure(&self) -> bool {
        matches!(self, Self::ProcessError { .. } | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_display() {
        let err = KangarooError::ProcessError {
            command: "ssh-keygen".to_string(),
            exit_code: Some(1),
            stderr: "boom".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("ssh-keygen"));
        assert!(msg.contains("boom"));
        assert!(err.is_external_command_failure());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: KangarooError = io.into();
        assert!(matches!(err, KangarooError::IoError(_)));
        assert!(!err.is_external_command_failure());
    }

    #[test]
    fn test_auth_rejected_leaks_nothing() {
        assert_eq!(KangarooError::AuthRejected.to_string(), "Authentication rejected");
    }
}
