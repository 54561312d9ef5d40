// file: src/server/registration.rs
// version: 1.1.0
// guid: 5d8e2b4a-c7f1-4093-a6d5-e2b9f0c37a18

//! Slave self-registration
//!
//! A request moves through typed stages: [`ConnectRequest`] (as received),
//! [`AuthenticatedRequest`] (token matched), [`SlaveRegistration`] (fields
//! valid) and finally [`Registered`]. Each gate consumes the previous stage,
//! so a record cannot reach the config files without passing both checks.

use crate::config::Settings;
use crate::directory::{ServerDirectory, ServerRecord};
use crate::provision::configure_local_user;
use crate::security::RegistrationToken;
use crate::ssh_config::{validate_description, validate_host_field, HostEntry};
use crate::users::{TargetUsers, UserRegistry};
use crate::{KangarooError, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// `POST /connect` body as received. Malformed input yields empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectRequest {
    pub token: Option<String>,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub ssh_port: u16,
    pub description: Option<String>,
}

impl ConnectRequest {
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self {
                ssh_port: DEFAULT_SSH_PORT,
                ..Default::default()
            },
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            token: text("token"),
            hostname: text("hostname"),
            ip: text("ip"),
            ssh_port: value.get("ssh_port").map_or(DEFAULT_SSH_PORT, parse_port),
            description: text("description"),
        }
    }

    /// Exact token match; anything else is rejected without detail
    pub fn authenticate(self, token: &RegistrationToken) -> Result<AuthenticatedRequest> {
        if token.verify(self.token.as_deref()) {
            Ok(AuthenticatedRequest(self))
        } else {
            Err(KangarooError::AuthRejected)
        }
    }
}

/// Port as a JSON number or numeric string; anything else is the default
fn parse_port(value: &Value) -> u16 {
    let port = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    port.and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p != 0)
        .unwrap_or(DEFAULT_SSH_PORT)
}

/// A request whose token matched
#[derive(Debug)]
pub struct AuthenticatedRequest(ConnectRequest);

impl AuthenticatedRequest {
    pub fn validate(self) -> Result<SlaveRegistration> {
        let req = self.0;
        let field = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let (Some(hostname), Some(ip)) = (field(req.hostname), field(req.ip)) else {
            return Err(KangarooError::validation("hostname and ip are required"));
        };
        validate_host_field("hostname", &hostname)?;
        validate_host_field("ip", &ip)?;

        let description = field(req.description);
        if let Some(description) = &description {
            validate_description(description)?;
        }

        Ok(SlaveRegistration {
            hostname,
            ip,
            port: req.ssh_port,
            description,
        })
    }
}

/// A fully validated registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveRegistration {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub description: Option<String>,
}

/// Success payload of `POST /connect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registered {
    pub status: &'static str,
    pub server: String,
    pub ip: String,
    pub port: u16,
}

/// Applies validated registrations to the configured local users
#[derive(Debug, Clone)]
pub struct Registrar {
    registry: UserRegistry,
    directory: ServerDirectory,
    targets: TargetUsers,
    private_key: PathBuf,
    remote_user: String,
    identity_file_name: String,
}

impl Registrar {
    pub fn new(settings: &Settings) -> Self {
        Self {
            registry: UserRegistry::from_settings(settings),
            directory: ServerDirectory::new(&settings.paths.servers_file),
            targets: TargetUsers::from_list(&settings.registration.target_users),
            private_key: settings.paths.key_path.clone(),
            remote_user: settings.provision.remote_user.clone(),
            identity_file_name: settings.provision.identity_file_name.clone(),
        }
    }

    pub fn targets(&self) -> &TargetUsers {
        &self.targets
    }

    /// Append a host block for every target user, then record the server.
    ///
    /// Re-registering the same host appends another block; nothing is
    /// deduplicated.
    pub fn register(&self, registration: SlaveRegistration) -> Result<Registered> {
        let entry = HostEntry {
            alias: registration.hostname.clone(),
            ip: registration.ip.clone(),
            port: registration.port,
            description: registration.description.clone(),
            remote_user: self.remote_user.clone(),
            identity_file_name: self.identity_file_name.clone(),
        };
        entry.validate()?;

        let resolved = self.registry.resolve(&self.targets);
        for name in &resolved.missing {
            warn!("Registration target user '{}' does not exist", name);
        }
        for user in &resolved.users {
            configure_local_user(user, &self.private_key, &entry)?;
        }

        self.directory
            .append(&ServerRecord::new(&registration.hostname, &registration.ip))?;

        info!(
            "Registered {} ({}:{}) for {} user(s)",
            registration.hostname,
            registration.ip,
            registration.port,
            resolved.users.len()
        );

        Ok(Registered {
            status: "ok",
            server: registration.hostname,
            ip: registration.ip,
            port: registration.port,
        })
    }
}
