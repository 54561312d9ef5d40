// file: src/provision/mod.rs
// version: 1.1.0
// guid: 7c3a9e15-2f84-4d6b-a0e7-58b1d4c6f930

//! Add-server workflow
//!
//! Resolve the address, authenticate, deploy the shared key, provision the
//! jump account remotely, then give each target local user an identity and a
//! host block. A failing step stops the run and earlier side effects stay in
//! place.

pub mod prompt;

pub use prompt::Prompter;

use crate::config::Settings;
use crate::directory::{ServerDirectory, ServerRecord};
use crate::network::executor::CommandRunner;
use crate::network::ssh::{remote_provision_script, SshClient, SshTarget};
use crate::security::KeyPair;
use crate::ssh_config::lock::{with_path_lock, write_atomic, FileOwnership};
use crate::ssh_config::{
    append_block, ensure_ssh_dir, validate_description, validate_host_field, HostEntry,
};
use crate::users::{LocalUser, TargetUsers, UserRegistry};
use crate::utils::SystemUtils;
use crate::{KangarooError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Parameters of one add-server run; `None` fields are prompted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddServerRequest {
    pub name: String,
    pub ip: Option<String>,
    pub ssh_user: String,
    pub port: u16,
    pub password: Option<String>,
    pub description: Option<String>,
    pub targets: Option<TargetUsers>,
}

/// How the shared key reaches the slave
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(String),
    /// Operator installs the key out of band
    Manual,
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(..)"),
            Self::Manual => f.write_str("Manual"),
        }
    }
}

/// What a completed run touched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddServerReport {
    pub ip: String,
    pub configured: Vec<String>,
    pub skipped: Vec<String>,
}

/// Give `user` the shared identity and a host block for `entry`.
///
/// The private key is copied to `~/.ssh/<identity_file_name>` (0600, owned by
/// the user) because the block's `IdentityFile` points at it. Symlinks at
/// `~/.ssh`, the identity or the config are refused.
pub fn configure_local_user(user: &LocalUser, private_key: &Path, entry: &HostEntry) -> Result<()> {
    entry.validate()?;

    let ssh_dir = user.ssh_dir();
    let identity = ssh_dir.join(&entry.identity_file_name);
    for path in [&ssh_dir, &identity, &user.config_path()] {
        let is_symlink = std::fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_symlink {
            return Err(KangarooError::system(format!(
                "refusing to configure user '{}': {} is a symlink",
                user.username,
                path.display()
            )));
        }
    }
    ensure_ssh_dir(&ssh_dir, user.uid, user.gid)?;

    let key = std::fs::read(private_key)?;
    let owner = FileOwnership {
        uid: user.uid,
        gid: user.gid,
        mode: 0o600,
    };
    with_path_lock(&identity, || write_atomic(&identity, &key, Some(owner)))?;

    append_block(&user.config_path(), user.uid, user.gid, &entry.render())?;
    info!("Configured host '{}' for {}", entry.alias, user.username);
    Ok(())
}

/// Drives the add-server workflow
pub struct Orchestrator {
    runner: Arc<dyn CommandRunner>,
    ssh: SshClient,
    keys: KeyPair,
    registry: UserRegistry,
    directory: ServerDirectory,
    remote_user: String,
    identity_file_name: String,
}

impl Orchestrator {
    pub fn new(settings: &Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            ssh: SshClient::new(runner.clone(), &settings.paths.known_hosts),
            runner,
            keys: KeyPair::new(&settings.paths.key_path),
            registry: UserRegistry::from_settings(settings),
            directory: ServerDirectory::new(&settings.paths.servers_file),
            remote_user: settings.provision.remote_user.clone(),
            identity_file_name: settings.provision.identity_file_name.clone(),
        }
    }

    /// Run every step of the workflow in order
    pub async fn add_server(
        &self,
        request: AddServerRequest,
        prompter: &dyn Prompter,
    ) -> Result<AddServerReport> {
        validate_host_field("server name", &request.name)?;
        if let Some(description) = &request.description {
            validate_description(description)?;
        }

        let ip = self.resolve_ip(&request, prompter).await?;
        validate_host_field("ip", &ip)?;
        let auth = resolve_auth(request.password.clone(), prompter)?;

        if self.keys.ensure(self.runner.as_ref()).await? {
            prompter.say("Generated SSH key.");
        } else {
            prompter.say("Reusing existing SSH key.");
        }

        let target = SshTarget {
            user: request.ssh_user.clone(),
            host: ip.clone(),
            port: request.port,
        };

        match auth {
            AuthMethod::Password(password) => {
                self.ssh
                    .copy_id(&target, &password, self.keys.public_key())
                    .await
                    .map_err(|e| KangarooError::ssh(format!("Failed to copy SSH key: {}", e)))?;
                prompter.say("SSH key copied successfully.");
            }
            AuthMethod::Manual => {
                let public_key = self.keys.read_public_key().await?.ok_or_else(|| {
                    KangarooError::not_found(format!(
                        "public key {}",
                        self.keys.public_key().display()
                    ))
                })?;
                prompter.say("\nAdd this key to remote authorized_keys:\n");
                prompter.say(public_key.trim_end());
                prompter.pause("Press ENTER when done...")?;
            }
        }

        let script = remote_provision_script(&self.remote_user);
        self.ssh
            .run_remote_provision(&target, self.keys.private_key(), &script)
            .await?;
        prompter.say("Remote configuration complete.");

        let targets = match request.targets.clone() {
            Some(targets) => targets,
            None => prompt_targets(prompter)?,
        };

        let entry = HostEntry {
            alias: request.name.clone(),
            ip: ip.clone(),
            port: request.port,
            description: request.description.clone(),
            remote_user: self.remote_user.clone(),
            identity_file_name: self.identity_file_name.clone(),
        };

        let resolved = self.registry.resolve(&targets);
        let mut report = AddServerReport {
            ip: ip.clone(),
            configured: Vec::new(),
            skipped: resolved.missing.clone(),
        };
        for name in &resolved.missing {
            prompter.say(&format!("User '{}' not found. Skipping.", name));
        }
        for user in &resolved.users {
            configure_local_user(user, self.keys.private_key(), &entry)?;
            prompter.say(&format!("Configured SSH for user '{}'.", user.username));
            report.configured.push(user.username.clone());
        }

        self.directory
            .append(&ServerRecord::new(&request.name, &ip))?;

        prompter.say(&format!(
            "\nServer {} ({}:{}) added successfully",
            request.name, ip, request.port
        ));
        Ok(report)
    }

    async fn resolve_ip(&self, request: &AddServerRequest, prompter: &dyn Prompter) -> Result<String> {
        if let Some(ip) = request.ip.as_deref().filter(|ip| !ip.trim().is_empty()) {
            return Ok(ip.trim().to_string());
        }

        if let Some(ip) = SystemUtils::resolve_address(&request.name).await {
            prompter.say(&format!("Resolved {} -> {}", request.name, ip));
            return Ok(ip);
        }

        warn!("Could not resolve '{}'", request.name);
        let ip = prompter.prompt("IP Address")?;
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(KangarooError::validation("an IP address is required"));
        }
        Ok(ip.to_string())
    }
}

/// Use the supplied password or ask for a method
fn resolve_auth(password: Option<String>, prompter: &dyn Prompter) -> Result<AuthMethod> {
    if let Some(password) = password.filter(|p| !p.is_empty()) {
        return Ok(AuthMethod::Password(password));
    }

    prompter.say("\nChoose authentication method:");
    prompter.say("  1) Password");
    prompter.say("  2) Manual SSH key installation");
    loop {
        match prompter.prompt("Select option")?.trim() {
            "1" => return Ok(AuthMethod::Password(prompter.prompt_password("Password")?)),
            "2" => return Ok(AuthMethod::Manual),
            other => prompter.say(&format!("Error: '{}' is not a valid choice.", other)),
        }
    }
}

fn prompt_targets(prompter: &dyn Prompter) -> Result<TargetUsers> {
    if prompter.confirm("Setup SSH for all existing users?")? {
        Ok(TargetUsers::All)
    } else {
        Ok(TargetUsers::parse(
            &prompter.prompt("Enter usernames (comma-separated)")?,
        ))
    }
}
