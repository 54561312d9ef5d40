// file: src/cli/commands.rs
// version: 2.0.0
// guid: 4a9e2c7d-5b1f-4d83-9e06-c7f3a8b2d514

//! Command implementations
//!
//! Listings are rendered to strings first so their layout can be checked
//! without a terminal.

use crate::client::{RegistrationClient, RegistrationPayload};
use crate::config::Settings;
use crate::directory::{ServerDirectory, ServerRecord};
use crate::logging::logger::with_async_operation_span;
use crate::logs::{LogQuery, LogView, LoginLog};
use crate::network::executor::ProcessRunner;
use crate::network::ssh::SshClient;
use crate::provision::prompt::TerminalPrompter;
use crate::provision::{AddServerRequest, Orchestrator};
use crate::security::{fingerprint, KeyPair, RegistrationToken};
use crate::server::bootstrap::bootstrap_command;
use crate::server::Server;
use crate::ssh_config::{remove_block, ConfigStatus, RemoveOutcome};
use crate::users::{LocalUser, TargetUsers, UserRegistry};
use crate::utils::SystemUtils;
use crate::{KangarooError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// List every eligible user with the aliases in their config
pub fn users_command(settings: &Settings) -> Result<()> {
    let users = UserRegistry::from_settings(settings).list_local_users();
    print!("{}", render_users(&users));
    Ok(())
}

/// Aggregate aliases across users, or list the server directory
pub fn servers_command(settings: &Settings, records: bool) -> Result<()> {
    if records {
        let records = ServerDirectory::new(&settings.paths.servers_file).records()?;
        print!("{}", render_records(&records));
    } else {
        let users = UserRegistry::from_settings(settings).list_local_users();
        print!("{}", render_servers(&users));
    }
    Ok(())
}

/// Show one user's hosts and their directives
pub fn user_command(settings: &Settings, username: &str) -> Result<()> {
    match UserRegistry::from_settings(settings).find(username) {
        Some(user) => print!("{}", render_user(&user)),
        None => println!("User '{}' not found or has no SSH config.", username),
    }
    Ok(())
}

/// Show one alias across every user that has it
pub fn server_command(settings: &Settings, server_name: &str) -> Result<()> {
    let users = UserRegistry::from_settings(settings).list_local_users();
    print!("{}", render_server(&users, server_name));
    Ok(())
}

pub fn delete_server_command(settings: &Settings, username: &str, server_name: &str) -> Result<()> {
    let Some(user) = UserRegistry::from_settings(settings).find(username) else {
        println!("User '{}' not found or has no SSH config.", username);
        return Ok(());
    };

    match remove_block(&user.config_path(), server_name) {
        Ok(RemoveOutcome::Removed) => {
            println!("Removed '{}' from '{}' SSH config.", server_name, username)
        }
        Ok(RemoveOutcome::NotPresent) => {
            println!("Server '{}' not present in '{}' SSH config.", server_name, username)
        }
        Ok(RemoveOutcome::FileMissing) => {
            println!("No SSH config file found for '{}'.", username)
        }
        Err(e) => println!("Failed: {}", e),
    }
    Ok(())
}

pub fn delete_server_all_command(settings: &Settings, server_name: &str) -> Result<()> {
    let mut removed_any = false;

    for user in UserRegistry::from_settings(settings).list_local_users() {
        match remove_block(&user.config_path(), server_name) {
            Ok(outcome) if outcome.changed() => {
                println!("Removed '{}' from '{}'.", server_name, user.username);
                removed_any = true;
            }
            Ok(_) => {}
            Err(e) => println!("Failed for '{}': {}", user.username, e),
        }
    }

    if !removed_any {
        println!("No SSH config entries found for '{}'.", server_name);
    }
    Ok(())
}

/// Arguments of `add-server` as given on the command line
#[derive(Debug, Clone)]
pub struct AddServerArgs {
    pub name: String,
    pub ip: Option<String>,
    pub user: Option<String>,
    pub port: u16,
    pub password: Option<String>,
    pub description: Option<String>,
    pub users: Option<String>,
}

pub async fn add_server_command(settings: &Settings, args: AddServerArgs) -> Result<()> {
    let missing = SystemUtils::missing_prerequisites();
    if !missing.is_empty() {
        warn!("Missing tools: {}", missing.join(", "));
    }

    let request = AddServerRequest {
        name: args.name,
        ip: args.ip,
        ssh_user: args
            .user
            .unwrap_or_else(|| settings.provision.default_ssh_user.clone()),
        port: args.port,
        password: args.password,
        description: args.description,
        targets: args.users.as_deref().map(TargetUsers::parse),
    };

    let runner = Arc::new(ProcessRunner::new(Some(settings.provision.command_timeout())));
    let orchestrator = Orchestrator::new(settings, runner);

    let report = with_async_operation_span("add_server", || {
        orchestrator.add_server(request, &TerminalPrompter)
    })
    .await?;

    info!(
        "add-server finished: {} configured, {} skipped",
        report.configured.len(),
        report.skipped.len()
    );
    Ok(())
}

/// Load secrets, make sure the key pair exists, then serve until signalled
pub async fn serve_command(mut settings: Settings, bind: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(bind) = bind {
        settings.service.bind_address = bind;
    }
    if let Some(port) = port {
        settings.service.port = port;
    }

    let token = RegistrationToken::load_or_create(&settings.paths.token_path)?;

    let keys = KeyPair::new(&settings.paths.key_path);
    let runner = ProcessRunner::new(Some(settings.provision.command_timeout()));
    keys.ensure(&runner).await?;
    if let Some(public) = keys.read_public_key().await? {
        match fingerprint(&public) {
            Ok(fp) => info!("Serving public key {}", fp),
            Err(e) => warn!("Could not fingerprint public key: {}", e),
        }
    }

    info!(
        "Registration targets: {:?}",
        settings.registration.target_users
    );
    Server::new(&settings, token).run().await
}

pub fn bootstrap_command_command(settings: &Settings, address: Option<String>) -> Result<()> {
    let token = RegistrationToken::load_or_create(&settings.paths.token_path)?;
    let address = address
        .or_else(|| settings.service.advertised_address.clone())
        .or_else(SystemUtils::primary_ip)
        .unwrap_or_else(|| "127.0.0.1".to_string());

    println!(
        "{}",
        bootstrap_command(&address, settings.service.port, token.as_str())
    );
    Ok(())
}

pub async fn login_logs_command(settings: &Settings, query: LogQuery) -> Result<()> {
    let log = LoginLog::new(&settings.paths.login_log);

    let lines = match log.snapshot(&query) {
        Ok(LogView::Missing) => {
            println!("No logs yet.");
            return Ok(());
        }
        Ok(LogView::Lines(lines)) => lines,
        Err(KangarooError::ValidationError(msg)) => {
            eprintln!("{}", msg);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for line in &lines {
        println!("{}", line);
    }

    if query.follow {
        log.follow(&query, |line| println!("{}", line)).await?;
    }
    Ok(())
}

/// Arguments of `register`
#[derive(Debug, Clone)]
pub struct RegisterArgs {
    pub master: String,
    pub token: String,
    pub hostname: Option<String>,
    pub ip: String,
    pub ssh_port: u16,
    pub description: String,
}

pub async fn register_command(settings: &Settings, args: RegisterArgs) -> Result<()> {
    let client = RegistrationClient::new(&args.master, settings.service.request_timeout())?;
    let payload = RegistrationPayload {
        token: args.token,
        hostname: args.hostname.unwrap_or_else(SystemUtils::hostname),
        ip: args.ip,
        ssh_port: args.ssh_port,
        description: args.description,
    };

    let reply = client.register(&payload).await?;
    println!(
        "Registered {} ({}:{}) with {}",
        reply.server,
        reply.ip,
        reply.port,
        client.base_url()
    );
    Ok(())
}

/// Entry of the per-user `~/servers.yaml` allow list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllowedServer {
    pub name: String,
    pub user: String,
    pub host: String,
}

/// Outcome of looking up a `connect-to` target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    NotConfigured,
    Denied,
    Allowed(AllowedServer),
}

/// Find `target` in the allow list at `path`
pub fn find_allowed_server(path: &Path, target: &str) -> Result<ConnectTarget> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ConnectTarget::NotConfigured),
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(ConnectTarget::Denied);
    }

    let servers: Vec<AllowedServer> = serde_yaml::from_str(&content)?;
    Ok(servers
        .into_iter()
        .find(|s| s.name == target)
        .map_or(ConnectTarget::Denied, ConnectTarget::Allowed))
}

/// Returns the process exit code
pub async fn connect_to_command(target: &str) -> Result<i32> {
    let home = dirs::home_dir()
        .ok_or_else(|| KangarooError::system("cannot determine home directory"))?;
    let allow_list: PathBuf = home.join("servers.yaml");

    match find_allowed_server(&allow_list, target)? {
        ConnectTarget::NotConfigured => {
            println!("No servers configured.");
            Ok(1)
        }
        ConnectTarget::Denied => {
            println!("Access denied.");
            Ok(1)
        }
        ConnectTarget::Allowed(server) => {
            let ssh = SshClient::new(Arc::new(ProcessRunner::new(None)), home.join(".ssh/known_hosts"));
            ssh.interactive(&format!("{}@{}", server.user, server.host)).await
        }
    }
}

fn render_users(users: &[LocalUser]) -> String {
    let mut sorted: Vec<&LocalUser> = users.iter().collect();
    sorted.sort_by(|a, b| a.username.cmp(&b.username));

    let mut out = String::new();
    for user in sorted {
        let _ = writeln!(out, "User: {}", user.username);
        let hosts: BTreeSet<&str> = user.hosts().into_iter().collect();
        if hosts.is_empty() {
            let _ = writeln!(out, "  Servers: None");
        } else {
            let _ = writeln!(out, "  Servers:");
            for host in hosts {
                let _ = writeln!(out, "    - {}", host);
            }
        }
        out.push('\n');
    }
    out
}

fn render_servers(users: &[LocalUser]) -> String {
    let mut hostnames: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut members: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for user in users {
        let Some(file) = user.config.file() else {
            continue;
        };
        for alias in file.aliases() {
            let hostname = file
                .get(alias)
                .and_then(|b| b.host_name())
                .unwrap_or("(no HostName)");
            hostnames.entry(alias).or_default().insert(hostname);
            members.entry(alias).or_default().insert(user.username.as_str());
        }
    }

    let mut out = String::from("=== Servers ===\n\n");
    for (alias, names) in &hostnames {
        let count = members.get(alias).map_or(0, BTreeSet::len);
        let _ = writeln!(
            out,
            "{} ({} user{}): {}",
            alias,
            count,
            if count == 1 { "" } else { "s" },
            names.iter().copied().collect::<Vec<_>>().join(", ")
        );
    }
    out
}

fn render_records(records: &[ServerRecord]) -> String {
    if records.is_empty() {
        return "No servers recorded.\n".to_string();
    }
    let mut out = String::from("=== Server Directory ===\n\n");
    for record in records {
        let _ = writeln!(out, "{} {}", record.alias, record.ip);
    }
    out
}

fn render_user(user: &LocalUser) -> String {
    let mut out = format!("User: {}\n", user.username);

    if let ConfigStatus::Unreadable(err) = &user.config {
        let _ = writeln!(out, "  [Error: {}]", err);
        return out;
    }
    let Some(file) = user.config.file().filter(|f| !f.is_empty()) else {
        out.push_str("  No SSH servers configured.\n");
        return out;
    };

    let aliases: BTreeSet<&str> = file.aliases().into_iter().collect();
    for alias in aliases {
        let _ = writeln!(out, "  Server: {}", alias);
        if let Some(block) = file.get(alias) {
            for (key, value) in block.directives.sorted() {
                let _ = writeln!(out, "    {}: {}", key, value);
            }
        }
        out.push('\n');
    }
    out
}

fn render_server(users: &[LocalUser], server_name: &str) -> String {
    let mut out = String::new();
    for user in users {
        let Some(block) = user.config.file().and_then(|f| f.get(server_name)) else {
            continue;
        };
        let _ = writeln!(out, "User: {}", user.username);
        for (key, value) in block.directives.sorted() {
            let _ = writeln!(out, "  {}: {}", key, value);
        }
        out.push('\n');
    }

    if out.is_empty() {
        out = format!("No users found with server '{}'.\n", server_name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh_config::parse_str;
    use tempfile::TempDir;

    fn user(name: &str, config: &str) -> LocalUser {
        LocalUser {
            username: name.to_string(),
            uid: 1001,
            gid: 1001,
            home: PathBuf::from(format!("/home/{}", name)),
            config: ConfigStatus::Loaded(parse_str(config)),
        }
    }

    fn fleet() -> Vec<LocalUser> {
        vec![
            user("zoe", "Host web1\n  HostName 10.0.0.5\nHost db\n  HostName 10.0.0.9\n"),
            user("alice", "Host web1\n  HostName 10.0.0.6\n  Port 2222\n"),
            LocalUser {
                config: ConfigStatus::Missing,
                ..user("bob", "")
            },
        ]
    }

    #[test]
    fn test_render_users() {
        assert_eq!(
            render_users(&fleet()),
            "User: alice\n  Servers:\n    - web1\n\n\
             User: bob\n  Servers: None\n\n\
             User: zoe\n  Servers:\n    - db\n    - web1\n\n"
        );
    }

    #[test]
    fn test_render_servers_counts_users_and_hostnames() {
        assert_eq!(
            render_servers(&fleet()),
            "=== Servers ===\n\ndb (1 user): 10.0.0.9\nweb1 (2 users): 10.0.0.5, 10.0.0.6\n"
        );
    }

    #[test]
    fn test_render_user() {
        let fleet = fleet();
        assert_eq!(
            render_user(&fleet[1]),
            "User: alice\n  Server: web1\n    HostName: 10.0.0.6\n    Port: 2222\n\n"
        );
        assert_eq!(
            render_user(&fleet[2]),
            "User: bob\n  No SSH servers configured.\n"
        );

        let broken = LocalUser {
            config: ConfigStatus::Unreadable("Permission denied".to_string()),
            ..user("eve", "")
        };
        assert_eq!(render_user(&broken), "User: eve\n  [Error: Permission denied]\n");
    }

    #[test]
    fn test_render_server() {
        assert_eq!(
            render_server(&fleet(), "db"),
            "User: zoe\n  HostName: 10.0.0.9\n\n"
        );
        assert_eq!(
            render_server(&fleet(), "nope"),
            "No users found with server 'nope'.\n"
        );
    }

    #[test]
    fn test_render_records_keeps_duplicates() {
        let records = vec![
            ServerRecord::new("web1", "10.0.0.5"),
            ServerRecord::new("web1", "10.0.0.7"),
        ];
        assert_eq!(
            render_records(&records),
            "=== Server Directory ===\n\nweb1 10.0.0.5\nweb1 10.0.0.7\n"
        );
        assert_eq!(render_records(&[]), "No servers recorded.\n");
    }

    #[test]
    fn test_find_allowed_server() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.yaml");

        assert_eq!(find_allowed_server(&path, "web1")?, ConnectTarget::NotConfigured);

        std::fs::write(&path, "- name: web1\n  user: kangaroo\n  host: 10.0.0.5\n")?;
        assert_eq!(
            find_allowed_server(&path, "web1")?,
            ConnectTarget::Allowed(AllowedServer {
                name: "web1".into(),
                user: "kangaroo".into(),
                host: "10.0.0.5".into(),
            })
        );
        assert_eq!(find_allowed_server(&path, "db")?, ConnectTarget::Denied);

        std::fs::write(&path, "")?;
        assert_eq!(find_allowed_server(&path, "web1")?, ConnectTarget::Denied);
        Ok(())
    }
}
