// file: src/cli/args.rs
// version: 2.0.0
// guid: 1c6d8f3e-a2b4-4e97-b0c5-83f1e9d7a246

//! Command line argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kangaroo")]
#[command(about = "Kangaroo SSH jump server: shared jump account provisioning and host management")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (defaults to /etc/kangaroo/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all SSH users
    Users,

    /// List all hosts and how many users have access
    Servers {
        /// List the server directory instead
        #[arg(long)]
        records: bool,
    },

    /// Show SSH servers and config for a user
    User { username: String },

    /// Show SSH config for a server across all users
    Server { server_name: String },

    /// Delete a server from one user's SSH config
    DeleteServer {
        username: String,
        server_name: String,
    },

    /// Delete a server from all users' SSH configs
    DeleteServerAll { server_name: String },

    /// Add a new server and configure SSH access for users
    AddServer {
        /// Server alias (e.g. webserver1)
        #[arg(long)]
        name: String,

        /// Server IP address; resolved from the name when omitted
        #[arg(long)]
        ip: Option<String>,

        /// SSH username on the server
        #[arg(long)]
        user: Option<String>,

        #[arg(long, default_value_t = 22)]
        port: u16,

        /// SSH password; prompts for an authentication method when omitted
        #[arg(long)]
        password: Option<String>,

        /// Human-readable description
        #[arg(long)]
        description: Option<String>,

        /// Comma-separated usernames (or 'all')
        #[arg(long)]
        users: Option<String>,
    },

    /// Run the registration service
    Serve {
        #[arg(long)]
        bind: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the one-line slave bootstrap command
    BootstrapCommand {
        /// Address slaves use to reach this master
        #[arg(long)]
        address: Option<String>,
    },

    /// Show SSH login logs
    LoginLogs {
        /// Show first lines instead of last
        #[arg(long)]
        head: bool,

        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,

        /// Follow log output (like tail -f)
        #[arg(short, long)]
        follow: bool,

        /// Filter by username, IP, or action
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Register this host with a master (slave side)
    Register {
        /// Master address, host:port or URL
        #[arg(long)]
        master: String,

        #[arg(long)]
        token: String,

        /// Defaults to the local host name
        #[arg(long)]
        hostname: Option<String>,

        #[arg(long)]
        ip: String,

        #[arg(long, default_value_t = 22)]
        ssh_port: u16,

        #[arg(long, default_value = "self-registered")]
        description: String,
    },

    /// Connect to a server listed in ~/servers.yaml
    ConnectTo { target: String },
}

impl Commands {
    /// Everything except `connect-to` manages system state and needs root
    pub fn requires_root(&self) -> bool {
        !matches!(self, Commands::ConnectTo { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_server_args() {
        let cli = Cli::try_parse_from([
            "kangaroo", "add-server", "--name", "web1", "--ip", "10.0.0.5", "--users", "alice,bob",
        ])
        .unwrap();

        match cli.command {
            Commands::AddServer {
                name, ip, port, users, ..
            } => {
                assert_eq!(name, "web1");
                assert_eq!(ip.as_deref(), Some("10.0.0.5"));
                assert_eq!(port, 22);
                assert_eq!(users.as_deref(), Some("alice,bob"));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_root_requirement() {
        let cli = Cli::try_parse_from(["kangaroo", "connect-to", "web1"]).unwrap();
        assert!(!cli.command.requires_root());

        let cli = Cli::try_parse_from(["kangaroo", "-v", "users"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.command.requires_root());
    }

    #[test]
    fn test_login_logs_defaults() {
        let cli = Cli::try_parse_from(["kangaroo", "login-logs", "--search", "alice"]).unwrap();
        match cli.command {
            Commands::LoginLogs {
                head,
                lines,
                follow,
                search,
            } => {
                assert!(!head && !follow);
                assert_eq!(lines, 10);
                assert_eq!(search.as_deref(), Some("alice"));
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
