// file: src/main.rs
// version: 2.1.0
// guid: 9b3e6d14-c852-4a7f-b1e0-2d7a5f8c3e96

//! Kangaroo - Main entry point

use clap::Parser;
use kangaroo::{
    cli::{
        args::{Cli, Commands},
        commands::*,
    },
    config::{ConfigLoader, Settings},
    logging::logger,
    logs::LogQuery,
    ssh_config::lock,
    utils::SystemUtils,
    Result,
};
use tokio::signal;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = if matches!(cli.command, Commands::Serve { .. }) {
        logger::init_service_logger(cli.verbose)
    } else {
        logger::init_logger(cli.verbose, cli.quiet)
    };
    if let Err(e) = logging {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if cli.command.requires_root() && !SystemUtils::is_root() {
        eprintln!("Run as root");
        std::process::exit(1);
    }

    let shutdown_signal = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        warn!("Received Ctrl+C, initiating shutdown...");
    };

    let serving = matches!(cli.command, Commands::Serve { .. });
    let command_future = run(cli);

    // The service installs its own graceful shutdown handler
    let result = if serving {
        command_future.await
    } else {
        tokio::select! {
            result = command_future => result,
            _ = shutdown_signal => {
                warn!("Interrupted by user");
                std::process::exit(130);
            }
        }
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if e.is_external_command_failure() {
                error!("External command failed; no changes were rolled back");
            }
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let Cli {
        command, config, ..
    } = cli;
    let settings = || -> Result<Settings> {
        let settings = ConfigLoader::new().load(config.as_deref())?;
        lock::set_lock_dir(settings.paths.lock_dir.clone());
        Ok(settings)
    };

    match command {
        Commands::ConnectTo { target } => return connect_to_command(&target).await,
        Commands::Users => users_command(&settings()?)?,
        Commands::Servers { records } => servers_command(&settings()?, records)?,
        Commands::User { username } => user_command(&settings()?, &username)?,
        Commands::Server { server_name } => server_command(&settings()?, &server_name)?,
        Commands::DeleteServer {
            username,
            server_name,
        } => delete_server_command(&settings()?, &username, &server_name)?,
        Commands::DeleteServerAll { server_name } => {
            delete_server_all_command(&settings()?, &server_name)?
        }
        Commands::AddServer {
            name,
            ip,
            user,
            port,
            password,
            description,
            users,
        } => {
            add_server_command(
                &settings()?,
                AddServerArgs {
                    name,
                    ip,
                    user,
                    port,
                    password,
                    description,
                    users,
                },
            )
            .await?
        }
        Commands::Serve { bind, port } => serve_command(settings()?, bind, port).await?,
        Commands::BootstrapCommand { address } => bootstrap_command_command(&settings()?, address)?,
        Commands::LoginLogs {
            head,
            lines,
            follow,
            search,
        } => {
            login_logs_command(
                &settings()?,
                LogQuery {
                    head,
                    lines,
                    follow,
                    search,
                },
            )
            .await?
        }
        Commands::Register {
            master,
            token,
            hostname,
            ip,
            ssh_port,
            description,
        } => {
            register_command(
                &settings()?,
                RegisterArgs {
                    master,
                    token,
                    hostname,
                    ip,
                    ssh_port,
                    description,
                },
            )
            .await?
        }
    }

    Ok(0)
}
