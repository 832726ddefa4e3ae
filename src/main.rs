mod config;
mod errors;
mod models;
mod services;
mod shell;
#[cfg(all(test, unix))]
mod sftp;
mod utils;

use crate::config::settings::Settings;
use crate::services::file_transfer::FileTransfer;
use crate::services::prompt::Prompter;
use crate::shell::Shell;
use crate::utils::logger::init_logging;
use anyhow::Context;
use clap::Parser;
use std::io;
use tracing::info;

/// Transfer files to and from a remote machine over SFTP
#[derive(Debug, Parser)]
#[command(name = "jtransfer", version)]
struct Cli {
    /// Extra configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Server as host or host:port
    #[arg(short, long)]
    server: Option<String>,

    #[arg(short, long)]
    user: Option<String>,

    /// Port used when the server has none
    #[arg(short, long)]
    port: Option<u16>,

    /// Start the shell without connecting
    #[arg(long)]
    no_connect: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(server) = &self.server {
            settings.connection.server = Some(server.clone());
        }
        if let Some(user) = &self.user {
            settings.connection.username = Some(user.clone());
        }
        if let Some(port) = self.port {
            settings.connection.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut settings = Settings::new(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut settings);

    info!("Starting jtransfer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut transfer = FileTransfer::new(settings.clone());
    let mut input = io::stdin().lock();
    let mut output = io::stdout();

    if !cli.no_connect {
        let mut prompter = Prompter::new(&mut input, &mut output);
        transfer
            .collect_credentials(&mut prompter)
            .context("Failed to read credentials")?;
        transfer
            .establish_connection()
            .await
            .context("Failed to connect")?;
    }

    let mut shell = Shell::new(transfer, &settings.shell, input, output);
    shell.run().await?;

    info!("Session closed");
    Ok(())
}
