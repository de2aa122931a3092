//! Entry point for `drtp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, exit codes).

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};

use drtp::server::{Server, ServerConfig};

/// Reliable file transfer over UDP (Go-Back-N).
#[derive(Parser)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["server", "client"])))]
struct Cli {
    /// Run in server mode.
    #[arg(short, long)]
    server: bool,

    /// Run in client mode.
    #[arg(short, long)]
    client: bool,

    /// Server IP address (IPv4 or IPv6).
    #[arg(short, long, default_value = "10.0.1.2")]
    ip: IpAddr,

    /// Server port number.
    #[arg(short, long, default_value_t = 8088, value_parser = clap::value_parser!(u16).range(1025..))]
    port: u16,

    /// File to transfer (client mode).
    #[arg(short, long, required_if_eq("client", "true"))]
    file: Option<PathBuf>,

    /// Window size to propose (client mode).
    #[arg(short, long, default_value_t = drtp::client::DEFAULT_PROPOSED_WINDOW,
          value_parser = clap::value_parser!(u16).range(1..))]
    window: u16,

    /// Drop the packet with this sequence number once (server mode).
    #[arg(short, long)]
    discard: Option<u16>,

    /// Where to write the received file (server mode).
    #[arg(short, long, default_value = drtp::server::DEFAULT_OUTPUT)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG controls verbosity; transfer events are logged at info.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Could not run. Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.server {
        let mut config = ServerConfig::new((cli.ip, cli.port).into());
        config.discard = cli.discard;
        config.output = cli.output;

        let report = Server::bind(config)
            .await
            .with_context(|| format!("binding {}:{}", cli.ip, cli.port))?
            .serve()
            .await?;
        log::info!(
            "{} packet(s) written to {}",
            report.packets,
            report.output.display()
        );
    } else {
        let file = cli.file.context("client mode needs --file")?;
        let report = drtp::run_client(cli.ip, cli.port, file, cli.window).await?;
        if !report.closed_cleanly {
            log::warn!("server did not confirm teardown");
        }
    }
    Ok(())
}
