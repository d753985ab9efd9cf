//! eventrelay: talk to an event broker over its Unix socket.
//!
//! # Usage
//!
//! ```text
//! eventrelay trigger <NAME>... [--payload <JSON>]... [--request-id <ID>]
//! eventrelay wait <NAME>... [--timeout <SECS>]
//! eventrelay watch <NAME>... [--count <N>]
//! ```
//!
//! The broker socket comes from `--socket` or `EVENTRELAY_SOCKET`.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{trigger::TriggerArgs, wait::WaitArgs, watch::WatchArgs};
use eventrelay_socket::{SocketEventService, SOCKET_ENV};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "eventrelay",
    version,
    about = "Trigger and receive events through a long-polling event broker",
    long_about = None,
)]
struct Cli {
    /// Path of the broker's Unix socket.
    #[arg(long, global = true, env = SOCKET_ENV, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send events to the broker and print the ones it accepted.
    Trigger(TriggerArgs),

    /// Open a session, long-poll once, and print what arrives.
    Wait(WaitArgs),

    /// Relay events through a local observer until interrupted.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let socket = cli
        .socket
        .with_context(|| format!("no broker socket given; pass --socket or set {SOCKET_ENV}"))?;
    let service = SocketEventService::new(socket);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Trigger(args) => args.run(&service).await,
            Commands::Wait(args) => args.run(&service).await,
            Commands::Watch(args) => args.run(service).await,
        }
    })
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
