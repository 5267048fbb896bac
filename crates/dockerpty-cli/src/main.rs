//! dockerpty — interactive terminal sessions for Docker containers.
//!
//! Puts the local terminal into raw mode, relays it to a container or an
//! exec instance, and keeps the remote tty size in sync.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use dockerpty_engine::DockerEngine;

/// dockerpty — attach your terminal to a container
#[derive(Parser)]
#[command(name = "dockerpty", version, about = "Interactive terminal sessions for Docker containers")]
struct Cli {
    /// Engine address (unix:///path or tcp://host:port)
    #[arg(short = 'H', long = "host", global = true)]
    host: Option<String>,

    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attach to a created container, start it, and stay attached until it exits
    Start {
        /// Container name or ID
        container: String,
    },

    /// Run a command in a running container
    Exec {
        /// Do not allocate a tty for the command
        #[arg(long = "no-tty")]
        no_tty: bool,

        /// Container name or ID
        container: String,

        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so relayed stdout stays untouched.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("dockerpty=debug,dockerpty_cli=debug,dockerpty_engine=debug")
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("warn")
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("dockerpty: {e:#}");
            1
        }
    };
    // The stdin reader may still be blocked in a read; exit without waiting on it.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let cfg = config::Config::load(&config_path)?;

    let engine = DockerEngine::new(&cfg.engine_config(cli.host.as_deref()))?;
    let options = cfg.session_options()?;

    match cli.command {
        Command::Start { container } => commands::start::run(engine, &container, options).await,
        Command::Exec {
            no_tty,
            container,
            command,
        } => commands::exec::run(engine, &container, &command, !no_tty, options).await,
    }
}
