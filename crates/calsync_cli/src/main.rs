//! calsync CLI
//!
//! Command-line tools for exercising calsync components.
//!
//! # Commands
//!
//! - `hash` - Compute the content hash of an event file
//! - `resolve` - Resolve a local/server event pair with a strategy
//! - `contend` - Run concurrent workers against one event lock
//! - `poll` - Run sync passes against an event file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// calsync command-line tools.
#[derive(Parser)]
#[command(name = "calsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the content hash of a JSON event list
    Hash {
        /// Path to a JSON array of events
        file: PathBuf,
    },

    /// Resolve a conflict between a local and a server copy
    Resolve {
        /// Path to the local copy (JSON object)
        #[arg(long)]
        local: PathBuf,

        /// Path to the server copy (JSON object)
        #[arg(long)]
        server: PathBuf,

        /// Strategy (server_wins, client_wins, merge, ask_user)
        #[arg(short, long, default_value = "server_wins")]
        strategy: String,
    },

    /// Run concurrent workers that edit the same event under its lock
    Contend {
        /// Number of concurrent workers
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// How long each worker holds the lock, in milliseconds
        #[arg(long, default_value = "50")]
        hold_ms: u64,

        /// Lock acquisition timeout, in milliseconds
        #[arg(long, default_value = "10000")]
        timeout_ms: u64,

        /// User owning the event
        #[arg(long, default_value = "demo-user")]
        user: String,

        /// Event being edited
        #[arg(long, default_value = "ev1")]
        event: String,
    },

    /// Run sync passes against a JSON event file
    Poll {
        /// Path to a JSON array of events, re-read on every pass
        file: PathBuf,

        /// Delay between passes, in milliseconds
        #[arg(short, long, default_value = "30000")]
        interval_ms: u64,

        /// Number of passes to run
        #[arg(short, long, default_value = "3")]
        passes: usize,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Hash { file } => commands::hash::run(&file, &cli.format)?,
        Commands::Resolve {
            local,
            server,
            strategy,
        } => commands::resolve::run(&local, &server, &strategy, &cli.format)?,
        Commands::Contend {
            workers,
            hold_ms,
            timeout_ms,
            user,
            event,
        } => {
            let options = commands::contend::ContendOptions {
                workers,
                hold_ms,
                timeout_ms,
                user,
                event,
            };
            commands::contend::run(options, &cli.format).await?;
        }
        Commands::Poll {
            file,
            interval_ms,
            passes,
        } => commands::poll::run(&file, interval_ms, passes, &cli.format).await?,
        Commands::Version => {
            println!("calsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
