// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hireloop - terminal client for job-marketplace chat.
//!
//! This is the binary entry point. It loads configuration, reads the login
//! session and drives the chat and unread clients from the terminal.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod chat;
mod credentials;
mod shutdown;
mod unread;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hireloop_config::HireloopConfig;
use hireloop_core::{HireloopError, JobId, UserId};

/// Hireloop - terminal client for job-marketplace chat.
#[derive(Parser, Debug)]
#[command(name = "hireloop", version, about, long_about = None)]
struct Cli {
    /// Session file with the login tokens.
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with another user about a job.
    Chat {
        /// Job the conversation is about.
        #[arg(long)]
        job: u64,
        /// User on the other side.
        #[arg(long = "with")]
        with_user: u64,
    },
    /// Follow unread message and notification counts.
    Unread,
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match hireloop_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            hireloop_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    if let Err(e) = run(cli, config).await {
        eprintln!("hireloop: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: HireloopConfig) -> Result<(), HireloopError> {
    match cli.command {
        Some(Commands::Chat { job, with_user }) => {
            let wiring = connect(&config, cli.session)?;
            let cancel = shutdown::install_signal_handler();
            chat::run_chat(wiring, JobId(job), UserId(with_user), cancel).await
        }
        Some(Commands::Unread) => {
            let wiring = connect(&config, cli.session)?;
            let cancel = shutdown::install_signal_handler();
            unread::run_unread(&config, wiring, cancel).await
        }
        Some(Commands::Config) => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| HireloopError::Config(format!("failed to render config: {e}")))?;
            print!("{rendered}");
            Ok(())
        }
        None => {
            println!("hireloop: use --help for available commands");
            Ok(())
        }
    }
}

fn connect(
    config: &HireloopConfig,
    session: Option<PathBuf>,
) -> Result<credentials::Wiring, HireloopError> {
    let path = session
        .or_else(credentials::default_session_path)
        .ok_or_else(|| {
            HireloopError::Config("no session file; pass --session <path>".to_string())
        })?;
    let session = credentials::load_session(&path)?;
    credentials::wire(config, &session)
}

/// Log to stderr so stdout stays clean for the transcript.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hireloop={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
