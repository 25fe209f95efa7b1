// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - persistence and synchronization core of a secure messenger client.
//!
//! The binary inspects and maintains a store: pending operation counts,
//! scheduled self-destructs, and a long-running self-destruct sweeper.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod run;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use courier_config::model::CourierConfig;
use courier_core::OperationTag;

/// Courier store maintenance.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    /// Explicit config file instead of the XDG and local lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `logging.log_level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show pending operations, unread conversations and scheduled deletions.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List the pending entries of one operation tag.
    Pending {
        /// Operation tag, e.g. `secret_outgoing`.
        tag: OperationTag,
    },
    /// Delete every message whose self-destruct time has passed, once.
    Sweep,
    /// Run the self-destruct sweeper until interrupted.
    Run,
}

fn load_config(cli: &Cli) -> CourierConfig {
    let loaded = match &cli.config {
        Some(path) => courier_config::load_and_validate_path(path),
        None => courier_config::load_and_validate(),
    };
    match loaded {
        Ok(mut config) => {
            if let Some(level) = &cli.log_level {
                config.logging.log_level = level.clone();
            }
            config
        }
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(&cli);
    run::init_tracing(&config.logging.log_level);

    let result = match cli.command {
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        Some(Commands::Pending { tag }) => status::run_pending(&config, tag).await,
        Some(Commands::Sweep) => run::run_sweep(&config).await,
        Some(Commands::Run) => run::run_sweeper(config).await,
        None => {
            println!("courier: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("courier: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        assert!(stats::allocated::read().unwrap() > 0);
    }

    #[test]
    fn parses_pending_tag() {
        let cli = Cli::try_parse_from(["courier", "pending", "synchronize_pinned_chats"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Pending {
                tag: OperationTag::SynchronizePinnedChats
            })
        ));
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!(Cli::try_parse_from(["courier", "pending", "bogus"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["courier", "status", "--json", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Some(Commands::Status { json: true })));
    }
}
