// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FluxBot - multi-device WhatsApp bot backend.
//!
//! This is the binary entry point for the FluxBot API server.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod config_cmd;
mod doctor;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fluxbot_config::FluxbotConfig;

/// FluxBot - multi-device WhatsApp bot backend.
#[derive(Parser, Debug)]
#[command(name = "fluxbot", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the default search path.
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the API server.
    Serve,
    /// Print the effective configuration with secrets redacted.
    Config,
    /// Check the database, bridge, and credentials.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<FluxbotConfig, Vec<fluxbot_config::ConfigError>> {
    match path {
        Some(path) => fluxbot_config::load_and_validate_path(path),
        None => fluxbot_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            fluxbot_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Config) => config_cmd::run_config(&config),
        Some(Commands::Doctor { plain }) => doctor::run_doctor(&config, plain).await,
        None => {
            println!("fluxbot: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["fluxbot", "serve"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Serve)));

        let cli = Cli::try_parse_from(["fluxbot", "doctor", "--plain"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Doctor { plain: true })));

        let cli = Cli::try_parse_from(["fluxbot", "config", "--config", "/tmp/f.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Config)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["fluxbot", "shell"]).is_err());
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluxbot.toml");
        std::fs::write(&path, "[server]\nport = 4100\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 4100);
    }
}
