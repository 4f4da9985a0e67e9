// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Livedesk - live contact-center state monitor.
//!
//! This is the binary entry point.

mod plan;
mod serve;
mod shutdown;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use livedesk_config::{ConfigError, LivedeskConfig};

/// Livedesk - live contact-center state monitor.
#[derive(Parser, Debug)]
#[command(name = "livedesk", version, about, long_about = None)]
struct Cli {
    /// Load this file instead of the standard config hierarchy.
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror the configured users and queues until interrupted.
    Serve {
        /// Rewrite this file with Prometheus text after every refresh.
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },
    /// Print the channel shard plan for the watch set.
    Plan,
    /// Validate configuration and print a summary.
    Check,
}

fn load(path: Option<&PathBuf>) -> Result<LivedeskConfig, Vec<ConfigError>> {
    match path {
        Some(path) => livedesk_config::load_and_validate_path(path),
        None => livedesk_config::load_and_validate(),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("livedesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            livedesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve { metrics_file }) => {
            init_tracing(&config.logging.level);
            let options = serve::ServeOptions { metrics_file };
            if let Err(e) = serve::run_serve(config, options).await {
                eprintln!("livedesk: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Plan) => print!("{}", plan::plan_report(&config)),
        Some(Commands::Check) => print!("{}", plan::check_report(&config)),
        None => {
            println!("livedesk: use --help for available commands");
        }
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
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["livedesk", "serve", "--metrics-file", "/tmp/m.prom"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Serve { metrics_file: Some(ref p) }) if p == &PathBuf::from("/tmp/m.prom")
        ));

        let cli = Cli::try_parse_from(["livedesk", "plan", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Plan)));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }

    #[test]
    fn default_config_is_valid() {
        let config = livedesk_config::load_and_validate_str("").expect("defaults should validate");
        assert_eq!(config.platform.org_id, "default");
    }
}
