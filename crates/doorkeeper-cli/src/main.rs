//! # doorkeeper
//!
//! Networked controller for motor-driven doors.
//!
//! `doorkeeper serve` runs the controller: it loads `doorkeeper.toml`,
//! claims the GPIO pins (or simulates the mechanisms) and listens for line
//! commands. The other subcommands are clients of a running controller.
//!
//! ```text
//! doorkeeper serve --simulate
//! doorkeeper status
//! doorkeeper open A
//! doorkeeper close A --no-wait
//! doorkeeper calibrate A
//! ```

mod config;
mod remote;
mod serve;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doorkeeper_core::DoorId;
use doorkeeper_core::constants::DEFAULT_CLIENT_TIMEOUT_MS;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "doorkeeper", version, about = "Networked motor door controller")]
struct Cli {
    /// Configuration file [default: ./doorkeeper.toml if present]
    #[arg(short, long, global = true, env = "DOORKEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the configured filter
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller
    Serve {
        /// Drive simulated mechanisms instead of GPIO
        #[arg(long)]
        simulate: bool,
    },
    /// Show the state of all doors, or of one
    Status {
        door: Option<DoorId>,
        #[command(flatten)]
        endpoint: RemoteArgs,
    },
    /// Open a door and wait until it is open
    Open {
        door: DoorId,
        /// Return as soon as the command is accepted
        #[arg(long)]
        no_wait: bool,
        #[command(flatten)]
        endpoint: RemoteArgs,
    },
    /// Close a door and wait until it is closed
    Close {
        door: DoorId,
        /// Return as soon as the command is accepted
        #[arg(long)]
        no_wait: bool,
        #[command(flatten)]
        endpoint: RemoteArgs,
    },
    /// Open then close a door and print how long each motion took
    Calibrate {
        door: DoorId,
        #[command(flatten)]
        endpoint: RemoteArgs,
    },
}

#[derive(Args, Debug)]
struct RemoteArgs {
    /// Controller address [default: from configuration]
    #[arg(long, env = "DOORKEEPER_ADDR")]
    addr: Option<SocketAddr>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_CLIENT_TIMEOUT_MS)]
    timeout_ms: u64,
}

impl RemoteArgs {
    async fn connect(&self, config: &Config) -> Result<doorkeeper_network::DoorClient> {
        let addr = match self.addr {
            Some(addr) => addr,
            None => config.client_addr()?,
        };
        remote::connect(addr, Duration::from_millis(self.timeout_ms)).await
    }
}

fn init_logging(filter: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(filter).unwrap_or_else(|err| {
            eprintln!("invalid log filter {filter:?} ({err}), using info");
            EnvFilter::new("info")
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    init_logging(&config.logging.filter, cli.verbose);

    match cli.command {
        Commands::Serve { simulate } => serve::run(&config, simulate).await,
        Commands::Status { door, endpoint } => {
            let mut client = endpoint.connect(&config).await?;
            remote::status(&mut client, door).await?;
            client.disconnect().await?;
            Ok(())
        }
        Commands::Open {
            door,
            no_wait,
            endpoint,
        } => {
            let mut client = endpoint.connect(&config).await?;
            remote::open(&mut client, &door, !no_wait).await?;
            client.disconnect().await?;
            Ok(())
        }
        Commands::Close {
            door,
            no_wait,
            endpoint,
        } => {
            let mut client = endpoint.connect(&config).await?;
            remote::close(&mut client, &door, !no_wait).await?;
            client.disconnect().await?;
            Ok(())
        }
        Commands::Calibrate { door, endpoint } => {
            let mut client = endpoint.connect(&config).await?;
            remote::calibrate(&mut client, &door).await?;
            client.disconnect().await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_open_with_flags() {
        let cli = Cli::try_parse_from([
            "doorkeeper",
            "open",
            "B",
            "--no-wait",
            "--addr",
            "127.0.0.1:9000",
        ])
        .unwrap();
        match cli.command {
            Commands::Open {
                door,
                no_wait,
                endpoint,
            } => {
                assert_eq!(door.as_str(), "B");
                assert!(no_wait);
                assert_eq!(endpoint.addr, Some("127.0.0.1:9000".parse().unwrap()));
                assert_eq!(endpoint.timeout_ms, 3000);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_invalid_door_id() {
        assert!(Cli::try_parse_from(["doorkeeper", "open", "door-1"]).is_err());
    }

    #[test]
    fn test_serve_simulate_and_global_config() {
        let cli =
            Cli::try_parse_from(["doorkeeper", "serve", "--simulate", "-c", "lab.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { simulate: true }));
        assert_eq!(cli.config, Some(PathBuf::from("lab.toml")));
    }
}
