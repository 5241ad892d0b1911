//! softapd: run an access-point session against the simulated radio
//!
//! Brings a session up, prints every status change and client presence
//! update, and tears the session down on Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use softap_infra_common::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
use softap_session_core::prelude::*;
use softap_session_core::sim::SimulatedRadio;
use tokio_stream::StreamExt;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "softapd")]
#[command(about = "Access-point session coordinator", version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "SOFTAP_LOG_LEVEL", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log open and close of the session start span
    #[arg(long, global = true)]
    log_spans: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bring an access point up and keep it running until Ctrl-C
    Run(RunArgs),
    /// Parse a coordinator configuration file and print the effective settings
    CheckConfig {
        /// Path to a TOML coordinator configuration
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Coordinator configuration file (TOML)
    #[arg(short, long, env = "SOFTAP_CONFIG")]
    config: Option<PathBuf>,

    /// Network name
    #[arg(short, long)]
    ssid: String,

    /// WPA2 passphrase; an open network is created without one
    #[arg(short, long, env = "SOFTAP_PASSPHRASE")]
    passphrase: Option<String>,

    #[arg(short, long, value_enum, default_value = "2ghz")]
    band: BandArg,

    /// Fixed channel; 0 lets the channel policy choose
    #[arg(long, default_value = "0")]
    channel: u16,

    /// Do not broadcast the SSID
    #[arg(long)]
    hidden: bool,

    /// Lease database used to resolve client names
    #[arg(long)]
    lease_file: Option<PathBuf>,

    /// Interface name reported by the simulated radio
    #[arg(long, default_value = "wlan0")]
    interface: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BandArg {
    #[value(name = "2ghz")]
    TwoGhz,
    #[value(name = "5ghz")]
    FiveGhz,
    Any,
}

impl From<BandArg> for Band {
    fn from(arg: BandArg) -> Self {
        match arg {
            BandArg::TwoGhz => Band::TwoGhz,
            BandArg::FiveGhz => Band::FiveGhz,
            BandArg::Any => Band::Any,
        }
    }
}

/// Prints the connected-device count whenever it changes
struct ConsoleNotifier;

impl PresenceNotifier for ConsoleNotifier {
    fn presence_changed(&self, connected_devices: usize) {
        info!(connected_devices, "client presence changed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&args.log_level)?, "softapd");
    if args.json {
        logging = logging.with_json();
    }
    if args.log_spans {
        logging = logging.with_spans();
    }
    if logging.is_verbose() {
        logging = logging.with_file_info();
    }
    setup_logging(logging.clone())?;
    log_welcome(&logging, env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Run(run_args) => run(run_args).await,
        Command::CheckConfig { path } => check_config(path),
    }
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = CoordinatorConfig::from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn load_config(args: &RunArgs) -> Result<CoordinatorConfig> {
    let mut config = match &args.config {
        Some(path) => CoordinatorConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CoordinatorConfig::default(),
    };
    if let Some(lease_file) = &args.lease_file {
        config = config.with_lease_file(lease_file);
    }
    Ok(config)
}

fn session_config(args: &RunArgs) -> SessionConfig {
    let mut session = SessionConfig::new(args.ssid.clone())
        .with_band(args.band.into())
        .with_channel(args.channel)
        .with_hidden(args.hidden);
    if let Some(passphrase) = &args.passphrase {
        session = session.with_security(AuthMode::Wpa2Psk, passphrase.clone());
    }
    session
}

async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let session = session_config(&args);

    let radio = Arc::new(SimulatedRadio::new(args.interface.clone()));
    let coordinator = SessionCoordinator::builder()
        .with_config(config)
        .with_radio(radio)
        .with_presence_notifier(Arc::new(ConsoleNotifier))
        .build()?;

    let mut events = coordinator.event_stream();
    coordinator.request_enable(&session)?;
    info!(ssid = %session.ssid, "enable requested, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            event = events.next() => match event {
                Some(Ok(change)) => {
                    println!("{}", serde_json::to_string(&change)?);
                    if change.new_state == SessionState::Failed {
                        warn!(reason = ?change.failure_reason, "session failed");
                        break;
                    }
                }
                Some(Err(lagged)) => warn!("status stream lagged: {}", lagged),
                None => break,
            },
        }
    }

    tokio::time::timeout(Duration::from_secs(5), coordinator.shutdown())
        .await
        .context("coordinator did not stop in time")??;

    let stats = coordinator.stats();
    info!(
        enable_requests = stats.enable_requests,
        starts_succeeded = stats.starts_succeeded,
        teardowns = stats.teardowns,
        "done"
    );
    Ok(())
}
