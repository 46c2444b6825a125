//! # rtsub Receiver
//!
//! Real-time subscriber process. Loads `receiver.toml` (defaults when the
//! file is absent), requests `SCHED_FIFO`, subscribes the local port to
//! the remote publisher and consumes messages until SIGINT/SIGTERM.
//!
//! Exit codes: 0 clean shutdown, 1 config/startup, 2 scheduling denied,
//! 3 channel open failed, 4 connection failed, 5 receive failed.

use clap::Parser;
use rtsub_common::config::{ConfigError, ConfigLoader, LogLevel};
use rtsub_common::consts::DEFAULT_CONFIG_PATH;
use rtsub_common::port::PortName;
use rtsub_common::receiver::config::ReceiverConfig;
use rtsub_receiver::error::EXIT_OK;
use rtsub_receiver::{PosixScheduler, ReceiverError, Runner};
use rtsub_transport::UdpNetwork;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, trace, warn};
use tracing_subscriber::EnvFilter;

/// rtsub Receiver: real-time subscriber
#[derive(Parser, Debug)]
#[command(name = "rtsub_receiver")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Real-time subscriber: SCHED_FIFO plus a subscribe-and-consume loop")]
struct Args {
    /// Path to the receiver configuration TOML.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Local inbound port name (overrides [subscription] local_port).
    #[arg(long, value_name = "PORT")]
    local: Option<PortName>,

    /// Remote publisher port name (overrides [subscription] remote_port).
    #[arg(long, value_name = "PORT")]
    remote: Option<PortName>,

    /// Naming registry directory (overrides [network] registry_dir).
    #[arg(long, value_name = "DIR")]
    registry_dir: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let loaded = load_config(&args);
    let level = loaded
        .as_ref()
        .map_or(LogLevel::default(), |(config, _)| config.shared.log_level);
    setup_tracing(&args, level);

    info!("rtsub receiver v{} starting...", env!("CARGO_PKG_VERSION"));

    let code = match loaded.map_err(ReceiverError::from).and_then(|(config, from_file)| {
        if !from_file {
            info!("No config at {}, using defaults", args.config.display());
        }
        run(&config)
    }) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            error!("FATAL: {e}");
            e.exit_code()
        }
    };

    info!("rtsub receiver shutdown complete");
    process::exit(code);
}

/// Load, override and validate the configuration.
///
/// Returns the config and whether it came from a file.
fn load_config(args: &Args) -> Result<(ReceiverConfig, bool), ConfigError> {
    let (mut config, from_file) = match ReceiverConfig::load(&args.config) {
        Ok(config) => (config, true),
        Err(ConfigError::FileNotFound) => (ReceiverConfig::default(), false),
        Err(e) => return Err(e),
    };

    if let Some(local) = &args.local {
        config.subscription.local_port = local.clone();
    }
    if let Some(remote) = &args.remote {
        config.subscription.remote_port = remote.clone();
    }
    if let Some(dir) = &args.registry_dir {
        config.network.registry_dir = dir.clone();
    }

    config.validate()?;
    Ok((config, from_file))
}

fn run(config: &ReceiverConfig) -> Result<(), ReceiverError> {
    info!(
        "Config OK: service={}, local={}, remote={}, policy={}",
        config.shared.service_name,
        config.subscription.local_port,
        config.subscription.remote_port,
        config.scheduling.policy
    );

    // Setup signal handler for graceful shutdown.
    let shutdown = Arc::new(AtomicBool::new(false));
    let s = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })?;

    let mut runner = Runner::new();
    let summary = runner.run(
        &PosixScheduler::new(),
        config,
        || UdpNetwork::init(&config.network),
        &shutdown,
        |msg| {
            trace!(
                "{} seq={} len={} age={}us",
                msg.source,
                msg.seq,
                msg.payload.len(),
                msg.age_us()
            );
        },
    )?;

    if summary.gaps > 0 {
        warn!("{} message(s) lost on the unreliable carrier", summary.gaps);
    }
    Ok(())
}

/// Setup tracing subscriber from the config level and CLI flags.
fn setup_tracing(args: &Args, level: LogLevel) {
    let directive = if args.verbose {
        LogLevel::Debug.as_directive()
    } else {
        level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
