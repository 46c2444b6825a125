//! # rtsub Publisher Tool
//!
//! Registers a publisher port and sends numbered messages at a fixed rate,
//! for exercising a receiver by hand.
//!
//! # Usage
//!
//! ```bash
//! # Publish forever at 100 Hz under the default receiver's remote port
//! rtsub_publish --port /coman/left_arm/state:o --rate-hz 100
//!
//! # Wait for one subscriber, then send 10 messages
//! rtsub_publish --port /pub/topic:o --count 10 --wait-subscribers 1
//! ```

use clap::Parser;
use rtsub_common::consts::{DEFAULT_REGISTRY_DIR, DEFAULT_REMOTE_PORT};
use rtsub_common::port::PortName;
use rtsub_common::transport::config::NetworkConfig;
use rtsub_transport::{Publisher, UdpNetwork};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, Level};
use tracing_subscriber::EnvFilter;

/// rtsub Publisher - send numbered test messages on a port
#[derive(Parser, Debug)]
#[command(name = "rtsub_publish")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Publish numbered test messages on an rtsub port")]
struct Args {
    /// Port name to publish under.
    #[arg(long, default_value = DEFAULT_REMOTE_PORT)]
    port: PortName,

    /// Naming registry directory.
    #[arg(long, default_value = DEFAULT_REGISTRY_DIR)]
    registry_dir: PathBuf,

    /// Messages per second.
    #[arg(long, default_value_t = 10)]
    rate_hz: u32,

    /// Stop after this many messages (default: run until interrupted).
    #[arg(long)]
    count: Option<u64>,

    /// Wait for this many subscribers before the first message.
    #[arg(long, default_value_t = 0)]
    wait_subscribers: usize,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(args.verbose);

    info!("rtsub publisher v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if args.rate_hz == 0 {
        return Err("--rate-hz must be > 0".into());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let network = UdpNetwork::init(&NetworkConfig::with_registry(&args.registry_dir))?;
    let mut publisher = Publisher::open(&network, &args.port)?;

    if args.wait_subscribers > 0 {
        info!("Waiting for {} subscriber(s)...", args.wait_subscribers);
        while running.load(Ordering::SeqCst)
            && !publisher.wait_for_subscribers(args.wait_subscribers, Duration::from_millis(200))
        {}
    }

    let period = Duration::from_secs(1) / args.rate_hz;
    let mut next = Instant::now();
    let mut sent: u64 = 0;

    while running.load(Ordering::SeqCst) && args.count.is_none_or(|n| sent < n) {
        let payload = format!("{} #{sent}", args.port).into_bytes();
        let reached = publisher.publish(payload)?;
        if reached == 0 {
            debug!("Message {sent} had no subscribers");
        }
        sent += 1;

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    info!("Published {sent} message(s) on {}", args.port);
    Ok(())
}

fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}
