//! UPS Pico daemon entry point.
//!
//! Wires the protocol engine to a GPIO backend, spawns the three
//! daemon flows, and maps the first exit reason to the process exit
//! code.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use ups_common::{DaemonConfig, ProtocolState};
use ups_engine::{
    HeartbeatService, ShutdownExecutor, ShutdownTrigger, StatusReporter, SystemClock,
    SystemShutdown,
};
use ups_gpio::{CdevChip, GpioChip, SimChip};

use crate::signals::{ExitLatch, ExitReason};

/// Pulse period of the built-in simulated chip.
const SIMULATED_PULSE_PERIOD: Duration = Duration::from_millis(450);

/// UPS Pico daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "upspicod",
    about = "UPS Pico shutdown daemon - GPIO heartbeat and shutdown protocol",
    version,
    long_about = None
)]
struct Args {
    /// Path to a configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// GPIO character device (overrides config file).
    #[arg(long, value_name = "DEV")]
    gpiochip: Option<PathBuf>,

    /// Line offset of the UPS Pico clock pin (overrides config file).
    #[arg(long, value_name = "PIN")]
    clock_pin: Option<u32>,

    /// Line offset of the UPS Pico pulse pin (overrides config file).
    #[arg(long, value_name = "PIN")]
    pulse_pin: Option<u32>,

    /// Run against a built-in simulated chip (no hardware).
    #[arg(long, short = 's')]
    simulated: bool,

    /// Maximum pulse/heartbeat cycles to run (0 = infinite).
    #[arg(long, default_value = "0")]
    max_cycles: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting upspicod");

    let mut config = load_config(&args)?;

    // Override with command-line arguments
    if let Some(gpiochip) = &args.gpiochip {
        config.gpiochip = gpiochip.clone();
    }
    if let Some(clock_pin) = args.clock_pin {
        config.clock_pin = clock_pin;
    }
    if let Some(pulse_pin) = args.pulse_pin {
        config.pulse_pin = pulse_pin;
    }

    config.validate().context("Invalid configuration")?;

    info!(
        chip = %config.gpiochip.display(),
        clock_pin = config.clock_pin,
        pulse_pin = config.pulse_pin,
        "Configuration loaded"
    );

    let reason = if args.simulated {
        info!("Using simulated GPIO chip");
        run_daemon(
            SimChip::free_running(SIMULATED_PULSE_PERIOD),
            &config,
            args.max_cycles,
        )?
    } else {
        let chip = CdevChip::new(&config.gpiochip);
        info!(chip = %chip.path().display(), "Opening GPIO device");
        run_daemon(chip, &config, args.max_cycles)?
    };

    info!(reason = %reason, "Exiting");
    match reason {
        ExitReason::Fault(e) => Err(e).context("daemon failed"),
        _ => Ok(()),
    }
}

/// Initialize logging with the specified default level.
///
/// `RUST_LOG` takes priority over the command-line level. Under
/// systemd (detected via INVOCATION_ID or JOURNAL_STREAM) timestamps
/// are dropped, journald supplies its own.
fn init_logging(level: &str) {
    let filter = format!(
        "upspicod={},ups_engine={},ups_gpio={},ups_common={}",
        level, level, level, level
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter));

    let under_systemd = std::env::var_os("INVOCATION_ID").is_some()
        || std::env::var_os("JOURNAL_STREAM").is_some();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if under_systemd {
        builder.without_time().init();
    } else {
        builder.init();
    }
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `UPSPICO_CONFIG` environment variable
/// 3. `/etc/upspico/config.toml` (system path)
/// 4. `./upspico.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<DaemonConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return DaemonConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var("UPSPICO_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from UPSPICO_CONFIG");
            return DaemonConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from UPSPICO_CONFIG={:?}", env_path)
            });
        }
        warn!(
            path = %env_path,
            "UPSPICO_CONFIG set but file does not exist, checking other locations"
        );
    }

    // 3. System path
    let system_path = PathBuf::from("/etc/upspico/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return DaemonConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {:?}", system_path));
    }

    // 4. Local development path
    let local_path = PathBuf::from("upspico.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return DaemonConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {:?}", local_path));
    }

    // 5. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(DaemonConfig::default())
}

/// Spawn the three daemon flows and wait for the first exit reason.
///
/// The pulse/heartbeat flow, shutdown executor, and status reporter
/// run as detached threads; process exit terminates whichever are
/// still parked.
fn run_daemon<C>(chip: C, config: &DaemonConfig, max_cycles: u64) -> Result<ExitReason>
where
    C: GpioChip + 'static,
    C::Events: 'static,
    C::Line: 'static,
{
    let state = Arc::new(ProtocolState::new());
    let latch = Arc::new(ExitLatch::new());
    signals::install(&latch);

    let (trigger, trigger_rx) = ShutdownTrigger::pair();

    let mut service = HeartbeatService::new(
        chip,
        SystemClock,
        Arc::clone(&state),
        trigger,
        config,
    )
    .context("Failed to claim the protocol lines")?
    .with_max_cycles(max_cycles);

    {
        let latch = Arc::clone(&latch);
        std::thread::spawn(move || match service.run() {
            Ok(()) => latch.notify(ExitReason::CycleLimit),
            Err(e) => {
                error!(error = %e, "Pulse/heartbeat flow failed");
                latch.notify(ExitReason::Fault(e));
            }
        });
    }

    let executor = ShutdownExecutor::new(
        trigger_rx,
        SystemShutdown::new(&config.shutdown_command),
        &config.timing,
    );
    {
        let latch = Arc::clone(&latch);
        std::thread::spawn(move || {
            if executor.run() {
                latch.notify(ExitReason::ShutdownComplete);
            }
        });
    }

    let reporter = StatusReporter::new(Arc::clone(&state), config.timing.status_interval);
    std::thread::spawn(move || reporter.run());

    Ok(latch.wait())
}
