//! hxspi simulator
//!
//! Attaches a simulated hx83108b, registers the data-ready handler over
//! the chosen dispatch path, feeds it touch reports for a while and
//! reports what the handler saw.
//!
//! ```bash
//! # Interrupt mode, 20 reports, verbose logging
//! RUST_LOG=debug hxspi-sim --mode irq --events 20
//!
//! # Polling mode from a config file
//! hxspi-sim --mode poll --config board.toml --duration-ms 3000
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use hxspi_core::config::FirmwareKind;
use hxspi_core::DispatchMode;
use hxspi_host::sim::EVENT_COMMAND;
use hxspi_host::{load_host_config, BlankEvent, BlankState, HostConfig, SimRig};

/// Size of one touch report
const REPORT_LEN: usize = 8;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Threaded interrupt on the data-ready line
    Irq,
    /// Fixed-period polling
    Poll,
}

/// Run the touch controller core against a simulated controller
#[derive(Parser)]
#[command(name = "hxspi-sim")]
#[command(version)]
#[command(about = "Simulate an hx83108b touch controller over the hxspi core")]
struct Cli {
    /// Dispatch path to establish
    #[arg(short, long, value_enum, default_value = "irq")]
    mode: Mode,

    /// TOML or postcard configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Touch reports to inject
    #[arg(short, long, default_value_t = 10)]
    events: usize,

    /// How long to run before detaching
    #[arg(short, long, default_value_t = 2000)]
    duration_ms: u64,

    /// Poll period override in milliseconds
    #[arg(long)]
    poll_ms: Option<u32>,

    /// Exercise a display blank/unblank cycle before detaching
    #[arg(long)]
    blank_cycle: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_host_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => HostConfig::default(),
    };
    if let Some(ms) = cli.poll_ms {
        config.poll.initial_delay_ms = ms;
        config.poll.period_ms = ms;
    }

    info!(
        "firmware image: {}",
        config.info.firmware_name(FirmwareKind::Boot)
    );

    let rig = SimRig::attach(config.device(), matches!(cli.mode, Mode::Irq))
        .map_err(|e| anyhow::anyhow!("attach failed: {e}"))?;

    let reports = Arc::new(AtomicUsize::new(0));
    let invocations = Arc::new(AtomicUsize::new(0));
    let handler = {
        let (device, reports, invocations) =
            (rig.weak_device(), reports.clone(), invocations.clone());
        move || {
            let Some(device) = device.upgrade() else {
                return;
            };
            invocations.fetch_add(1, Ordering::SeqCst);
            let mut report = [0u8; REPORT_LEN];
            match device.bus_read(EVENT_COMMAND, &mut report) {
                Ok(()) if report.iter().any(|&b| b != 0) => {
                    reports.fetch_add(1, Ordering::SeqCst);
                }
                Ok(()) => {}
                Err(e) => warn!("event read failed: {e}"),
            }
        }
    };

    let mode = rig
        .device
        .register_dispatcher(handler)
        .map_err(|e| anyhow::anyhow!("dispatcher registration failed: {e}"))?;
    info!("dispatch mode: {:?}", mode);
    rig.device.mark_boot_done();

    let deadline = Instant::now() + Duration::from_millis(cli.duration_ms);
    let spacing = Duration::from_millis(cli.duration_ms / (cli.events as u64 + 1));
    for n in 0..cli.events {
        let id = (n as u8).wrapping_add(1);
        rig.ic.inject_event(&[id, 0x01, 0x00, 0x10, 0x00, 0x20, 0x00, 0x00]);
        thread::sleep(spacing);
    }

    if cli.blank_cycle {
        let notifier = config.display;
        let (suspend, resume) = match notifier {
            hxspi_host::DisplayNotifier::Framebuffer => (
                (BlankEvent::Blank, BlankState::Powerdown),
                (BlankEvent::Blank, BlankState::Unblank),
            ),
            _ => (
                (BlankEvent::EarlyBlank, BlankState::Powerdown),
                (BlankEvent::Blank, BlankState::Unblank),
            ),
        };
        notifier
            .notify(&rig.device, suspend.0, suspend.1)
            .map_err(|e| anyhow::anyhow!("suspend failed: {e}"))?;
        info!("suspended: {}", rig.device.is_suspended());
        notifier
            .notify(&rig.device, resume.0, resume.1)
            .map_err(|e| anyhow::anyhow!("resume failed: {e}"))?;
    }

    let remaining = deadline.saturating_duration_since(Instant::now());
    thread::sleep(remaining);

    rig.device.unregister_dispatcher();
    let seen = reports.load(Ordering::SeqCst);
    info!(
        "handler ran {} times, {} reports read, {} left queued, {} bus errors",
        invocations.load(Ordering::SeqCst),
        seen,
        rig.ic.pending_events(),
        rig.device.bus_error_count()
    );
    if mode == DispatchMode::Polling {
        info!(
            "poll ticks {}, coalesced {}",
            rig.poll_stats.ticks(),
            rig.poll_stats.coalesced()
        );
    }

    let Ok(device) = Arc::try_unwrap(rig.device) else {
        bail!("device still referenced after teardown");
    };
    device.detach();
    info!("detached; reset high: {}", rig.reset.is_high());
    Ok(())
}
