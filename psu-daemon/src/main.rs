/*
 * This file is part of psumon.
 *
 * Copyright (C) 2025 psumon contributors
 *
 * psumon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 2 of the License, or
 * (at your option) any later version.
 *
 * psumon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with psumon. If not, see <https://www.gnu.org/licenses/>.
 */

//! psumon daemon (psumond)
//!
//! Attaches one PMBus PSU described by a JSON configuration file, keeps it
//! polled in the background, and logs a JSON attribute report on a fixed
//! interval until SIGINT/SIGTERM.
//!
//! # Logging
//! - systemd journal when its socket exists, stdout otherwise
//! - level from `PSUMON_LOG` (default `info`)
//! - state transitions additionally go to the JSON event journal

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing::{debug, error, info, warn};

use psumon::{config_path, load_config, logger, Psu, SmbusTransport};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global shutdown flag for clean termination
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// How often the main loop looks at the shutdown flag
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

const DEFAULT_REPORT_SECS: u64 = 30;

struct Args {
    config: Option<PathBuf>,
    journal: Option<PathBuf>,
    report_interval: Duration,
    once: bool,
}

// ============================================================================
// CLI
// ============================================================================

fn print_help() {
    eprintln!("psumond {} - PMBus power supply telemetry daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    psumond [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH          Device configuration");
    eprintln!("                               (default: $PSUMON_CONFIG or /etc/psumon/config.json)");
    eprintln!("    -j, --journal PATH         Event journal (default: /var/log/psumon/events.json)");
    eprintln!(
        "    -i, --report-interval SEC  Seconds between attribute reports (default: {})",
        DEFAULT_REPORT_SECS
    );
    eprintln!("        --once                 Poll once, print the report and exit");
    eprintln!("    -v, --version              Print version");
    eprintln!("    -h, --help                 Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    PSUMON_LOG                 Log level (trace, debug, info, warn, error)");
}

fn print_version() {
    println!("psumond {}", VERSION);
}

/// `Ok(None)` means help or version was printed
fn parse_args() -> anyhow::Result<Option<Args>> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = Args {
        config: None,
        journal: None,
        report_interval: Duration::from_secs(DEFAULT_REPORT_SECS),
        once: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-v" | "--version" => {
                print_version();
                return Ok(None);
            }
            "--once" => parsed.once = true,
            "-c" | "--config" => {
                i += 1;
                let value = args.get(i).context("--config requires a path argument")?;
                parsed.config = Some(PathBuf::from(value));
            }
            "-j" | "--journal" => {
                i += 1;
                let value = args.get(i).context("--journal requires a path argument")?;
                parsed.journal = Some(PathBuf::from(value));
            }
            "-i" | "--report-interval" => {
                i += 1;
                let value = args.get(i).context("--report-interval requires a number of seconds")?;
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("invalid report interval: {}", value))?;
                if secs == 0 {
                    bail!("report interval must be at least one second");
                }
                parsed.report_interval = Duration::from_secs(secs);
            }
            arg => {
                print_help();
                bail!("unknown argument: {}", arg);
            }
        }
        i += 1;
    }

    Ok(Some(parsed))
}

fn init_tracing() -> bool {
    let log_level = std::env::var("PSUMON_LOG").unwrap_or_else(|_| "info".to_string());

    if std::path::Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
                return true;
            }
            Err(e) => eprintln!("Failed to create journald layer: {}, falling back to stdout", e),
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(&log_level)
        .init();
    false
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let journald = init_tracing();
    info!("STARTUP: psumond {} starting", VERSION);
    info!("STARTUP: Logging to {}", if journald { "systemd journal" } else { "stdout" });

    let path = args.config.clone().unwrap_or_else(config_path);
    let cfg = load_config(&path).with_context(|| format!("loading {}", path.display()))?;
    info!(
        "STARTUP: {} at {}:{:#04x} (config {})",
        cfg.variant,
        cfg.bus.display(),
        cfg.address,
        path.display()
    );
    if !cfg.is_standard_address() {
        warn!("Address {:#04x} is not a standard address for this PSU family", cfg.address);
    }

    if let Err(e) = logger::init_logging(args.journal.as_deref()) {
        warn!("Event journal disabled: {}", e);
    }

    let bus = SmbusTransport::open(&cfg.bus, cfg.address)
        .with_context(|| format!("opening {}", cfg.bus.display()))?;
    let options = cfg.device_options()?;

    if args.once {
        let psu = Psu::new(bus, options);
        if !psu.poll_once() {
            warn!("Cycle ended in the fail-safe snapshot");
        }
        println!("{}", serde_json::to_string_pretty(&psu.report())?);
        return Ok(());
    }

    let psu = Psu::attach(bus, options).context("starting poll task")?;

    if let Some(duty) = cfg.initial_duty_cycle {
        psu.set_fan_duty_cycle(duty)?;
        info!("STARTUP: Fan duty cycle set to {}%", duty);
    }

    if let Err(e) = ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    info!("STARTUP: PID: {}", std::process::id());

    let mut last_report: Option<Instant> = None;
    while !SHUTDOWN.load(Ordering::SeqCst) {
        tokio::time::sleep(SHUTDOWN_POLL).await;

        if last_report.map_or(false, |t| t.elapsed() < args.report_interval) {
            continue;
        }
        if !psu.is_valid() {
            debug!("Waiting for the first poll cycle");
            continue;
        }
        last_report = Some(Instant::now());

        if !psu.is_polling() {
            error!("Poll task exited unexpectedly");
            break;
        }
        info!(report = %psu.report(), "PSU report");
    }

    if SHUTDOWN.load(Ordering::SeqCst) {
        info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
    }
    psu.detach();
    logger::shutdown_logging();
    info!("SHUTDOWN: Daemon terminated gracefully");
    Ok(())
}
