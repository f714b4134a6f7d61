//! `drivesim-cli` – drivesim command line interface
//!
//! `drivesim [--config PATH] [--ticks N]`
//!
//! 1. Loads `--config PATH` or `~/.drivesim/config.toml`, writing a default
//!    file on first run.
//! 2. Spawns every configured vehicle with its controller on a Tokio
//!    multi-thread runtime that runs the transport callbacks.
//! 3. Reads rosbridge JSON frames from stdin, one per line, and publishes
//!    them on the event bus.
//! 4. Prints outbound odometry and TF frames to stdout, one per line.
//! 5. Ticks the simulation at `tick_hz` on the main thread until Ctrl-C or
//!    `--ticks` is reached.
//!
//! Logs and the banner go to stderr; stdout carries only data frames.

mod config;

use std::io::{BufRead, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use colored::Colorize;
use drivesim_middleware::bridge::encode_event;
use drivesim_middleware::{EventBus, RosbridgeBridge};
use drivesim_runtime::{Simulation, init_tracing};
use drivesim_types::MessageKind;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    ticks: Option<u64>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut out = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                out.config = Some(PathBuf::from(path));
            }
            "--ticks" | "-n" => {
                let n = args.next().ok_or("--ticks needs a count")?;
                out.ticks = Some(n.parse().map_err(|_| format!("invalid tick count `{n}`"))?);
            }
            other => return Err(format!("unknown argument `{other}`")),
        }
    }
    Ok(out)
}

fn main() {
    let _otel_guard = init_tracing("drivesim");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            eprintln!("usage: drivesim [--config PATH] [--ticks N]");
            std::process::exit(2);
        }
    };

    print_banner();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping simulation …".yellow().bold());
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use --ticks to bound the run");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let path = args.config.unwrap_or_else(config::config_path);
    let cfg = match config::load_or_init(&path) {
        Ok((cfg, created)) => {
            if created {
                eprintln!("  {} Default config written to {}", "✓".green().bold(), path.display().to_string().bold());
            } else {
                eprintln!("  Config loaded from {}", path.display().to_string().bold());
            }
            cfg
        }
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            eprintln!("  Using default configuration.");
            let mut cfg = drivesim_runtime::SimulationConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Transport runtime ─────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("drivesim-transport")
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start transport runtime");
            std::process::exit(1);
        }
    };

    let bus = Arc::new(EventBus::default());
    spawn_stdout_writer(&runtime, &bus);
    spawn_stdin_reader(bus.clone());

    let mut sim = match Simulation::from_config(&cfg, bus, runtime.handle().clone()) {
        Ok(sim) => sim,
        Err(e) => {
            error!(error = %e, "Failed to build simulation");
            std::process::exit(1);
        }
    };
    eprintln!(
        "  {} vehicle(s) at {} Hz. Reading rosbridge frames on stdin.\n",
        sim.arena().len().to_string().bold(),
        cfg.tick_hz
    );

    // ── Fixed-rate tick loop ──────────────────────────────────────────────
    let dt = cfg.tick_period();
    let period = Duration::from_secs_f64(dt);
    let mut next = Instant::now();
    while !shutdown.load(Ordering::SeqCst) && args.ticks.is_none_or(|n| sim.ticks() < n) {
        let report = sim.tick(dt);
        if report.commands_applied > 0 {
            debug!(tick = sim.ticks(), applied = report.commands_applied, "Commands applied");
        }
        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    info!(ticks = sim.ticks(), sim_time = sim.sim_time(), "Simulation stopped");
    sim.shutdown();
    // Let the writer flush frames published on the last tick.
    runtime.shutdown_timeout(Duration::from_millis(200));
    eprintln!("{}", "  ✓ Exiting drivesim.".green());
}

/// Forward every odometry and TF event to stdout as a rosbridge frame.
fn spawn_stdout_writer(runtime: &tokio::runtime::Runtime, bus: &EventBus) {
    let mut rx = bus.subscribe();
    runtime.spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "stdout writer lagged; frames dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !matches!(event.payload.kind(), MessageKind::Odometry | MessageKind::Transform) {
                continue;
            }
            match encode_event(&event) {
                Ok(line) => {
                    let mut out = std::io::stdout().lock();
                    if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(topic = %event.topic, error = %e, "Failed to encode frame"),
            }
        }
    });
}

/// Publish each stdin line as a rosbridge frame.  Runs on a plain thread
/// because stdin reads block.
fn spawn_stdin_reader(bus: Arc<EventBus>) {
    let bridge = RosbridgeBridge::new(bus);
    let spawned = std::thread::Builder::new()
        .name("drivesim-stdin".into())
        .spawn(move || {
            let accepted = ingest_lines(std::io::stdin().lock(), &bridge);
            debug!(accepted, "stdin closed");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start stdin reader; commands will not be accepted");
    }
}

/// Feed every line of `reader` to `bridge` until EOF or a read error.
/// Lines that are not UTF-8 are skipped.  Returns the number of frames
/// accepted.
fn ingest_lines(reader: impl BufRead, bridge: &RosbridgeBridge) -> usize {
    let mut accepted = 0;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(error = %e, "Skipping stdin line that is not UTF-8");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "stdin read failed; no further commands will be accepted");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match bridge.ingest(&line) {
            Ok(_) => accepted += 1,
            Err(e) => warn!(error = %e, "Rejected stdin frame"),
        }
    }
    accepted
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!("{}", r#"     _      _                _         "#.bold().cyan());
    eprintln!("{}", r#"  __| |_ __(_)_   _____  ___(_)_ __ ___ "#.bold().cyan());
    eprintln!("{}", r#" / _` | '__| \ \ / / _ \/ __| | '_ ` _ \"#.bold().cyan());
    eprintln!("{}", r#"| (_| | |  | |\ V /  __/\__ \ | | | | | |"#.bold().cyan());
    eprintln!("{}", r#" \__,_|_|  |_| \_/ \___||___/_|_| |_| |_|"#.bold().cyan());
    eprintln!();
    eprintln!(
        "  {} {}",
        "drivesim".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    eprintln!("  Vehicle command bridge and odometry simulator");
    eprintln!();
}
