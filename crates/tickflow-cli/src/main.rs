//! `tickflow-cli` – fixed-rate driver for a tickflow state machine.
//!
//! The binary:
//!
//! 1. Initialises tracing (console, JSON or OTLP – see
//!    [`tickflow_runtime::telemetry`]).
//! 2. Loads `~/.tickflow/config.toml` (or the path given as the first
//!    argument), writing the defaults when the file is absent.
//! 3. Builds the demo worker machine and calls `step()` once per
//!    `tick_interval_ms` until `max_steps`, Ctrl-C, a `Kill` from the active
//!    tree, or a step error.
//! 4. Prints the recent state history on exit.

mod config;
mod demo;

use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use tickflow_runtime::{StateHistory, history_listener, init_tracing};
use tickflow_types::Status;

fn main() -> ExitCode {
    // Hold the guard until exit so pending spans are flushed.
    let _telemetry = init_tracing("tickflow");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after this step …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the run can only end on its own");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::config_path);
    let cfg = match config::load(&path) {
        Ok((cfg, true)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok((cfg, false)) => {
            match config::save_to(&config::Config::default(), &path) {
                Ok(()) => println!(
                    "  {} No config found; defaults written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    info!(?cfg, "configuration ready");

    // ── Machine ───────────────────────────────────────────────────────────
    let world = demo::World::new();
    let mut machine = match demo::build_worker(&world, cfg.machine_config()) {
        Ok(machine) => machine,
        Err(e) => {
            error!(error = %e, "failed to build state machine");
            return ExitCode::FAILURE;
        }
    };

    let history = Arc::new(Mutex::new(StateHistory::new(cfg.history_capacity)));
    let record = history_listener(Arc::clone(&history));
    machine.set_state_change_listener(move |state| {
        println!("        {} {}", "→".cyan(), state.name().bold());
        record(state);
    });
    machine.enter_initial_state();

    // ── Fixed-rate loop ───────────────────────────────────────────────────
    let mut exit = ExitCode::SUCCESS;
    for step in 1..=cfg.max_steps {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        match machine.step() {
            Ok(status) => {
                println!(
                    "  {:>4}  {:<20} {:<8} {}",
                    step.to_string().dimmed(),
                    machine.active_path().join(" / "),
                    status.map_or_else(|| "-".to_string(), |s| s.to_string()),
                    world.snapshot().dimmed()
                );
                if status == Some(Status::Kill) {
                    warn!(step, "active tree reported Kill; stopping");
                    exit = ExitCode::FAILURE;
                    break;
                }
            }
            Err(e) => {
                error!(step, error = %e, "step failed");
                exit = ExitCode::FAILURE;
                break;
            }
        }

        if machine.is_active("Done") {
            println!("  {}", "✓ Goal reached.".green().bold());
            break;
        }
        std::thread::sleep(cfg.tick_interval());
    }

    // ── Summary ───────────────────────────────────────────────────────────
    if let Ok(history) = history.lock() {
        println!();
        println!("  History: {}", history.summary());
    }
    exit
}

fn print_banner() {
    println!();
    println!(
        "  {} {}",
        "tickflow".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Behavior trees driven by hierarchical state machines");
    println!();
}
