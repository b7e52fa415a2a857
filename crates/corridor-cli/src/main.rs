//! `corridor` – wall-following controller, simulated.
//!
//! This binary:
//!
//! 1. Loads `~/.corridor/config.toml` (or `$CORRIDOR_CONFIG`), falling back to
//!    defaults when the file is absent.
//! 2. Builds the simulation rig from the `[sim]` echo scripts and wires the
//!    capture engine, ranging sequencer, filter, and motor channel into a
//!    control loop.
//! 3. Runs the loop until the iteration limit or **Ctrl-C**, then sends the
//!    all-stop byte.
//!
//! Flags: `--json` prints one JSON cycle report per line, `--write-config`
//! saves the active configuration and exits.

mod config;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use colored::Colorize;
use corridor_hal::{CaptureEngine, MotorChannel, RangingSequencer, SimRig};
use corridor_runtime::{ControlLoop, Ranger};
use corridor_types::{CycleReport, NavigationState, SensorId};
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Args {
    json: bool,
    write_config: bool,
    help: bool,
}

impl Args {
    fn parse(args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Args::default();
        for arg in args {
            match arg.as_str() {
                "--json" => parsed.json = true,
                "--write-config" => parsed.write_config = true,
                "-h" | "--help" => parsed.help = true,
                other => return Err(format!("unknown argument `{other}`")),
            }
        }
        Ok(parsed)
    }
}

fn main() {
    corridor_runtime::init_tracing();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            print_usage();
            std::process::exit(2);
        }
    };
    if args.help {
        print_usage();
        return;
    }
    if !args.json {
        print_banner();
    }

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // First Ctrl-C stops the loop after the current iteration (which sends
    // the all-stop byte); a second one exits immediately.
    if let Err(e) = ctrlc::set_handler(move || {
        if shutdown_clone.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!();
        eprintln!("{}", "⚠  Ctrl-C received – stopping motors …".yellow().bold());
    }) {
        warn!(
            error = %e,
            "Failed to install Ctrl-C handler; the run can only end at its iteration limit"
        );
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            if !args.json {
                println!(
                    "  Config loaded from {}",
                    config::config_path().display().to_string().bold()
                );
            }
            cfg
        }
        Ok(None) => config::fallback(),
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            config::fallback()
        }
    };

    if args.write_config {
        match config::save(&cfg) {
            Ok(()) => println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    let loop_config = match cfg.to_loop_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Invalid configuration".red().bold(), e);
            std::process::exit(2);
        }
    };

    // ── Simulated hardware ────────────────────────────────────────────────
    let engine = Arc::new(CaptureEngine::new(cfg.tick_max));
    let mut rig = SimRig::new(Arc::clone(&engine), cfg.clock_hz)
        .starting_at(cfg.sim.start_tick)
        .with_motor_busy_polls(cfg.sim.motor_busy_polls);
    rig = if cfg.sim.cycle {
        rig.with_cycled_echoes(SensorId::FRONT, cfg.sim.front_echoes.clone())
            .with_cycled_echoes(SensorId::SIDE, cfg.sim.side_echoes.clone())
    } else {
        rig.with_echoes(SensorId::FRONT, cfg.sim.front_echoes.clone())
            .with_echoes(SensorId::SIDE, cfg.sim.side_echoes.clone())
    };
    let hw = rig.build();

    let sequencer = RangingSequencer::new(engine, hw.trigger, hw.delay)
        .with_timing(SensorId::FRONT, cfg.sensors.front.timing())
        .with_timing(SensorId::SIDE, cfg.sensors.side.timing());
    let ranger = Ranger::new(sequencer, cfg.filter.build());
    let motors = MotorChannel::new(hw.motor_link);

    let mut control = match ControlLoop::new(loop_config, ranger, motors) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Invalid configuration".red().bold(), e);
            std::process::exit(2);
        }
    };

    info!(filter = %cfg.filter, clock_hz = cfg.clock_hz, "starting simulated run");
    let started = Utc::now();
    let mut last_state = None;
    let result = control.run(&shutdown, |report| {
        if args.json {
            match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "failed to encode cycle report"),
            }
        } else if last_state != Some(report.state) {
            print_transition(report);
        }
        last_state = Some(report.state);
    });

    let elapsed = Utc::now() - started;
    match result {
        Ok(iterations) => {
            if !args.json {
                println!();
                println!(
                    "  {} {} iterations in {} ms, {} timed turn(s), {} motor byte(s) sent",
                    "✓".green().bold(),
                    iterations,
                    elapsed.num_milliseconds(),
                    control.navigator().turns(),
                    hw.probe.motor_byte_count()
                );
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Control loop failed".red().bold(), e);
            std::process::exit(1);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_transition(report: &CycleReport) {
    let state = report.state.to_string();
    let state = match report.state {
        NavigationState::Forward => state.green(),
        NavigationState::Dodge | NavigationState::Turn => state.yellow(),
        NavigationState::StopRecover => state.red(),
    };
    let speeds = report
        .speeds
        .map(|s| format!("({}, {})", s.right, s.left))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  #{:<5} {:<13} front {:>6}  side {:>6}  speeds {}",
        report.iteration,
        state.bold(),
        report.front,
        report.side,
        speeds.dimmed()
    );
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___                _    _         "#.bold().cyan());
    println!("{}", r#"  / __|___ _ _ _ _ (_)__| |___ _ _ "#.bold().cyan());
    println!("{}", r#" | (__/ _ \ '_| '_|| / _` / _ \ '_|"#.bold().cyan());
    println!("{}", r#"  \___\___/_| |_|  |_\__,_\___/_|  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "corridor".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Ultrasonic wall follower (simulated rig)");
    println!();
}

fn print_usage() {
    println!("usage: corridor [--json] [--write-config]");
    println!();
    println!("  --json           print one JSON cycle report per line");
    println!("  --write-config   save the active configuration and exit");
    println!();
    println!("  config: $CORRIDOR_CONFIG or ~/.corridor/config.toml");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, String> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_flags() {
        let a = parse(&["--json", "--write-config"]).unwrap();
        assert!(a.json);
        assert!(a.write_config);
        assert!(!a.help);
    }

    #[test]
    fn no_flags_is_plain_run() {
        let a = parse(&[]).unwrap();
        assert!(!a.json && !a.write_config && !a.help);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(parse(&["--fast"]).is_err());
    }
}
