//! Terminal monitor for the ball-in-tube rig.
//!
//! Usage:
//!   tube-monitor --list
//!   tube-monitor /dev/ttyUSB0 [--config rig.toml] [--window 120] [--json]
//!
//! Operator commands are read from stdin, one per line:
//!   send <mode 0-3> <height_mm> <valve_pct> <fan_pct>
//!   reset
//!   window <seconds>
//!   status
//!   quit            (or Ctrl-D)
//!
//! Status lines and logs go to stderr; readouts (or JSON samples) to stdout.

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tubelink::{Command, Limits, Mode, Monitor, Sample, Session, SessionConfig};

#[derive(Parser, Debug)]
#[command(
    name = "tube-monitor",
    about = "Live telemetry and setpoint control for the ball-in-tube rig"
)]
struct Args {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3.
    port: Option<String>,

    /// List available serial ports and exit.
    #[arg(long)]
    list: bool,

    /// TOML file with session settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display window in seconds (5-600).
    #[arg(long)]
    window: Option<u32>,

    /// Override the baud rate.
    #[arg(long)]
    baud: Option<u32>,

    /// Display refresh period in milliseconds.
    #[arg(long, default_value_t = 200)]
    tick_ms: u64,

    /// Print every sample as a JSON line instead of the readout.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, PartialEq)]
enum Input {
    Send(Command),
    Window(u32),
    Status,
    Quit,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if args.list {
        for port in tubelink::list_ports().context("enumerating serial ports")? {
            println!("{port}");
        }
        return Ok(());
    }

    let Some(port) = args.port.as_deref() else {
        bail!("no serial port given (use --list to see what is available)");
    };

    let mut config = load_config(args.config.as_deref())?;
    if let Some(window) = args.window {
        config.window_seconds = window;
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }

    let (mut session, events) = Session::new(config.clone());
    let mut monitor = Monitor::new(events, &config);
    monitor.set_on_status(|status| eprintln!("{status}"));
    if args.json {
        monitor.set_on_sample(|sample| match serde_json::to_string(sample) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to serialize sample"),
        });
    }

    session.connect(port)?;
    let input = spawn_stdin_reader();
    let tick = Duration::from_millis(args.tick_ms.max(10));

    'run: loop {
        if monitor.tick() > 0 && !args.json {
            if let Some(sample) = monitor.latest() {
                println!("{}", readout(sample, &monitor));
            }
        }

        if !session.is_connected() {
            monitor.tick();
            let reason = monitor.status().to_string();
            session.disconnect();
            monitor.tick();
            bail!("link lost ({reason})");
        }

        loop {
            let line = match input.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break 'run,
            };
            match parse_input(&line, monitor.limits()) {
                Ok(Some(Input::Send(cmd))) => {
                    if let Err(e) = session.submit_command(&cmd) {
                        eprintln!("Error: {e}");
                    }
                }
                Ok(Some(Input::Window(seconds))) => {
                    let applied = monitor.set_window_seconds(seconds);
                    eprintln!("Window: {applied} s");
                }
                Ok(Some(Input::Status)) => eprintln!("{}", monitor.status()),
                Ok(Some(Input::Quit)) => break 'run,
                Ok(None) => {}
                Err(msg) => eprintln!("{msg}"),
            }
        }

        thread::sleep(tick);
    }

    session.disconnect();
    monitor.tick();
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn parse_input(line: &str, limits: &Limits) -> Result<Option<Input>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => Ok(None),
        ["send", mode, height, valve, fan] => {
            let mode = mode
                .parse::<u8>()
                .ok()
                .map(Mode::from_byte)
                .filter(|m| m.is_defined())
                .ok_or_else(|| format!("mode must be 0-3, got {mode}"))?;
            let height: u16 = height.parse().map_err(|_| format!("bad height: {height}"))?;
            let valve: f64 = valve.parse().map_err(|_| format!("bad valve %: {valve}"))?;
            let fan: f64 = fan.parse().map_err(|_| format!("bad fan %: {fan}"))?;
            Ok(Some(Input::Send(Command::from_percent(mode, height, valve, fan, limits))))
        }
        ["reset"] => Ok(Some(Input::Send(Command::reset()))),
        ["window", seconds] => seconds
            .parse()
            .map(|s| Some(Input::Window(s)))
            .map_err(|_| format!("bad window: {seconds}")),
        ["status"] => Ok(Some(Input::Status)),
        ["quit" | "exit"] => Ok(Some(Input::Quit)),
        _ => Err(format!(
            "unknown command: {line} (send <mode> <height_mm> <valve_pct> <fan_pct> | reset | window <s> | status | quit)"
        )),
    }
}

fn readout(s: &Sample, monitor: &Monitor) -> String {
    let limits = monitor.limits();
    format!(
        "t={:8.2}s mode={:<7} sp={:3}mm h={:3}mm tof={:5} temp={:5.1}C valve_sp={:3} valve={:3} ({:5.1}%) fan={:4} ({:5.1}%) [{} in {}s]",
        s.timestamp,
        s.mode.to_string(),
        s.height_setpoint_mm,
        s.height_measured_mm,
        s.flight_time_avg,
        s.temperature_celsius(),
        s.valve_setpoint_steps,
        s.valve_position_steps,
        s.valve_position_percent(limits),
        s.fan_duty_raw,
        s.fan_duty_percent(limits),
        monitor.history().len(),
        monitor.history().window_seconds(),
    )
}
