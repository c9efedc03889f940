//! Command-line front end for the Yokogawa 7651 DC source.
//!
//! ```text
//! yoko7651 --address GPIB0::14::INSTR voltage-mode --range 10000 --current-limit 20
//! yoko7651 --address GPIB0::14::INSTR output 3
//! yoko7651 --address GPIB0::14::INSTR state on
//! yoko7651 --dry-run sweep --min 0 --max 2 --step 0.5 --delay 0.2 --range 10000 --current-limit 20
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rs_yokogawa7651::{
    Config, DefaultResourceManager, DeviceProfile, LoopbackResourceManager, Polarity,
    ResourceManager, Session, VoltageSweep, Yokogawa7651,
};

#[derive(Parser, Debug)]
#[command(name = "yoko7651", version, about = "Drive a Yokogawa 7651 DC source")]
struct Cli {
    /// Instrument resource string
    #[arg(short, long, default_value = "GPIB0::1::INSTR", global = true)]
    address: String,

    /// Session name used in logs
    #[arg(short, long, default_value = "Yokogawa 7651", global = true)]
    name: String,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the commands instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List USBTMC devices and serial ports
    List,
    /// List the voltage and current ranges
    Ranges,
    /// Reset the instrument to its default settings
    Init,
    /// Source voltage
    VoltageMode {
        /// Range in millivolts
        #[arg(long)]
        range: u32,
        /// Current limit in milliamps
        #[arg(long)]
        current_limit: Option<f64>,
    },
    /// Source current
    CurrentMode {
        /// Range in milliamps
        #[arg(long)]
        range: u32,
        /// Voltage limit in volts
        #[arg(long)]
        voltage_limit: Option<f64>,
    },
    /// Set the voltage limit in volts
    VoltageLimit { volts: f64 },
    /// Set the current limit in milliamps
    CurrentLimit { milliamps: f64 },
    /// Set the output value
    Output {
        #[arg(allow_negative_numbers = true)]
        value: f64,
        /// `+` or `-`
        #[arg(long, default_value = "+", value_parser = parse_polarity)]
        polarity: Polarity,
    },
    /// Switch the output on or off
    State { state: OutputState },
    /// Linear voltage sweep; press Enter to stop it early
    Sweep {
        /// Start voltage in volts
        #[arg(long, allow_negative_numbers = true)]
        min: f64,
        /// End voltage in volts
        #[arg(long, allow_negative_numbers = true)]
        max: f64,
        /// Step in volts
        #[arg(long)]
        step: f64,
        /// Delay after each point in seconds
        #[arg(long, default_value = "0.1", value_parser = parse_seconds)]
        delay: Duration,
        /// Range in millivolts
        #[arg(long)]
        range: u32,
        /// Current limit in milliamps
        #[arg(long)]
        current_limit: f64,
        /// `+` or `-`
        #[arg(long, default_value = "+", value_parser = parse_polarity)]
        polarity: Polarity,
    },
    /// 10 V range, 20 mA limit, 3 V out for a while, then off
    Demo {
        /// Seconds to keep the output on
        #[arg(long, default_value = "10", value_parser = parse_seconds)]
        hold: Duration,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputState {
    On,
    Off,
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let seconds: f64 = s.parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("{e}"))
}

fn parse_polarity(s: &str) -> Result<Polarity, String> {
    s.parse().map_err(|e: rs_yokogawa7651::Error| e.to_string())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Set the returned flag once a line (or EOF) arrives on stdin.
fn cancel_on_enter() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        flag.store(true, Ordering::Relaxed);
    });
    cancel
}

fn run(source: &mut Yokogawa7651, command: Commands) -> Result<()> {
    match command {
        // answered in `main` without a session
        Commands::List | Commands::Ranges => {}
        Commands::Init => source.initialize()?,
        Commands::VoltageMode {
            range,
            current_limit,
        } => source.set_voltage_function(range, current_limit)?,
        Commands::CurrentMode {
            range,
            voltage_limit,
        } => source.set_current_function(range, voltage_limit)?,
        Commands::VoltageLimit { volts } => source.set_voltage_limit(volts)?,
        Commands::CurrentLimit { milliamps } => source.set_current_limit(milliamps)?,
        Commands::Output { value, polarity } => source.set_output_value(value, polarity)?,
        Commands::State { state } => {
            source.set_output_state(matches!(state, OutputState::On))?
        }
        Commands::Sweep {
            min,
            max,
            step,
            delay,
            range,
            current_limit,
            polarity,
        } => {
            let sweep = VoltageSweep::new(min, max, step, delay, range, current_limit)
                .with_polarity(polarity);
            let cancel = cancel_on_enter();
            let report = source.sweep_voltage_with_cancel(&sweep, &cancel)?;
            println!(
                "{} points written{}",
                report.points,
                if report.cancelled { " (cancelled)" } else { "" }
            );
        }
        Commands::Demo { hold } => {
            source.set_voltage_function(10000, Some(20.0))?;
            source.set_output_value(3.0, Polarity::Plus)?;
            source.set_output_state(true)?;
            info!(?hold, "output on");
            thread::sleep(hold);
            source.set_output_state(false)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    init_logging(&config.log_level);

    match cli.command {
        Commands::List => {
            let manager = DefaultResourceManager::new(config.transport);
            for resource in manager.list_resources()? {
                println!("{resource}");
            }
            return Ok(());
        }
        Commands::Ranges => {
            println!("voltage ranges:");
            for range in Yokogawa7651::voltage_ranges() {
                println!("  {range}");
            }
            println!("current ranges:");
            for range in Yokogawa7651::current_ranges() {
                println!("  {range}");
            }
            return Ok(());
        }
        _ => {}
    }

    if cli.dry_run {
        let loopback = LoopbackResourceManager::new();
        let (commands, outcome) = dry_run(&loopback, cli.name, cli.address, cli.command);
        for command in commands {
            println!("{command}");
        }
        return outcome;
    }

    let manager = DefaultResourceManager::new(config.transport);
    execute(&manager, cli.name, cli.address, cli.command)
}

/// Open a session, run `command` and close it again, even when the command
/// failed. The command's error wins over the close error.
fn execute(
    manager: &dyn ResourceManager,
    name: String,
    address: String,
    command: Commands,
) -> Result<()> {
    let session = Session::open(manager, name, address)?;
    info!("{session}");
    let mut source = Yokogawa7651::new(session);

    let outcome = run(&mut source, command);
    let closed = source.close();
    outcome?;
    closed?;
    Ok(())
}

/// Run `command` on `loopback` and return what it recorded, commands sent
/// before a failure included, next to the outcome.
fn dry_run(
    loopback: &LoopbackResourceManager,
    name: String,
    address: String,
    command: Commands,
) -> (Vec<String>, Result<()>) {
    let outcome = execute(loopback, name, address, command);
    (loopback.writes(), outcome)
}
