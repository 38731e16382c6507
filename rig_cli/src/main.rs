#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
//! Binary entry point: config loading, logging setup, and rig assembly.
//!
//! stdout carries the rig protocol (responses and CSV dumps); all logging
//! goes to stderr or the configured log file so captures stay parseable.

mod cli;
mod rt;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use rig_config::Config;
use rig_core::{CommandInterpreter, RigCfg, SpeedCell};
use rig_hardware::StdioConsole;
use rig_traits::{Clock, MonotonicClock};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Commands, FILE_GUARD};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    let (cfg, from_file) = load_config(&args.config)?;
    cfg.validate().wrap_err("invalid configuration")?;
    init_logging(&args, &cfg.logging);
    if !from_file {
        tracing::debug!(
            path = %args.config.display(),
            "config file not found, using built-in defaults"
        );
    }

    match args.cmd {
        Commands::Run { rt, rt_prio } => run(&cfg, rt, rt_prio),
        Commands::SelfCheck => self_check(&cfg),
    }
}

fn load_config(path: &Path) -> eyre::Result<(Config, bool)> {
    if !path.exists() {
        return Ok((Config::default(), false));
    }
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    let cfg = rig_config::load_toml(&text)
        .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
    Ok((cfg, true))
}

fn init_logging(args: &Cli, logging: &rig_config::Logging) {
    use tracing_subscriber::{EnvFilter, fmt};

    // --log-level overrides the config value; RUST_LOG overrides both.
    let level = if args.log_level == "info" {
        logging
            .level
            .clone()
            .unwrap_or_else(|| args.log_level.clone())
    } else {
        args.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout is the protocol channel, so the console layer writes to stderr.
    let console: Box<dyn Layer<_> + Send + Sync> = if args.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file_layer = logging.file.as_ref().map(|p| {
        let path = Path::new(p);
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let name = path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "rig.log".into());
        let rotation = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::Rotation::DAILY,
            Some("hourly") => tracing_appender::rolling::Rotation::HOURLY,
            _ => tracing_appender::rolling::Rotation::NEVER,
        };
        let appender = tracing_appender::rolling::RollingFileAppender::new(rotation, dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();
}

fn run(cfg: &Config, rt: bool, rt_prio: Option<i32>) -> eyre::Result<()> {
    rt::setup_rt_once(rt, rt_prio);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .wrap_err("failed to install ctrl-c handler")?;
    }

    let rig_cfg = RigCfg::from(cfg);
    let speed = Arc::new(SpeedCell::new());
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let console = StdioConsole::new();

    #[cfg(feature = "hardware")]
    {
        let pwm = rig_hardware::gpio::HardwarePwm::new(cfg.pins.pwm_channel)
            .wrap_err("opening hardware PWM")?;
        let _encoder = rig_hardware::gpio::HardwareEncoder::new(
            cfg.pins.encoder_in,
            &rig_cfg.encoder,
            speed.clone(),
        )
        .wrap_err("registering encoder interrupt")?;
        tracing::info!(
            encoder_pin = cfg.pins.encoder_in,
            pwm_channel = cfg.pins.pwm_channel,
            "hardware rig assembled"
        );
        let mut interp = CommandInterpreter::new(pwm, console, clock, speed, rig_cfg, shutdown);
        interp.run()
    }

    #[cfg(not(feature = "hardware"))]
    {
        use rig_hardware::{EncoderSim, PlantModel, SimulatedDrive};
        let plant = Arc::new(PlantModel::new(
            cfg.sim.gain_rpm_per_pct,
            cfg.sim.deadband_pct,
            cfg.sim.tau_ms,
        ));
        let _encoder = EncoderSim::spawn(plant.clone(), speed.clone(), &rig_cfg.encoder);
        let pwm = SimulatedDrive::new(plant);
        tracing::info!(
            gain = cfg.sim.gain_rpm_per_pct,
            deadband = cfg.sim.deadband_pct,
            "simulated rig assembled"
        );
        let mut interp = CommandInterpreter::new(pwm, console, clock, speed, rig_cfg, shutdown);
        interp.run()
    }
}

/// Exercise the full simulated speed path: plant at full duty, encoder
/// edges through the real decoder, nonzero RPM out of the shared cell.
fn self_check(cfg: &Config) -> eyre::Result<()> {
    use rig_hardware::{EncoderSim, PlantModel};

    let rig_cfg = RigCfg::from(cfg);
    let plant = Arc::new(PlantModel::new(
        cfg.sim.gain_rpm_per_pct.max(1.0),
        cfg.sim.deadband_pct,
        0,
    ));
    let speed = Arc::new(SpeedCell::new());
    plant.set_duty(100);
    let sim = EncoderSim::spawn(plant, speed.clone(), &rig_cfg.encoder);
    std::thread::sleep(Duration::from_millis(250));
    let rpm = speed.load();
    drop(sim);

    if rpm <= 0.0 {
        eyre::bail!("self-check failed: simulated encoder published no speed");
    }
    println!("self-check: OK ({rpm:.0} RPM at 100% duty)");
    Ok(())
}
