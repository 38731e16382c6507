//! Line-oriented command grammar and the top-level dispatcher.
//!
//! One command per line, case-insensitive, surrounding whitespace trimmed:
//! a keyword plus an optional single numeric argument. Parsing yields a
//! tagged `Command` so classification lives here rather than as string
//! comparisons strewn through control flow.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use rig_traits::{Clock, Console, PwmOutput};

use crate::buffer::{Sample, SampleBuffer};
use crate::capture::{CaptureOutcome, drain_csv, run_capture, staircase};
use crate::config::RigCfg;
use crate::decoder::SpeedCell;
use crate::error::{Result, RigError};
use crate::filter::SpeedFilter;
use crate::startup::run_startup_sweep;
use crate::util::clamp_duty;

/// Diagnostic for lines that match no command.
pub const RESP_UNRECOGNIZED: &str = "Comando no reconocido.";
/// Diagnostic for a rejected capture step.
pub const RESP_BAD_STEP: &str = "ERROR: paso 1-100";
/// Prefix of the startup-sweep report line.
pub const RESP_DETECT_PREFIX: &str = "PWM mínimo de arranque:";

/// Idle poll granularity of the top-level command loop.
const POLL: Duration = Duration::from_millis(1);

/// A parsed instruction from one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    Detect,
    /// Capture with the given step percentage; range-checked at dispatch,
    /// before any actuation.
    StartCapture(u32),
    /// Manual duty, already clamped to [0, 100].
    SetManualDuty(u8),
    Unrecognized,
}

/// Tokenize one input line into a `Command`.
pub fn parse_line(line: &str) -> Command {
    let norm = line.trim().to_ascii_uppercase();
    let mut tokens = norm.split_whitespace();
    let Some(keyword) = tokens.next() else {
        return Command::Unrecognized;
    };
    let arg = tokens.next();
    if tokens.next().is_some() {
        return Command::Unrecognized;
    }
    match (keyword, arg) {
        ("EXIT", None) => Command::Exit,
        ("DETECT" | "DETECTAR", None) => Command::Detect,
        ("START", Some(v)) => match v.parse::<u32>() {
            Ok(step) => Command::StartCapture(step),
            Err(_) => Command::Unrecognized,
        },
        ("PWM", Some(v)) => match v.parse::<i64>() {
            Ok(pct) => Command::SetManualDuty(clamp_duty(pct)),
            Err(_) => Command::Unrecognized,
        },
        _ => Command::Unrecognized,
    }
}

enum Flow {
    Continue,
    Halt,
}

/// Top-level dispatcher owning the engine context: the excitation output,
/// the control channel, the clock, the shared speed cell, and the sample
/// buffer. Mode discipline lives here: exactly one mode drives the
/// actuator at a time, and every mode exit forces duty back to 0.
pub struct CommandInterpreter<P: PwmOutput, C: Console> {
    pwm: P,
    console: C,
    clock: Arc<dyn Clock + Send + Sync>,
    speed: Arc<SpeedCell>,
    filter: SpeedFilter,
    buffer: SampleBuffer,
    cfg: RigCfg,
    shutdown: Arc<AtomicBool>,
}

impl<P: PwmOutput, C: Console> CommandInterpreter<P, C> {
    pub fn new(
        pwm: P,
        console: C,
        clock: Arc<dyn Clock + Send + Sync>,
        speed: Arc<SpeedCell>,
        cfg: RigCfg,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let filter = SpeedFilter::new(cfg.filter.window);
        let buffer = SampleBuffer::new(cfg.capture.buffer_capacity);
        Self {
            pwm,
            console,
            clock,
            speed,
            filter,
            buffer,
            cfg,
            shutdown,
        }
    }

    /// Run the command loop until `EXIT` or process shutdown. Always leaves
    /// the actuator de-energized, on the error path included.
    pub fn run(&mut self) -> Result<()> {
        let result = self.run_loop();
        let idle = self.force_idle();
        result?;
        idle
    }

    fn run_loop(&mut self) -> Result<()> {
        tracing::info!("command interpreter ready");
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("shutdown flag set, leaving command loop");
                return Ok(());
            }
            let Some(line) = self.console.poll_line() else {
                self.clock.sleep(POLL);
                continue;
            };
            let cmd = parse_line(&line);
            tracing::debug!(?cmd, line = line.trim(), "command received");
            match self.dispatch(cmd)? {
                Flow::Continue => {}
                Flow::Halt => return Ok(()),
            }
        }
    }

    fn dispatch(&mut self, cmd: Command) -> Result<Flow> {
        match cmd {
            Command::Exit => {
                tracing::info!("exit requested");
                Ok(Flow::Halt)
            }
            Command::Detect => {
                let found = run_startup_sweep(
                    &mut self.pwm,
                    &mut self.console,
                    &*self.clock,
                    &self.speed,
                    &self.cfg.detect,
                    &self.shutdown,
                )?;
                // The sweep leaves the actuator at the detected duty; zero
                // it before anything that can still fail.
                self.force_idle()?;
                let report = match found {
                    Some(duty) => format!("{RESP_DETECT_PREFIX} {duty}%"),
                    None => format!("{RESP_DETECT_PREFIX} no encontrado"),
                };
                self.say(&report)?;
                Ok(Flow::Continue)
            }
            Command::StartCapture(step) => match staircase(step) {
                Err(err) => {
                    tracing::warn!(step, %err, "capture step rejected");
                    self.say(RESP_BAD_STEP)?;
                    Ok(Flow::Continue)
                }
                Ok(levels) => {
                    let outcome = run_capture(
                        &mut self.pwm,
                        &mut self.console,
                        &*self.clock,
                        &self.speed,
                        &mut self.buffer,
                        &self.cfg.capture,
                        &levels,
                        &self.shutdown,
                    )?;
                    match outcome {
                        CaptureOutcome::Completed => Ok(Flow::Continue),
                        CaptureOutcome::Interrupted => Ok(Flow::Halt),
                    }
                }
            },
            Command::SetManualDuty(pct) => match self.manual_mode(pct)? {
                Some(next) => self.dispatch(next),
                None => Ok(Flow::Halt),
            },
            Command::Unrecognized => {
                self.say(RESP_UNRECOGNIZED)?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Manual excitation mode: apply a fixed duty, accept further `PWM`
    /// updates, and on every report tick record a display sample of
    /// (elapsed, duty, filtered speed) and echo a live readout.
    ///
    /// Any non-`PWM` command terminates the mode and is returned for normal
    /// dispatch by the caller; `None` means process shutdown. On exit the
    /// duty is zeroed and the accumulated display samples drain as a CSV
    /// dump.
    fn manual_mode(&mut self, initial_pct: u8) -> Result<Option<Command>> {
        let terminator = self.manual_loop(initial_pct);
        // Zero the duty before surfacing any failure from the loop.
        let idle = self.apply_duty(0);
        let terminator = terminator?;
        idle?;
        if !self.buffer.is_empty() {
            drain_csv(&mut self.console, &self.buffer)?;
        }
        tracing::info!(samples = self.buffer.len(), "manual mode ended");
        Ok(terminator)
    }

    fn manual_loop(&mut self, initial_pct: u8) -> Result<Option<Command>> {
        let mut duty = initial_pct;
        self.apply_duty(duty)?;
        self.say(&format!("PWM manual {duty}% activo"))?;

        self.buffer.clear();
        self.filter.reset();
        let epoch = self.clock.now();
        let mut last_report = epoch;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if let Some(line) = self.console.poll_line() {
                match parse_line(&line) {
                    Command::SetManualDuty(pct) => {
                        duty = pct;
                        self.apply_duty(duty)?;
                        tracing::debug!(duty, "manual duty updated");
                    }
                    other => return Ok(Some(other)),
                }
            }
            if self.clock.ms_since(last_report) >= self.cfg.manual.report_ms {
                let smoothed = self.filter.push(self.speed.load());
                self.buffer.push(Sample {
                    elapsed_ms: self.clock.ms_since(epoch) as u32,
                    duty_pct: duty,
                    rpm: smoothed,
                });
                self.say(&format!("PWM={duty}%  |  RPM={smoothed:.2}"))?;
                last_report = self.clock.now();
            }
            self.clock.sleep(POLL);
        }
    }

    fn apply_duty(&mut self, pct: u8) -> Result<()> {
        self.pwm
            .set_duty_pct(pct)
            .map_err(|e| RigError::Pwm(e.to_string()))
            .wrap_err("applying manual duty")
    }

    /// Zero and disable the excitation output.
    fn force_idle(&mut self) -> Result<()> {
        self.pwm
            .set_duty_pct(0)
            .and_then(|()| self.pwm.disable())
            .map_err(|e| RigError::Pwm(e.to_string()))
            .wrap_err("forcing idle excitation")
    }

    fn say(&mut self, line: &str) -> Result<()> {
        self.console
            .write_line(line)
            .map_err(|e| RigError::Console(e.to_string()))
            .wrap_err("writing response")
    }
}
