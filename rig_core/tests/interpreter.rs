use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use rig_core::capture::{CSV_END_MARKER, CSV_HEADER};
use rig_core::command::{
    CommandInterpreter, RESP_BAD_STEP, RESP_DETECT_PREFIX, RESP_UNRECOGNIZED,
};
use rig_core::config::{CaptureCfg, DetectCfg, EncoderCfg, FilterCfg, ManualCfg, RigCfg};
use rig_core::decoder::SpeedCell;
use rig_core::mocks::ScriptedConsole;
use rig_traits::{Clock, TestClock};

// Drive spy: records every commanded duty and couples the steady-state
// speed straight into the shared cell so sweeps and captures see motion.
#[derive(Clone)]
struct SpyDrive {
    speed: Arc<SpeedCell>,
    gain: f32,
    deadband: u8,
    history: Arc<Mutex<Vec<u8>>>,
}

impl SpyDrive {
    fn new(speed: Arc<SpeedCell>, gain: f32, deadband: u8) -> Self {
        Self {
            speed,
            gain,
            deadband,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl rig_traits::PwmOutput for SpyDrive {
    fn set_duty_pct(&mut self, pct: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.history.lock().unwrap().push(pct);
        let rpm = if pct < self.deadband {
            0.0
        } else {
            f32::from(pct) * self.gain
        };
        self.speed.store(rpm);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.speed.store(0.0);
        Ok(())
    }
}

// Console driven by an explicit poll script: `None` entries are silent
// polls, letting a mode spin its loop on the test clock before the next
// line arrives.
struct SequencedConsole {
    script: VecDeque<Option<String>>,
    output: Arc<Mutex<Vec<String>>>,
}

impl SequencedConsole {
    fn new(script: Vec<Option<String>>) -> Self {
        Self {
            script: script.into(),
            output: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn output_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.output.clone()
    }
}

impl rig_traits::Console for SequencedConsole {
    fn poll_line(&mut self) -> Option<String> {
        self.script.pop_front().flatten()
    }

    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.output.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

// Console whose `write_line` fails on lines with a given prefix, for
// exercising the de-energize guarantee on the error path.
struct FailingConsole {
    script: VecDeque<Option<String>>,
    fail_prefix: &'static str,
}

impl FailingConsole {
    fn new(script: Vec<Option<String>>, fail_prefix: &'static str) -> Self {
        Self {
            script: script.into(),
            fail_prefix,
        }
    }
}

impl rig_traits::Console for FailingConsole {
    fn poll_line(&mut self) -> Option<String> {
        self.script.pop_front().flatten()
    }

    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        if line.starts_with(self.fail_prefix) {
            return Err(std::io::Error::other("console gone").into());
        }
        Ok(())
    }
}

fn line(s: &str) -> Option<String> {
    Some(s.to_string())
}

fn silence(n: usize) -> impl Iterator<Item = Option<String>> {
    std::iter::repeat_with(|| None).take(n)
}

fn test_cfg() -> RigCfg {
    RigCfg {
        encoder: EncoderCfg::default(),
        capture: CaptureCfg {
            dwell_ms: 8,
            sample_period_ms: 4,
            buffer_capacity: 4_096,
        },
        detect: DetectCfg {
            settle_ms: 2,
            threshold_rpm: 1.0,
        },
        manual: ManualCfg { report_ms: 2 },
        filter: FilterCfg { window: 4 },
    }
}

fn clock() -> Arc<dyn Clock + Send + Sync> {
    Arc::new(TestClock::new())
}

#[test]
fn start_capture_streams_the_full_csv_frame() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 0);
    let history = pwm.history.clone();
    let console = ScriptedConsole::new(["START 25", "EXIT"]);
    let out = console.output_handle();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    interp.run().unwrap();

    let out = out.lock().unwrap();
    assert_eq!(out.first().map(String::as_str), Some(CSV_HEADER));
    assert_eq!(out.last().map(String::as_str), Some(CSV_END_MARKER));

    // Rows are `elapsed,duty,rpm` and the duty column walks the staircase.
    let mut duties: Vec<u8> = Vec::new();
    for row in &out[1..out.len() - 1] {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 3, "malformed row: {row}");
        fields[0].parse::<u32>().unwrap();
        let duty: u8 = fields[1].parse().unwrap();
        fields[2].parse::<f32>().unwrap();
        if duties.last() != Some(&duty) {
            duties.push(duty);
        }
    }
    assert_eq!(duties, vec![0, 25, 50, 75, 100, 75, 50, 25, 0]);

    // The run ends de-energized.
    assert_eq!(history.lock().unwrap().last(), Some(&0));
}

#[test]
fn rejected_step_yields_diagnostic_without_actuation() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 0);
    let history = pwm.history.clone();
    let console = ScriptedConsole::new(["START 0", "EXIT"]);
    let out = console.output_handle();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    interp.run().unwrap();

    assert_eq!(out.lock().unwrap().as_slice(), [RESP_BAD_STEP.to_string()]);
    // Only the final force-idle ever touched the actuator.
    assert!(history.lock().unwrap().iter().all(|&d| d == 0));
}

#[test]
fn unknown_command_gets_exactly_one_diagnostic() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 0);
    let console = ScriptedConsole::new(["FOO", "EXIT"]);
    let out = console.output_handle();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    interp.run().unwrap();

    assert_eq!(
        out.lock().unwrap().as_slice(),
        [RESP_UNRECOGNIZED.to_string()]
    );
}

#[test]
fn manual_mode_announces_then_applies_clamped_updates() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 0);
    let history = pwm.history.clone();
    let console = ScriptedConsole::new(["PWM 40", "PWM 200", "EXIT"]);
    let out = console.output_handle();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    interp.run().unwrap();

    assert!(
        out.lock()
            .unwrap()
            .iter()
            .any(|l| l == "PWM manual 40% activo")
    );
    // Initial duty, clamped update, manual-exit zero, final force-idle zero.
    assert_eq!(history.lock().unwrap().as_slice(), [40, 100, 0, 0]);
}

#[test]
fn manual_mode_emits_live_readouts_and_a_csv_dump() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 0);
    let mut script = vec![line("PWM 40")];
    script.extend(silence(8));
    script.push(line("EXIT"));
    let console = SequencedConsole::new(script);
    let out = console.output_handle();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    interp.run().unwrap();

    let out = out.lock().unwrap();
    assert!(out.iter().any(|l| l == "PWM manual 40% activo"));

    // With a 2 ms report interval and 8 silent 1 ms polls there are a few
    // readout ticks before EXIT lands.
    let readouts: Vec<&String> = out.iter().filter(|l| l.starts_with("PWM=40%")).collect();
    assert!(!readouts.is_empty(), "no live readouts in {out:?}");
    assert!(readouts[0].contains("| RPM=") || readouts[0].contains("|  RPM="));

    // The accumulated display samples drain as a CSV frame on exit.
    let header_at = out.iter().position(|l| l == CSV_HEADER).unwrap();
    assert_eq!(out.last().map(String::as_str), Some(CSV_END_MARKER));
    for row in &out[header_at + 1..out.len() - 1] {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[1], "40");
    }
}

#[test]
fn console_failure_in_manual_mode_still_zeroes_duty() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 0);
    let history = pwm.history.clone();
    // The announce line goes through; the first live readout fails.
    let mut script = vec![line("PWM 40")];
    script.extend(silence(8));
    let console = FailingConsole::new(script, "PWM=");
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    let result = interp.run();

    assert!(result.is_err());
    let history = history.lock().unwrap();
    assert!(history.contains(&40));
    assert_eq!(history.last(), Some(&0), "duty left energized: {history:?}");
}

#[test]
fn console_failure_in_detect_report_still_zeroes_duty() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 35);
    let history = pwm.history.clone();
    let mut script = vec![line("DETECT")];
    script.extend(silence(400));
    script.push(line("EXIT"));
    let console = FailingConsole::new(script, RESP_DETECT_PREFIX);
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    let result = interp.run();

    assert!(result.is_err());
    let history = history.lock().unwrap();
    assert!(history.contains(&35), "sweep never reached 35: {history:?}");
    assert_eq!(history.last(), Some(&0), "duty left energized: {history:?}");
}

#[test]
fn detect_reports_the_found_duty() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 35);
    let history = pwm.history.clone();
    // Silent long enough to cover every sweep hold, then EXIT.
    let mut script = vec![line("DETECT")];
    script.extend(silence(400));
    script.push(line("EXIT"));
    let console = SequencedConsole::new(script);
    let out = console.output_handle();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    interp.run().unwrap();

    let out = out.lock().unwrap();
    assert!(
        out.iter().any(|l| l == &format!("{RESP_DETECT_PREFIX} 35%")),
        "missing detect report in {out:?}"
    );
    assert_eq!(history.lock().unwrap().last(), Some(&0));
}

#[test]
fn cancelled_sweep_reports_not_found() {
    let speed = Arc::new(SpeedCell::new());
    let pwm = SpyDrive::new(speed.clone(), 30.0, 35);
    // EXIT arrives during the first hold: the sweep consumes it as a
    // cancellation, so a second one is needed to leave the loop.
    let console = ScriptedConsole::new(["DETECT", "EXIT", "EXIT"]);
    let out = console.output_handle();
    let shutdown = Arc::new(AtomicBool::new(false));

    let mut interp =
        CommandInterpreter::new(pwm, console, clock(), speed, test_cfg(), shutdown);
    interp.run().unwrap();

    assert!(
        out.lock()
            .unwrap()
            .iter()
            .any(|l| l == &format!("{RESP_DETECT_PREFIX} no encontrado"))
    );
}
