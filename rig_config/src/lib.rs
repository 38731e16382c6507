#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the motor characterization rig.
//!
//! `Config` and its sub-structs are deserialized from TOML and validated
//! before the engine is assembled. Every section has defaults matching the
//! reference hardware (20-slot encoder disc, 2 s dwell, 4 ms sampling).

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EncoderCfg {
    /// Slots in the encoder disc; one slot yields one opaque and one
    /// transparent sector per pass.
    pub slots: u32,
    /// Debounce: minimum accepted high-pulse duration in microseconds.
    pub min_pulse_us: u64,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            slots: 20,
            min_pulse_us: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CaptureCfg {
    /// Hold duration per duty level (ms).
    pub dwell_ms: u64,
    /// Sampling period during a dwell (ms).
    pub sample_period_ms: u64,
    /// Fixed sample buffer capacity (samples).
    pub buffer_capacity: usize,
}

impl Default for CaptureCfg {
    fn default() -> Self {
        Self {
            dwell_ms: 2_000,
            sample_period_ms: 4,
            buffer_capacity: 32_768,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectCfg {
    /// Hold per 1% sweep step before checking for motion (ms).
    pub settle_ms: u64,
    /// Raw speed above this counts as motion (RPM).
    pub threshold_rpm: f32,
}

impl Default for DetectCfg {
    fn default() -> Self {
        Self {
            settle_ms: 300,
            threshold_rpm: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ManualCfg {
    /// Live readout / display-sample interval (ms).
    pub report_ms: u64,
}

impl Default for ManualCfg {
    fn default() -> Self {
        Self { report_ms: 500 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FilterCfg {
    /// Moving-average window for the manual-mode display (readings).
    pub window: usize,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self { window: 10 }
    }
}

/// Physical wiring (hardware backend only; ignored in simulation).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    /// GPIO input wired to the optical sensor.
    pub encoder_in: u8,
    /// Hardware PWM channel index (0 or 1 on a Pi).
    pub pwm_channel: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            encoder_in: 5,
            pwm_channel: 0,
        }
    }
}

/// Simulated plant parameters (used when no hardware backend is selected).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Steady-state RPM gained per duty percent above the deadband.
    pub gain_rpm_per_pct: f32,
    /// Duty below which the simulated motor does not move.
    pub deadband_pct: u8,
    /// First-order time constant of the simulated plant (ms); 0 means the
    /// plant responds instantaneously.
    pub tau_ms: u64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            gain_rpm_per_pct: 30.0,
            deadband_pct: 30,
            tau_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    /// Path to a log file (JSON lines); console-only when absent.
    pub file: Option<String>,
    /// "error" | "warn" | "info" | "debug" | "trace"
    pub level: Option<String>,
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub encoder: EncoderCfg,
    pub capture: CaptureCfg,
    pub detect: DetectCfg,
    pub manual: ManualCfg,
    pub filter: FilterCfg,
    pub sim: SimCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Reject configurations the engine cannot run with. Called once at
    /// startup, before any actuation.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.encoder.slots == 0 {
            eyre::bail!("encoder.slots must be > 0");
        }
        if self.encoder.min_pulse_us == 0 {
            eyre::bail!("encoder.min_pulse_us must be > 0");
        }
        if self.capture.dwell_ms == 0 {
            eyre::bail!("capture.dwell_ms must be > 0");
        }
        if self.capture.sample_period_ms == 0 {
            eyre::bail!("capture.sample_period_ms must be > 0");
        }
        if self.capture.sample_period_ms > self.capture.dwell_ms {
            eyre::bail!("capture.sample_period_ms must not exceed capture.dwell_ms");
        }
        if self.capture.buffer_capacity == 0 {
            eyre::bail!("capture.buffer_capacity must be > 0");
        }
        if self.detect.settle_ms == 0 {
            eyre::bail!("detect.settle_ms must be > 0");
        }
        if !self.detect.threshold_rpm.is_finite() || self.detect.threshold_rpm <= 0.0 {
            eyre::bail!("detect.threshold_rpm must be a positive finite value");
        }
        if self.manual.report_ms == 0 {
            eyre::bail!("manual.report_ms must be > 0");
        }
        if self.filter.window == 0 {
            eyre::bail!("filter.window must be > 0");
        }
        if !self.sim.gain_rpm_per_pct.is_finite() || self.sim.gain_rpm_per_pct < 0.0 {
            eyre::bail!("sim.gain_rpm_per_pct must be a non-negative finite value");
        }
        if self.sim.deadband_pct > 100 {
            eyre::bail!("sim.deadband_pct must be within 0-100");
        }
        if self.pins.pwm_channel > 1 {
            eyre::bail!("pins.pwm_channel must be 0 or 1");
        }
        Ok(())
    }
}
