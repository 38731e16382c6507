//! Runtime configuration for the characterization engine.
//!
//! These are the structs the engine consumes at run time. They are separate
//! from the TOML-deserialized schema in `rig_config`; `conversions` bridges
//! the two.

/// Encoder disc geometry and debounce.
#[derive(Debug, Clone)]
pub struct EncoderCfg {
    /// Sectors per revolution (slots * 2 for an opaque/transparent disc).
    pub sectors_per_rev: u32,
    /// Minimum accepted high-pulse duration; shorter pulses are bounce.
    pub min_pulse_us: u64,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            sectors_per_rev: 40,
            min_pulse_us: 100,
        }
    }
}

/// Stepped-capture timing and buffering.
#[derive(Debug, Clone)]
pub struct CaptureCfg {
    /// Hold duration at each duty level.
    pub dwell_ms: u64,
    /// Sampling period during a dwell, measured against real elapsed time.
    pub sample_period_ms: u64,
    /// Fixed sample buffer capacity; overflow drops further samples.
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

/// Startup-threshold sweep parameters.
#[derive(Debug, Clone)]
pub struct DetectCfg {
    /// Hold duration at each 1% sweep step before checking for motion.
    pub settle_ms: u64,
    /// Raw speed above this counts as detected motion.
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

/// Manual-mode live display.
#[derive(Debug, Clone)]
pub struct ManualCfg {
    /// Interval between live readout lines / display samples.
    pub report_ms: u64,
}

impl Default for ManualCfg {
    fn default() -> Self {
        Self { report_ms: 500 }
    }
}

/// Display smoothing window (readings).
#[derive(Debug, Clone)]
pub struct FilterCfg {
    pub window: usize,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self { window: 10 }
    }
}

/// Aggregate engine configuration.
#[derive(Debug, Clone, Default)]
pub struct RigCfg {
    pub encoder: EncoderCfg,
    pub capture: CaptureCfg,
    pub detect: DetectCfg,
    pub manual: ManualCfg,
    pub filter: FilterCfg,
}
