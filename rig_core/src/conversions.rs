//! `From` implementations bridging `rig_config` types to `rig_core` types.

use crate::config::{CaptureCfg, DetectCfg, EncoderCfg, FilterCfg, ManualCfg, RigCfg};

impl From<&rig_config::EncoderCfg> for EncoderCfg {
    fn from(c: &rig_config::EncoderCfg) -> Self {
        Self {
            // Each slot contributes an opaque and a transparent sector.
            sectors_per_rev: c.slots.saturating_mul(2),
            min_pulse_us: c.min_pulse_us,
        }
    }
}

impl From<&rig_config::CaptureCfg> for CaptureCfg {
    fn from(c: &rig_config::CaptureCfg) -> Self {
        Self {
            dwell_ms: c.dwell_ms,
            sample_period_ms: c.sample_period_ms,
            buffer_capacity: c.buffer_capacity,
        }
    }
}

impl From<&rig_config::DetectCfg> for DetectCfg {
    fn from(c: &rig_config::DetectCfg) -> Self {
        Self {
            settle_ms: c.settle_ms,
            threshold_rpm: c.threshold_rpm,
        }
    }
}

impl From<&rig_config::ManualCfg> for ManualCfg {
    fn from(c: &rig_config::ManualCfg) -> Self {
        Self {
            report_ms: c.report_ms,
        }
    }
}

impl From<&rig_config::FilterCfg> for FilterCfg {
    fn from(c: &rig_config::FilterCfg) -> Self {
        Self { window: c.window }
    }
}

impl From<&rig_config::Config> for RigCfg {
    fn from(c: &rig_config::Config) -> Self {
        Self {
            encoder: (&c.encoder).into(),
            capture: (&c.capture).into(),
            detect: (&c.detect).into(),
            manual: (&c.manual).into(),
            filter: (&c.filter).into(),
        }
    }
}
