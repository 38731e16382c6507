//! Encoder edge decoding into a shared speed estimate.
//!
//! `PulseDecoder` runs in the edge-source context (GPIO interrupt callback
//! or the simulated encoder thread) and must stay short and free of I/O.
//! The only state it shares with the cooperative side is `SpeedCell`, a
//! single atomic scalar: readers may observe a value that is one encoder
//! period stale, never a torn multi-field structure.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::EncoderCfg;
use crate::util::rpm_const_us;

/// One encoder input transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Lock-free single-writer speed value in RPM.
///
/// Stored as f32 bits in an `AtomicU32`; Relaxed ordering is sufficient
/// because there is exactly one writer and readers tolerate staleness.
#[derive(Debug, Default)]
pub struct SpeedCell(AtomicU32);

impl SpeedCell {
    pub fn new() -> Self {
        Self(AtomicU32::new(0f32.to_bits()))
    }

    #[inline]
    pub fn store(&self, rpm: f32) {
        self.0.store(rpm.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Reset to zero so a stale reading cannot leak into a new mode.
    #[inline]
    pub fn reset(&self) {
        self.store(0.0);
    }
}

/// Converts encoder edge timing into the current speed estimate.
///
/// A rising edge marks the start of a high pulse; the matching falling edge
/// yields its duration. Durations at or above the debounce threshold become
/// `rpm_const_us / dt`; shorter ones are contact bounce and are discarded,
/// leaving the previous reading in place.
pub struct PulseDecoder {
    rpm_const_us: u64,
    min_pulse_us: u64,
    high_start_us: Option<u64>,
}

impl PulseDecoder {
    pub fn new(cfg: &EncoderCfg) -> Self {
        Self {
            rpm_const_us: rpm_const_us(cfg.sectors_per_rev),
            min_pulse_us: cfg.min_pulse_us,
            high_start_us: None,
        }
    }

    /// Feed one edge with its monotonic microsecond timestamp.
    pub fn on_edge(&mut self, edge: Edge, t_us: u64, speed: &SpeedCell) {
        match edge {
            Edge::Rising => {
                self.high_start_us = Some(t_us);
            }
            Edge::Falling => {
                // A falling edge without a recorded rising edge means the
                // rising interrupt was lost; discard the measurement.
                let Some(start) = self.high_start_us.take() else {
                    return;
                };
                let dt = t_us.saturating_sub(start);
                if dt < self.min_pulse_us {
                    tracing::trace!(dt_us = dt, "pulse below debounce threshold, discarded");
                    return;
                }
                speed.store(self.rpm_const_us as f32 / dt as f32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> PulseDecoder {
        PulseDecoder::new(&EncoderCfg::default())
    }

    #[test]
    fn falling_without_rising_is_ignored() {
        let cell = SpeedCell::new();
        let mut d = decoder();
        d.on_edge(Edge::Falling, 5_000, &cell);
        assert_eq!(cell.load(), 0.0);
    }

    #[test]
    fn qualifying_pulse_publishes_const_over_dt() {
        let cell = SpeedCell::new();
        let mut d = decoder();
        d.on_edge(Edge::Rising, 1_000, &cell);
        d.on_edge(Edge::Falling, 2_000, &cell);
        // 40 sectors/rev -> const 1_500_000 us; dt 1000 us -> 1500 rpm
        assert!((cell.load() - 1_500.0).abs() < f32::EPSILON * 1_500.0);
    }

    #[test]
    fn bounce_keeps_previous_reading() {
        let cell = SpeedCell::new();
        let mut d = decoder();
        d.on_edge(Edge::Rising, 0, &cell);
        d.on_edge(Edge::Falling, 1_000, &cell);
        let before = cell.load();
        d.on_edge(Edge::Rising, 2_000, &cell);
        d.on_edge(Edge::Falling, 2_050, &cell); // 50 us < 100 us threshold
        assert_eq!(cell.load(), before);
    }
}
