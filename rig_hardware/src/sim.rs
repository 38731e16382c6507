//! Simulated motor plant and encoder edge source.
//!
//! `PlantModel` holds the commanded duty and the first-order response
//! parameters; `SimulatedDrive` is the `PwmOutput` writing into it, and
//! `EncoderSim` is a thread that turns the modeled speed into rising and
//! falling edges fed through the real `PulseDecoder`, so the live speed
//! path is exercised end to end.
//!
//! Safety: `EncoderSim` spawns exactly one thread that is shut down and
//! joined when it is dropped, preventing thread leaks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use rig_core::config::EncoderCfg;
use rig_core::decoder::{Edge, PulseDecoder, SpeedCell};
use rig_core::util::rpm_const_us;

/// Shared plant state: commanded duty plus the response model.
///
/// Duty is the single scalar shared between the drive (writer, interpreter
/// thread) and the encoder thread (reader); an atomic u8 keeps the seam
/// lock-free like the speed cell on the other side.
#[derive(Debug)]
pub struct PlantModel {
    duty_pct: AtomicU8,
    gain_rpm_per_pct: f32,
    deadband_pct: u8,
    tau_ms: u64,
}

impl PlantModel {
    pub fn new(gain_rpm_per_pct: f32, deadband_pct: u8, tau_ms: u64) -> Self {
        Self {
            duty_pct: AtomicU8::new(0),
            gain_rpm_per_pct,
            deadband_pct,
            tau_ms,
        }
    }

    pub fn set_duty(&self, pct: u8) {
        self.duty_pct.store(pct.min(100), Ordering::Relaxed);
    }

    pub fn duty(&self) -> u8 {
        self.duty_pct.load(Ordering::Relaxed)
    }

    /// Steady-state speed for the current duty: zero below the deadband,
    /// proportional to duty once the motor has broken away.
    pub fn steady_rpm(&self) -> f32 {
        let duty = self.duty();
        if duty < self.deadband_pct {
            0.0
        } else {
            f32::from(duty) * self.gain_rpm_per_pct
        }
    }

    /// Advance the modeled speed by `dt_ms` toward steady state.
    pub fn advance(&self, rpm: f32, dt_ms: f32) -> f32 {
        let steady = self.steady_rpm();
        if self.tau_ms == 0 {
            return steady;
        }
        let alpha = 1.0 - (-dt_ms / self.tau_ms as f32).exp();
        rpm + (steady - rpm) * alpha
    }
}

/// `PwmOutput` backed by the simulated plant.
pub struct SimulatedDrive {
    plant: Arc<PlantModel>,
}

impl SimulatedDrive {
    pub fn new(plant: Arc<PlantModel>) -> Self {
        Self { plant }
    }
}

impl rig_traits::PwmOutput for SimulatedDrive {
    fn set_duty_pct(
        &mut self,
        pct: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.plant.set_duty(pct);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.plant.set_duty(0);
        Ok(())
    }
}

/// A drive that bypasses the edge path and writes the steady-state speed
/// straight into the speed cell on every duty change. Deterministic and
/// clock-free; meant for tests that pair it with a `TestClock`.
pub struct InstantDrive {
    speed: Arc<SpeedCell>,
    gain_rpm_per_pct: f32,
    deadband_pct: u8,
}

impl InstantDrive {
    pub fn new(speed: Arc<SpeedCell>, gain_rpm_per_pct: f32, deadband_pct: u8) -> Self {
        Self {
            speed,
            gain_rpm_per_pct,
            deadband_pct,
        }
    }
}

impl rig_traits::PwmOutput for InstantDrive {
    fn set_duty_pct(
        &mut self,
        pct: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let rpm = if pct < self.deadband_pct {
            0.0
        } else {
            f32::from(pct) * self.gain_rpm_per_pct
        };
        self.speed.store(rpm);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.speed.store(0.0);
        Ok(())
    }
}

/// Background thread generating encoder edges from the modeled speed.
pub struct EncoderSim {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl EncoderSim {
    /// Spawn the edge source. Owns its `PulseDecoder`; the only output is
    /// the shared speed cell, exactly like a GPIO interrupt would produce.
    pub fn spawn(plant: Arc<PlantModel>, speed: Arc<SpeedCell>, encoder: &EncoderCfg) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let mut decoder = PulseDecoder::new(encoder);
        let rpm_const = rpm_const_us(encoder.sectors_per_rev);

        let join_handle = std::thread::spawn(move || {
            let epoch = Instant::now();
            let us_now = move || epoch.elapsed().as_micros() as u64;
            let mut rpm = 0.0f32;
            let mut last_update = Instant::now();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("encoder sim received shutdown signal");
                    break;
                }

                let now = Instant::now();
                let dt_ms = now.duration_since(last_update).as_secs_f32() * 1_000.0;
                last_update = now;
                rpm = plant.advance(rpm, dt_ms);

                if rpm < 0.5 {
                    // Shaft effectively stopped: no edges, just idle.
                    std::thread::sleep(Duration::from_millis(5));
                    continue;
                }

                // One high pulse spans one sector; the low gap matches it.
                let sector_us = ((rpm_const as f32 / rpm) as u64).clamp(20, 50_000);
                decoder.on_edge(Edge::Rising, us_now(), &speed);
                std::thread::sleep(Duration::from_micros(sector_us));
                decoder.on_edge(Edge::Falling, us_now(), &speed);
                std::thread::sleep(Duration::from_micros(sector_us));
            }
            tracing::trace!("encoder sim thread exiting cleanly");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for EncoderSim {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "encoder sim thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plant_deadband_produces_no_speed() {
        let plant = PlantModel::new(30.0, 35, 0);
        plant.set_duty(34);
        assert_eq!(plant.steady_rpm(), 0.0);
        // Breakaway happens at the deadband itself, not one step above.
        plant.set_duty(35);
        assert_eq!(plant.steady_rpm(), 30.0 * 35.0);
    }

    #[test]
    fn first_order_response_converges() {
        let plant = PlantModel::new(10.0, 0, 100);
        plant.set_duty(50);
        let mut rpm = 0.0;
        for _ in 0..100 {
            rpm = plant.advance(rpm, 50.0);
        }
        assert!((rpm - plant.steady_rpm()).abs() < 1.0);
    }

    #[test]
    fn encoder_sim_publishes_speed_for_running_plant() {
        let plant = Arc::new(PlantModel::new(30.0, 0, 0));
        let speed = Arc::new(SpeedCell::new());
        plant.set_duty(50); // 1500 rpm steady, sector 1000 us
        let sim = EncoderSim::spawn(plant, speed.clone(), &EncoderCfg::default());
        std::thread::sleep(Duration::from_millis(100));
        let rpm = speed.load();
        drop(sim);
        assert!(rpm > 0.0, "expected edges to publish a nonzero speed");
    }
}
