//! Startup-threshold sweep: find the minimum duty that produces motion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use rig_traits::{Clock, Console, PwmOutput};

use crate::config::DetectCfg;
use crate::decoder::SpeedCell;
use crate::error::{Result, RigError};

const POLL: Duration = Duration::from_micros(500);

/// Sweep duty from 0% to 100% in 1% steps, holding `settle_ms` at each step
/// before checking the raw speed reading against the motion threshold.
///
/// Returns the first duty at which motion is detected, or `None` after a
/// full sweep without motion. Any complete incoming line during a hold
/// cancels the sweep (the line is consumed) and also yields `None`.
///
/// The speed cell is reset first so a stale reading cannot produce a false
/// early match. The actuator is left at whatever duty the sweep ended on;
/// the caller is responsible for zeroing it.
pub fn run_startup_sweep<P, C>(
    pwm: &mut P,
    console: &mut C,
    clock: &dyn Clock,
    speed: &SpeedCell,
    cfg: &DetectCfg,
    shutdown: &AtomicBool,
) -> Result<Option<u8>>
where
    P: PwmOutput,
    C: Console,
{
    speed.reset();
    tracing::info!(
        settle_ms = cfg.settle_ms,
        threshold_rpm = cfg.threshold_rpm,
        "startup sweep begin"
    );

    for duty in 0..=100u8 {
        pwm.set_duty_pct(duty)
            .map_err(|e| RigError::Pwm(e.to_string()))
            .wrap_err("applying sweep step")?;

        let hold_start = clock.now();
        while clock.ms_since(hold_start) < cfg.settle_ms {
            if shutdown.load(Ordering::Relaxed) || console.poll_line().is_some() {
                tracing::info!(duty, "startup sweep cancelled");
                return Ok(None);
            }
            clock.sleep(POLL);
        }

        let rpm = speed.load();
        if rpm > cfg.threshold_rpm {
            tracing::info!(duty, rpm, "motion detected");
            return Ok(Some(duty));
        }
    }

    tracing::info!("startup sweep exhausted, no motion");
    Ok(None)
}
