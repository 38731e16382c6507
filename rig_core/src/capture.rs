//! Stepped-excitation capture: rising/falling duty staircase with
//! fixed-period sampling, then a drain of the buffer as a CSV stream.
//!
//! Cadence is kept by comparing elapsed time against the configured period
//! at every poll-loop iteration, not by sleeping the whole period: the
//! timestamps stay synchronized to the run epoch and the encoder edge
//! source keeps firing throughout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use rig_traits::{Clock, Console, PwmOutput};

use crate::buffer::{Sample, SampleBuffer};
use crate::config::CaptureCfg;
use crate::decoder::SpeedCell;
use crate::error::{Result, RigError};

/// First line of the exported record stream.
pub const CSV_HEADER: &str = "tiempo_ms,pwm_porcentaje,rpm";
/// Completion sentinel consumed by the offline fitting tool.
pub const CSV_END_MARKER: &str = "CAPTURA_FINALIZADA";

/// Poll granularity inside dwell loops; well under the sample period so
/// cadence error stays bounded by one poll.
const POLL: Duration = Duration::from_micros(200);

/// How a capture run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed,
    /// Process shutdown was requested mid-run; duty is already zeroed and
    /// whatever was buffered has been drained.
    Interrupted,
}

/// Build the symmetric up/down duty staircase for a capture run.
///
/// Up: `0, step, ... <= 100`; down: `100 - step, ... >= 0`. A step of 0 or
/// above 100 is rejected here, before any actuation.
pub fn staircase(step_pct: u32) -> std::result::Result<Vec<u8>, RigError> {
    if step_pct == 0 || step_pct > 100 {
        return Err(RigError::InvalidStep(step_pct));
    }
    let step = step_pct as i32;
    let mut levels: Vec<u8> = Vec::new();
    let mut duty = 0i32;
    while duty <= 100 {
        levels.push(duty as u8);
        duty += step;
    }
    duty = 100 - step;
    while duty >= 0 {
        levels.push(duty as u8);
        duty -= step;
    }
    Ok(levels)
}

/// Drive one full capture run over pre-validated `levels`.
///
/// The buffer is cleared and the run epoch captured on entry; each level is
/// held for the configured dwell while the raw speed is sampled at the
/// configured period. On completion the duty is forced to 0 and the buffer
/// drains as `CSV_HEADER`, one row per sample, then `CSV_END_MARKER`.
#[allow(clippy::too_many_arguments)]
pub fn run_capture<P, C>(
    pwm: &mut P,
    console: &mut C,
    clock: &dyn Clock,
    speed: &SpeedCell,
    buffer: &mut SampleBuffer,
    cfg: &CaptureCfg,
    levels: &[u8],
    shutdown: &AtomicBool,
) -> Result<CaptureOutcome>
where
    P: PwmOutput,
    C: Console,
{
    buffer.clear();
    let epoch = clock.now();
    let period_us = cfg.sample_period_ms.saturating_mul(1_000).max(1);
    let mut last_sample_us: u64 = 0;

    tracing::info!(
        levels = levels.len(),
        dwell_ms = cfg.dwell_ms,
        sample_period_ms = cfg.sample_period_ms,
        "capture start"
    );

    let mut interrupted = false;
    'levels: for &duty in levels {
        pwm.set_duty_pct(duty)
            .map_err(|e| RigError::Pwm(e.to_string()))
            .wrap_err("applying capture level")?;
        tracing::debug!(duty, "capture level applied");

        let level_start = clock.now();
        while clock.ms_since(level_start) < cfg.dwell_ms {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("capture interrupted by shutdown");
                interrupted = true;
                break 'levels;
            }
            let now_us = clock.us_since(epoch);
            if now_us.saturating_sub(last_sample_us) >= period_us {
                buffer.push(Sample {
                    elapsed_ms: (now_us / 1_000) as u32,
                    duty_pct: duty,
                    rpm: speed.load(),
                });
                last_sample_us = now_us;
            }
            clock.sleep(POLL);
        }
    }

    // The actuator never holds excitation past the run, completed or not.
    pwm.set_duty_pct(0)
        .map_err(|e| RigError::Pwm(e.to_string()))
        .wrap_err("zeroing duty after capture")?;

    drain_csv(console, buffer)?;
    tracing::info!(
        samples = buffer.len(),
        dropped = buffer.dropped(),
        interrupted,
        "capture complete"
    );
    Ok(if interrupted {
        CaptureOutcome::Interrupted
    } else {
        CaptureOutcome::Completed
    })
}

/// Emit the buffered samples as the delimited record stream.
pub fn drain_csv<C: Console>(console: &mut C, buffer: &SampleBuffer) -> Result<()> {
    let write = |console: &mut C, line: &str| {
        console
            .write_line(line)
            .map_err(|e| RigError::Console(e.to_string()))
    };
    write(console, CSV_HEADER).wrap_err("writing csv header")?;
    for sample in buffer.iter() {
        write(console, &sample.csv_row()).wrap_err("writing csv row")?;
    }
    write(console, CSV_END_MARKER).wrap_err("writing csv end marker")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staircase_rejects_zero_and_oversized_steps() {
        assert!(matches!(staircase(0), Err(RigError::InvalidStep(0))));
        assert!(matches!(staircase(101), Err(RigError::InvalidStep(101))));
    }

    #[test]
    fn staircase_for_divisor_step_is_symmetric() {
        let seq = staircase(25).unwrap();
        assert_eq!(seq, vec![0, 25, 50, 75, 100, 75, 50, 25, 0]);
    }

    #[test]
    fn staircase_for_non_divisor_step_mirrors_from_full_scale() {
        // Up ramp tops out below 100; down ramp still starts at 100 - step.
        let seq = staircase(30).unwrap();
        assert_eq!(seq, vec![0, 30, 60, 90, 70, 40, 10]);
    }

    #[test]
    fn staircase_step_100_is_a_single_pulse() {
        let seq = staircase(100).unwrap();
        assert_eq!(seq, vec![0, 100, 0]);
    }
}
