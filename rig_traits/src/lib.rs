pub mod clock;

pub use clock::{Clock, MonotonicClock, TestClock};

/// PWM excitation output driving the motor.
///
/// `set_duty_pct` takes a percentage in [0, 100]; implementations map it to
/// whatever resolution the underlying channel has. `disable` must leave the
/// output de-energized regardless of the last commanded duty.
pub trait PwmOutput {
    fn set_duty_pct(
        &mut self,
        pct: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Line-oriented control channel (serial console, stdin, test script).
///
/// `poll_line` is non-blocking: `None` means no complete line has arrived
/// yet, which callers treat as a no-op, not an error.
pub trait Console {
    fn poll_line(&mut self) -> Option<String>;
    fn write_line(
        &mut self,
        line: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
