//! Common time/unit helpers for rig_core.

/// Number of microseconds in one minute.
pub const MICROS_PER_MIN: u64 = 60_000_000;

/// RPM conversion constant for an encoder disc: one high pulse spans one
/// sector, so `rpm = rpm_const_us(sectors) / pulse_us`.
/// Clamps `sectors_per_rev` to at least 1 to avoid division by zero.
#[inline]
pub fn rpm_const_us(sectors_per_rev: u32) -> u64 {
    MICROS_PER_MIN / u64::from(sectors_per_rev.max(1))
}

/// Clamp an arbitrary parsed duty value into the valid [0, 100] percent range.
#[inline]
pub fn clamp_duty(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}
