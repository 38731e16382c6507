//! Raspberry Pi backend: hardware PWM excitation and GPIO encoder input.
//!
//! Only compiled with the `hardware` feature on Linux. The encoder input
//! registers an async interrupt on both edges; the callback is the real
//! interrupt context here, so it only feeds the decoder and touches the
//! shared speed cell.

use std::sync::Arc;
use std::time::Instant;

use rig_core::config::EncoderCfg;
use rig_core::decoder::{Edge, PulseDecoder, SpeedCell};

use crate::error::{HwError, Result};

/// Excitation frequency matching the reference firmware.
const PWM_FREQ_HZ: f64 = 100_000.0;

/// Hardware PWM channel driving the motor's power stage.
pub struct HardwarePwm {
    pwm: rppal::pwm::Pwm,
}

impl HardwarePwm {
    /// `channel` is the Pi PWM channel index (0 or 1).
    pub fn new(channel: u8) -> Result<Self> {
        let channel = match channel {
            0 => rppal::pwm::Channel::Pwm0,
            1 => rppal::pwm::Channel::Pwm1,
            other => return Err(HwError::Pwm(format!("no such PWM channel: {other}"))),
        };
        let pwm = rppal::pwm::Pwm::with_frequency(
            channel,
            PWM_FREQ_HZ,
            0.0,
            rppal::pwm::Polarity::Normal,
            true,
        )
        .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(Self { pwm })
    }
}

impl rig_traits::PwmOutput for HardwarePwm {
    fn set_duty_pct(
        &mut self,
        pct: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pwm
            .set_duty_cycle(f64::from(pct.min(100)) / 100.0)
            .map_err(|e| Box::new(HwError::Pwm(e.to_string())) as _)
    }

    fn disable(
        &mut self,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pwm
            .set_duty_cycle(0.0)
            .and_then(|()| self.pwm.disable())
            .map_err(|e| Box::new(HwError::Pwm(e.to_string())) as _)
    }
}

/// Optical encoder input; keeps the pin (and with it the registered
/// interrupt) alive for the lifetime of the struct.
pub struct HardwareEncoder {
    _pin: rppal::gpio::InputPin,
}

impl HardwareEncoder {
    pub fn new(gpio_pin: u8, encoder: &EncoderCfg, speed: Arc<SpeedCell>) -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let mut pin = gpio
            .get(gpio_pin)
            .map_err(|e| HwError::Gpio(e.to_string()))?
            .into_input_pullup();

        let mut decoder = PulseDecoder::new(encoder);
        let epoch = Instant::now();
        pin.set_async_interrupt(rppal::gpio::Trigger::Both, move |level| {
            let t_us = epoch.elapsed().as_micros() as u64;
            let edge = match level {
                rppal::gpio::Level::High => Edge::Rising,
                rppal::gpio::Level::Low => Edge::Falling,
            };
            decoder.on_edge(edge, t_us, &speed);
        })
        .map_err(|e| HwError::Gpio(e.to_string()))?;

        Ok(Self { _pin: pin })
    }
}
