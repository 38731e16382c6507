//! Hardware backends for the characterization rig.
//!
//! The default build carries a simulated plant (first-order motor model
//! plus an encoder edge-generator thread) so the whole engine, including
//! the pulse decoder, runs without hardware. The `hardware` feature swaps
//! in `rppal`-backed PWM and GPIO edge interrupts on a Raspberry Pi.

pub mod error;
// rppal only builds on Linux, so the gate needs the target too.
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
pub mod sim;
pub mod stdio;

pub use sim::{EncoderSim, InstantDrive, PlantModel, SimulatedDrive};
pub use stdio::StdioConsole;
