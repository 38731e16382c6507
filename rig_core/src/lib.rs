#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motor characterization engine (hardware-agnostic).
//!
//! Drives a DC motor through controlled duty-cycle steps while decoding
//! optical encoder edges into a speed estimate, then exports timestamped
//! samples for offline model fitting. All hardware interactions go through
//! the `rig_traits::PwmOutput` and `rig_traits::Console` seams.
//!
//! ## Architecture
//!
//! - **Decoding**: encoder edges → shared RPM value (`decoder` module)
//! - **Smoothing**: display-only moving average (`filter` module)
//! - **Storage**: fixed-capacity sample buffer (`buffer` module)
//! - **Detection**: startup duty sweep (`startup` module)
//! - **Capture**: up/down duty staircase with paced sampling (`capture`)
//! - **Dispatch**: line-command grammar and mode arbitration (`command`)
//!
//! The concurrency model is one cooperative interpreter thread plus one
//! preemptive edge source; the only shared scalar is the atomic speed cell.

pub mod buffer;
pub mod capture;
pub mod command;
pub mod config;
pub mod conversions;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod mocks;
pub mod startup;
pub mod util;

pub use buffer::{Sample, SampleBuffer};
pub use capture::{CSV_END_MARKER, CSV_HEADER, CaptureOutcome, run_capture, staircase};
pub use command::{Command, CommandInterpreter, parse_line};
pub use config::{CaptureCfg, DetectCfg, EncoderCfg, FilterCfg, ManualCfg, RigCfg};
pub use decoder::{Edge, PulseDecoder, SpeedCell};
pub use error::{Result, RigError};
pub use filter::SpeedFilter;
pub use startup::run_startup_sweep;
