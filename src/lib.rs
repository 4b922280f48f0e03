//! Core library for the flipper_daq tools.
//!
//! Controls Thorlabs motorized filter flippers through the Kinesis SDK. The vendor
//! library sits behind the [`hardware::NativeMotionController`] trait so the same
//! driver runs against real hardware (feature `kinesis_sdk`) or the simulator in
//! [`hardware::mock`].

pub mod config;
pub mod error;
pub mod hardware;
pub mod units;

pub use error::{FlipperError, Result};
