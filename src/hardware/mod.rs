//! Hardware layer: the native controller seam, its implementations, and the
//! filter flipper driver built on top of it.

pub mod capabilities;
pub mod filter_flipper;
#[cfg(feature = "kinesis_sdk")]
pub mod kinesis;
pub mod mock;
pub mod native;
pub mod position;

pub use capabilities::PositionSwitch;
pub use filter_flipper::{list_instruments, FlipperDevice, InstrumentParams, WaitOptions};
pub use native::{FirmwareVersion, HardwareInfo, NativeMotionController};
pub use position::{is_valid_position, Position};
