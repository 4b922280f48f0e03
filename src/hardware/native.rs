//! Native motion controller interface
//!
//! Narrow, capability-typed view of the vendor control layer. Everything crossing
//! this boundary is in native units: serial strings, integer position codes and
//! whole milliseconds. Conversion to [`Position`](super::Position) and
//! [`Duration`](std::time::Duration) is the device wrapper's job.
//!
//! Two implementations exist:
//! - [`KinesisController`](super::kinesis::KinesisController) binds the real SDK
//!   (feature `kinesis_sdk`)
//! - [`MockFlipperController`](super::mock::MockFlipperController) simulates devices
//!   for tests and the `sim` backend of the CLI

use std::fmt;

use serde::Serialize;

use crate::error::Result;

/// Packed version number as reported by the SDK (`major.interim.minor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    /// Major version
    pub major: u8,
    /// Interim version
    pub interim: u8,
    /// Minor version
    pub minor: u8,
}

impl FirmwareVersion {
    /// Decode the `DWORD` layout used by the SDK: byte 2 major, byte 1 interim,
    /// byte 0 minor.
    pub fn from_packed(packed: u32) -> Self {
        Self {
            major: ((packed >> 16) & 0xFF) as u8,
            interim: ((packed >> 8) & 0xFF) as u8,
            minor: (packed & 0xFF) as u8,
        }
    }

    /// Encode back into the SDK `DWORD` layout.
    pub fn packed(&self) -> u32 {
        (u32::from(self.major) << 16) | (u32::from(self.interim) << 8) | u32::from(self.minor)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.interim, self.minor)
    }
}

/// Hardware description returned by `FF_GetHardwareInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HardwareInfo {
    /// Model number, e.g. `MFF101`
    pub model_number: String,
    /// Hardware type code
    pub hardware_type: u16,
    /// Number of channels
    pub num_channels: u16,
    /// Free-form device notes
    pub notes: String,
    /// Firmware version
    pub firmware_version: FirmwareVersion,
    /// Hardware revision
    pub hardware_version: u16,
    /// Modification state
    pub modification_state: u16,
}

/// Split the comma-separated serial list written by `TLI_GetDeviceListByTypeExt`.
///
/// The buffer is NUL padded and usually ends with a trailing comma.
pub fn parse_serial_list(buffer: &str) -> Vec<String> {
    buffer
        .split(',')
        .map(|entry| entry.trim_matches(|c: char| c == '\0' || c.is_whitespace()))
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Vendor motion-controller operations consumed by the flipper driver.
///
/// Calls are synchronous and return as soon as the SDK acknowledges them. Motion
/// itself is asynchronous: the SDK's own polling thread refreshes the state that
/// [`position`](Self::position) reads.
pub trait NativeMotionController: Send + Sync {
    /// Rescan the USB bus for Kinesis devices.
    fn build_device_list(&self) -> Result<()>;

    /// Serial numbers of every attached device of the given type code.
    fn device_list_by_type(&self, type_id: i32) -> Result<Vec<String>>;

    fn open(&self, serial: &str) -> Result<()>;
    fn close(&self, serial: &str) -> Result<()>;

    /// Blink the front-panel LED.
    fn identify(&self, serial: &str) -> Result<()>;

    /// Load the settings persisted in the device's EEPROM.
    fn load_settings(&self, serial: &str) -> Result<()>;
    fn persist_settings(&self, serial: &str) -> Result<()>;

    fn start_polling(&self, serial: &str, period_ms: i32) -> Result<()>;
    fn stop_polling(&self, serial: &str) -> Result<()>;
    /// Current polling period in milliseconds (0 when not polling).
    fn polling_duration(&self, serial: &str) -> Result<i64>;

    fn transit_time(&self, serial: &str) -> Result<u32>;
    fn set_transit_time(&self, serial: &str, transit_ms: u32) -> Result<()>;

    /// Start a move to position code 1 or 2 and return immediately.
    fn move_to_position(&self, serial: &str, code: i32) -> Result<()>;

    /// Position code from the last status poll (0 = moving).
    fn position(&self, serial: &str) -> Result<i32>;

    fn home(&self, serial: &str) -> Result<()>;

    fn request_status(&self, serial: &str) -> Result<()>;
    fn status_bits(&self, serial: &str) -> Result<u32>;

    fn number_of_positions(&self, serial: &str) -> Result<i32>;
    fn hardware_info(&self, serial: &str) -> Result<HardwareInfo>;
    fn software_version(&self, serial: &str) -> Result<FirmwareVersion>;
}
