//! Mock Hardware Implementations
//!
//! Provides a simulated Kinesis controller for testing without physical hardware.
//!
//! # Simulation model
//!
//! - Devices are attached by serial number and must be opened before use
//! - A move (or home) makes the device report `Moving` for a configurable number of
//!   position polls, then the target position
//! - Position only advances while status polling is running, as on the real SDK
//! - Every call is journaled under its vendor function name so tests can count them
//! - Failures can be injected per vendor function with an arbitrary return code

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use tracing::debug;

use super::native::{FirmwareVersion, HardwareInfo, NativeMotionController};
use super::Position;
use crate::error::{FlipperError, Result};

/// FTDI "device not found" return code.
const DEVICE_NOT_FOUND: i16 = 0x02;
/// FTDI "device not opened" return code.
const DEVICE_NOT_OPENED: i16 = 0x03;
/// Kinesis "invalid position" return code.
const INVALID_POSITION: i16 = 0x26;

const DEFAULT_TRANSIT_MS: u32 = 500;
const DEFAULT_MOVING_POLLS: u32 = 3;

/// One journaled call against the mock controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Vendor function name, e.g. `FF_MoveToPosition`
    pub function: &'static str,
    /// Serial number argument, if the function takes one
    pub serial: Option<String>,
}

#[derive(Debug, Clone)]
struct MockDevice {
    open: bool,
    settings_loaded: bool,
    polling_ms: Option<i32>,
    transit_ms: u32,
    position: Position,
    pending: Option<PendingMove>,
    hardware_info: HardwareInfo,
}

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    target: Position,
    polls_remaining: u32,
}

impl MockDevice {
    fn new(serial: &str) -> Self {
        Self {
            open: false,
            settings_loaded: false,
            polling_ms: None,
            transit_ms: DEFAULT_TRANSIT_MS,
            position: Position::One,
            pending: None,
            hardware_info: HardwareInfo {
                model_number: "MFF101".to_string(),
                hardware_type: 44,
                num_channels: 1,
                notes: format!("Simulated filter flipper {}", serial),
                firmware_version: FirmwareVersion::from_packed(0x0001_0007),
                hardware_version: 1,
                modification_state: 0,
            },
        }
    }

    fn reported_code(&mut self) -> i32 {
        if self.polling_ms.is_some() {
            if let Some(mut pending) = self.pending.take() {
                if pending.polls_remaining == 0 {
                    self.position = pending.target;
                } else {
                    pending.polls_remaining -= 1;
                    self.position = Position::Moving;
                    self.pending = Some(pending);
                }
            }
        }
        self.position.native_code()
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: BTreeMap<String, MockDevice>,
    journal: Vec<MockCall>,
    failures: HashMap<&'static str, i16>,
    moving_polls: u32,
}

/// Simulated Kinesis controller hosting any number of filter flippers.
///
/// # Example
///
/// ```rust
/// use flipper_daq::hardware::mock::MockFlipperController;
/// use flipper_daq::hardware::NativeMotionController;
///
/// let controller = MockFlipperController::new().with_device("37000001");
/// controller.open("37000001").unwrap();
/// assert_eq!(controller.calls("FF_Open"), 1);
/// ```
#[derive(Debug)]
pub struct MockFlipperController {
    state: Mutex<MockState>,
}

impl MockFlipperController {
    /// Create a controller with no attached devices.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                moving_polls: DEFAULT_MOVING_POLLS,
                ..MockState::default()
            }),
        }
    }

    /// Attach a device with the given serial number.
    pub fn with_device(self, serial: &str) -> Self {
        self.attach(serial);
        self
    }

    /// Number of position polls a move reports `Moving` before arriving.
    pub fn with_moving_polls(self, polls: u32) -> Self {
        self.state.lock().moving_polls = polls;
        self
    }

    /// Attach a device at runtime; existing state is kept.
    pub fn attach(&self, serial: &str) {
        self.state
            .lock()
            .devices
            .entry(serial.to_string())
            .or_insert_with(|| MockDevice::new(serial));
    }

    /// Unplug a device.
    pub fn detach(&self, serial: &str) {
        self.state.lock().devices.remove(serial);
    }

    /// Force the reported position, cancelling any move in progress.
    pub fn set_position(&self, serial: &str, position: Position) {
        if let Some(device) = self.state.lock().devices.get_mut(serial) {
            device.position = position;
            device.pending = None;
        }
    }

    /// Make every subsequent call to `function` fail with `code`.
    pub fn fail_on(&self, function: &'static str, code: i16) {
        self.state.lock().failures.insert(function, code);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Number of journaled calls to the given vendor function.
    pub fn calls(&self, function: &str) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|call| call.function == function)
            .count()
    }

    /// Snapshot of every call made so far, in order.
    pub fn journal(&self) -> Vec<MockCall> {
        self.state.lock().journal.clone()
    }

    /// Number of move commands issued so far.
    pub fn move_commands(&self) -> usize {
        self.calls("FF_MoveToPosition")
    }

    /// Whether the device is currently open.
    pub fn is_open(&self, serial: &str) -> bool {
        self.state
            .lock()
            .devices
            .get(serial)
            .is_some_and(|device| device.open)
    }

    /// Whether status polling is running for the device.
    pub fn is_polling(&self, serial: &str) -> bool {
        self.state
            .lock()
            .devices
            .get(serial)
            .is_some_and(|device| device.polling_ms.is_some())
    }

    /// Whether `FF_LoadSettings` has succeeded for the device.
    pub fn settings_loaded(&self, serial: &str) -> bool {
        self.state
            .lock()
            .devices
            .get(serial)
            .is_some_and(|device| device.settings_loaded)
    }

    /// Journal the call, apply injected failures, then run `f` on the device state.
    fn with_state<T>(
        &self,
        function: &'static str,
        serial: Option<&str>,
        f: impl FnOnce(&mut MockState) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        state.journal.push(MockCall {
            function,
            serial: serial.map(str::to_string),
        });
        debug!(function, serial, "mock kinesis call");
        if let Some(&code) = state.failures.get(function) {
            return Err(FlipperError::Native { function, code });
        }
        f(&mut state)
    }

    /// Like [`with_state`](Self::with_state) for calls that need an open device.
    fn with_open_device<T>(
        &self,
        function: &'static str,
        serial: &str,
        f: impl FnOnce(&mut MockDevice, u32) -> Result<T>,
    ) -> Result<T> {
        self.with_state(function, Some(serial), |state| {
            let moving_polls = state.moving_polls;
            match state.devices.get_mut(serial) {
                Some(device) if device.open => f(device, moving_polls),
                Some(_) => Err(FlipperError::Native {
                    function,
                    code: DEVICE_NOT_OPENED,
                }),
                None => Err(FlipperError::Native {
                    function,
                    code: DEVICE_NOT_FOUND,
                }),
            }
        })
    }
}

impl Default for MockFlipperController {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeMotionController for MockFlipperController {
    fn build_device_list(&self) -> Result<()> {
        self.with_state("TLI_BuildDeviceList", None, |_| Ok(()))
    }

    fn device_list_by_type(&self, type_id: i32) -> Result<Vec<String>> {
        self.with_state("TLI_GetDeviceListByTypeExt", None, |state| {
            if type_id == kinesis_sys::FILTER_FLIPPER_TYPE {
                Ok(state.devices.keys().cloned().collect())
            } else {
                Ok(Vec::new())
            }
        })
    }

    fn open(&self, serial: &str) -> Result<()> {
        self.with_state("FF_Open", Some(serial), |state| {
            match state.devices.get_mut(serial) {
                Some(device) => {
                    device.open = true;
                    Ok(())
                }
                None => Err(FlipperError::Native {
                    function: "FF_Open",
                    code: DEVICE_NOT_FOUND,
                }),
            }
        })
    }

    fn close(&self, serial: &str) -> Result<()> {
        self.with_state("FF_Close", Some(serial), |state| {
            if let Some(device) = state.devices.get_mut(serial) {
                device.open = false;
                device.polling_ms = None;
            }
            Ok(())
        })
    }

    fn identify(&self, serial: &str) -> Result<()> {
        self.with_open_device("FF_Identify", serial, |_, _| Ok(()))
    }

    fn load_settings(&self, serial: &str) -> Result<()> {
        self.with_open_device("FF_LoadSettings", serial, |device, _| {
            device.settings_loaded = true;
            Ok(())
        })
    }

    fn persist_settings(&self, serial: &str) -> Result<()> {
        self.with_open_device("FF_PersistSettings", serial, |_, _| Ok(()))
    }

    fn start_polling(&self, serial: &str, period_ms: i32) -> Result<()> {
        self.with_open_device("FF_StartPolling", serial, |device, _| {
            device.polling_ms = Some(period_ms);
            Ok(())
        })
    }

    fn stop_polling(&self, serial: &str) -> Result<()> {
        self.with_open_device("FF_StopPolling", serial, |device, _| {
            device.polling_ms = None;
            Ok(())
        })
    }

    fn polling_duration(&self, serial: &str) -> Result<i64> {
        self.with_open_device("FF_PollingDuration", serial, |device, _| {
            Ok(device.polling_ms.map_or(0, i64::from))
        })
    }

    fn transit_time(&self, serial: &str) -> Result<u32> {
        self.with_open_device("FF_GetTransitTime", serial, |device, _| {
            Ok(device.transit_ms)
        })
    }

    fn set_transit_time(&self, serial: &str, transit_ms: u32) -> Result<()> {
        self.with_open_device("FF_SetTransitTime", serial, |device, _| {
            device.transit_ms = transit_ms;
            Ok(())
        })
    }

    fn move_to_position(&self, serial: &str, code: i32) -> Result<()> {
        self.with_open_device("FF_MoveToPosition", serial, |device, moving_polls| {
            let target = match Position::from_native(code) {
                Ok(target) if target.is_valid_target() => target,
                _ => {
                    return Err(FlipperError::Native {
                        function: "FF_MoveToPosition",
                        code: INVALID_POSITION,
                    })
                }
            };
            if device.position != target || device.pending.is_some() {
                device.pending = Some(PendingMove {
                    target,
                    polls_remaining: moving_polls,
                });
            }
            Ok(())
        })
    }

    fn position(&self, serial: &str) -> Result<i32> {
        self.with_open_device("FF_GetPosition", serial, |device, _| {
            Ok(device.reported_code())
        })
    }

    fn home(&self, serial: &str) -> Result<()> {
        self.with_open_device("FF_Home", serial, |device, moving_polls| {
            device.pending = Some(PendingMove {
                target: Position::One,
                polls_remaining: moving_polls,
            });
            Ok(())
        })
    }

    fn request_status(&self, serial: &str) -> Result<()> {
        self.with_open_device("FF_RequestStatus", serial, |_, _| Ok(()))
    }

    fn status_bits(&self, serial: &str) -> Result<u32> {
        self.with_open_device("FF_GetStatusBits", serial, |device, _| {
            // Bit 0: limit switch 1 (position one), bit 1: limit switch 2, bit 4/5: moving
            let bits = match (device.position, device.pending) {
                (_, Some(pending)) if pending.target == Position::One => 0x20,
                (_, Some(_)) => 0x10,
                (Position::One, None) => 0x01,
                (Position::Two, None) => 0x02,
                (Position::Moving, None) => 0x00,
            };
            Ok(bits)
        })
    }

    fn number_of_positions(&self, serial: &str) -> Result<i32> {
        self.with_open_device("FF_GetNumberPositions", serial, |_, _| Ok(2))
    }

    fn hardware_info(&self, serial: &str) -> Result<HardwareInfo> {
        self.with_open_device("FF_GetHardwareInfo", serial, |device, _| {
            Ok(device.hardware_info.clone())
        })
    }

    fn software_version(&self, serial: &str) -> Result<FirmwareVersion> {
        self.with_open_device("FF_GetSoftwareVersion", serial, |_, _| {
            Ok(FirmwareVersion::from_packed(0x0001_0A00))
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
