//! Thorlabs filter flipper (MFF101 / MFF102) driver
//!
//! Wraps one flipper reached through a [`NativeMotionController`]. Opening a device
//! loads the settings stored on the hardware and starts the SDK's status polling;
//! every position query afterwards reads the most recently polled state.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flipper_daq::hardware::filter_flipper::FlipperDevice;
//! use flipper_daq::hardware::mock::MockFlipperController;
//! use flipper_daq::hardware::Position;
//!
//! #[tokio::main]
//! async fn main() -> flipper_daq::error::Result<()> {
//!     let controller = Arc::new(MockFlipperController::new().with_device("37000001"));
//!     let flipper = FlipperDevice::open(controller, "37000001", Duration::from_millis(200))?;
//!
//!     flipper.move_and_wait(Position::Two).await?;
//!     println!("Position: {}", flipper.get_position().await?);
//!
//!     flipper.close()
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::capabilities::PositionSwitch;
use super::native::{FirmwareVersion, HardwareInfo, NativeMotionController};
use super::position::{is_valid_position, Position};
use crate::config::FlipperSettings;
use crate::error::{FlipperError, Result};
use crate::units::{from_native_millis, to_native_millis, to_native_millis_signed};

/// Kinesis device-type code for filter flippers.
pub const FILTER_FLIPPER_TYPE: i32 = kinesis_sys::FILTER_FLIPPER_TYPE;

/// Module path reported in discovery records.
pub const MODULE_NAME: &str = "motion.filter_flipper";

/// Status polling period used by [`FlipperDevice::open_default`].
pub const DEFAULT_POLLING_PERIOD: Duration = Duration::from_millis(200);
/// Default interval between arrival checks.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(100);
/// Default upper bound for `move_and_wait`.
pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Discovery record for one attached flipper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentParams {
    /// Human readable label, e.g. `<Thorlabs_Filter_Flipper '37000001'>`
    pub label: String,
    /// Driver module that handles this record
    pub module: String,
    /// Serial number of the flipper
    #[serde(rename = "ff_serial", default)]
    pub serial: Option<String>,
}

impl InstrumentParams {
    /// Record for the flipper with this serial number.
    pub fn for_serial(serial: &str) -> Self {
        Self {
            label: format!("<Thorlabs_Filter_Flipper '{}'>", serial),
            module: MODULE_NAME.to_string(),
            serial: Some(serial.to_string()),
        }
    }
}

/// List every filter flipper the SDK can see.
pub fn list_instruments(controller: &dyn NativeMotionController) -> Result<Vec<InstrumentParams>> {
    controller.build_device_list()?;
    let serials = controller.device_list_by_type(FILTER_FLIPPER_TYPE)?;
    Ok(serials
        .iter()
        .map(|serial| serial.trim())
        .filter(|serial| !serial.is_empty())
        .map(InstrumentParams::for_serial)
        .collect())
}

/// How [`FlipperDevice::move_and_wait_with`] waits for arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Interval between position polls once the transit time has elapsed
    pub poll_delay: Duration,
    /// Upper bound for the whole move. `None` or zero waits forever.
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_delay: DEFAULT_POLL_DELAY,
            timeout: Some(DEFAULT_MOVE_TIMEOUT),
        }
    }
}

impl WaitOptions {
    /// Wait with no upper bound.
    pub fn unbounded(poll_delay: Duration) -> Self {
        Self {
            poll_delay,
            timeout: None,
        }
    }

    /// Reject a zero poll delay; a zero timeout means no bound, as in the config file.
    fn normalized(self) -> Result<Self> {
        if self.poll_delay.is_zero() {
            return Err(FlipperError::InvalidArgument(
                "poll delay must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            poll_delay: self.poll_delay,
            timeout: self.timeout.filter(|limit| !limit.is_zero()),
        })
    }
}

fn ensure_target(target: Position) -> Result<()> {
    if is_valid_position(target) {
        Ok(())
    } else {
        Err(FlipperError::InvalidArgument(format!(
            "{} is not a valid target position",
            target
        )))
    }
}

/// Driver for one Thorlabs filter flipper.
///
/// The device is exclusively owned by its caller. [`close`](Self::close) consumes it;
/// a device dropped without closing stops polling and releases the handle on a
/// best-effort basis.
pub struct FlipperDevice {
    controller: Arc<dyn NativeMotionController>,
    serial: String,
    polling_period: Duration,
    wait: WaitOptions,
    closed: bool,
}

impl std::fmt::Debug for FlipperDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlipperDevice")
            .field("serial", &self.serial)
            .field("polling_period", &self.polling_period)
            .field("wait", &self.wait)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl FlipperDevice {
    /// Open the flipper with the given serial number.
    ///
    /// Loads the settings stored on the device and starts status polling with
    /// `polling_period`, rounded to whole milliseconds.
    ///
    /// # Errors
    /// `InstrumentNotFound` if no attached flipper has this serial (nothing is opened),
    /// `InvalidArgument` for a polling period under 1 ms, and any native failure.
    pub fn open(
        controller: Arc<dyn NativeMotionController>,
        serial: &str,
        polling_period: Duration,
    ) -> Result<Self> {
        let polling_ms = to_native_millis_signed(polling_period)?;
        if polling_ms == 0 {
            return Err(FlipperError::InvalidArgument(format!(
                "polling period {:?} rounds to 0 ms",
                polling_period
            )));
        }

        controller.build_device_list()?;
        let attached = controller.device_list_by_type(FILTER_FLIPPER_TYPE)?;
        if !attached.iter().any(|candidate| candidate.trim() == serial) {
            return Err(FlipperError::InstrumentNotFound {
                serial: serial.to_string(),
            });
        }

        controller.open(serial)?;
        let device = Self {
            controller,
            serial: serial.to_string(),
            polling_period: from_native_millis(polling_ms.unsigned_abs()),
            wait: WaitOptions::default(),
            closed: false,
        };

        // Dropping `device` on error releases the handle again.
        device.controller.load_settings(&device.serial)?;
        device
            .controller
            .start_polling(&device.serial, polling_ms)?;

        info!(serial = %device.serial, polling_ms, "Opened filter flipper");
        Ok(device)
    }

    /// Open with the default 200 ms polling period.
    pub fn open_default(controller: Arc<dyn NativeMotionController>, serial: &str) -> Result<Self> {
        Self::open(controller, serial, DEFAULT_POLLING_PERIOD)
    }

    /// Open the flipper described by a discovery record.
    pub fn from_params(
        controller: Arc<dyn NativeMotionController>,
        params: &InstrumentParams,
    ) -> Result<Self> {
        let serial = params.serial.as_deref().ok_or_else(|| {
            FlipperError::InstrumentType(format!("{} has no 'ff_serial' parameter", params.label))
        })?;
        Self::open_default(controller, serial)
    }

    /// Open the flipper described by loaded settings, applying the configured
    /// transit time and wait options.
    pub fn from_settings(
        controller: Arc<dyn NativeMotionController>,
        settings: &FlipperSettings,
    ) -> Result<Self> {
        let serial = settings.serial.as_deref().ok_or_else(|| {
            FlipperError::Configuration("no flipper serial number configured".to_string())
        })?;
        let mut device = Self::open(controller, serial, settings.polling_period)?;
        if let Some(transit_time) = settings.transit_time {
            device.set_transit_time_now(transit_time)?;
        }
        device.wait = settings.wait_options();
        Ok(device)
    }

    /// Serial number of the open flipper.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Polling period requested at open, after millisecond rounding.
    pub fn polling_period(&self) -> Duration {
        self.polling_period
    }

    /// Default wait options used by [`move_and_wait`](Self::move_and_wait).
    pub fn wait_options(&self) -> WaitOptions {
        self.wait
    }

    /// Replace the wait options used by [`move_and_wait`](Self::move_and_wait).
    pub fn set_wait_options(&mut self, wait: WaitOptions) {
        self.wait = wait;
    }

    /// Returns true if `candidate` can be commanded as a target.
    pub fn is_valid_position(&self, candidate: Position) -> bool {
        is_valid_position(candidate)
    }

    /// Position at the most recent polling event; `Moving` while in transit.
    pub async fn get_position(&self) -> Result<Position> {
        let code = self.controller.position(&self.serial)?;
        Position::from_native(code)
    }

    /// Command a move to `target` and return immediately.
    pub async fn move_to(&self, target: Position) -> Result<()> {
        ensure_target(target)?;
        debug!(serial = %self.serial, %target, "Moving filter flipper");
        self.controller
            .move_to_position(&self.serial, target.native_code())
    }

    /// Move from one stable position to the other, returning the commanded target.
    ///
    /// # Errors
    /// `AmbiguousFlip` if the flipper is currently moving.
    pub async fn flip(&self) -> Result<Position> {
        let current = self.get_position().await?;
        let target = current
            .opposite()
            .ok_or(FlipperError::AmbiguousFlip(current))?;
        self.move_to(target).await?;
        Ok(target)
    }

    /// Flip and return once the device reports the new position.
    ///
    /// A single move is commanded; the current position is read first so the wait
    /// does not see the flipper mid-transit.
    ///
    /// # Errors
    /// `AmbiguousFlip` if the flipper is currently moving.
    pub async fn flip_and_wait(&self) -> Result<Position> {
        let current = self.get_position().await?;
        let target = current
            .opposite()
            .ok_or(FlipperError::AmbiguousFlip(current))?;
        self.move_and_wait(target).await?;
        Ok(target)
    }

    /// Move to `target` and return once the device reports it, using the device's
    /// default [`WaitOptions`].
    pub async fn move_and_wait(&self, target: Position) -> Result<()> {
        self.move_and_wait_with(target, self.wait).await
    }

    /// Move to `target` and return once the device reports it.
    ///
    /// Does nothing if the flipper is already there. Otherwise the move is issued,
    /// the configured transit time is slept off, and the position is then polled every
    /// `options.poll_delay` until it matches. With `options.timeout` set the whole
    /// operation fails with `MoveTimeout` once the limit passes; with `None` or zero a
    /// stuck device blocks forever. Dropping the returned future abandons the wait but
    /// not the move.
    ///
    /// # Errors
    /// `InvalidArgument` for a `Moving` target or a zero poll delay, before any move.
    pub async fn move_and_wait_with(&self, target: Position, options: WaitOptions) -> Result<()> {
        ensure_target(target)?;
        let options = options.normalized()?;
        if self.get_position().await? == target {
            debug!(serial = %self.serial, %target, "Filter flipper already in position");
            return Ok(());
        }

        let arrival = self.wait_for_arrival(target, options.poll_delay);
        match options.timeout {
            Some(limit) => tokio::time::timeout(limit, arrival)
                .await
                .map_err(|_| FlipperError::MoveTimeout {
                    target,
                    elapsed: limit,
                })?,
            None => arrival.await,
        }
    }

    async fn wait_for_arrival(&self, target: Position, poll_delay: Duration) -> Result<()> {
        let transit_time = self.get_transit_time().await?;
        self.move_to(target).await?;
        sleep(transit_time).await;

        let mut polls: u64 = 0;
        while self.get_position().await? != target {
            polls += 1;
            sleep(poll_delay).await;
        }
        debug!(serial = %self.serial, %target, polls, "Filter flipper arrived");
        Ok(())
    }

    /// Run the firmware homing sequence.
    pub async fn home(&self) -> Result<()> {
        debug!(serial = %self.serial, "Homing filter flipper");
        self.controller.home(&self.serial)
    }

    /// Time to transition from one position to the other.
    pub async fn get_transit_time(&self) -> Result<Duration> {
        let transit_ms = self.controller.transit_time(&self.serial)?;
        Ok(from_native_millis(transit_ms))
    }

    /// Set the transit time, rounded to whole milliseconds.
    pub async fn set_transit_time(&self, transit_time: Duration) -> Result<()> {
        self.set_transit_time_now(transit_time)
    }

    fn set_transit_time_now(&self, transit_time: Duration) -> Result<()> {
        let transit_ms = to_native_millis(transit_time)?;
        debug!(serial = %self.serial, transit_ms, "Setting transit time");
        self.controller.set_transit_time(&self.serial, transit_ms)
    }

    /// Blink the front-panel LED.
    pub async fn identify(&self) -> Result<()> {
        self.controller.identify(&self.serial)
    }

    /// Store the current device settings in the device's EEPROM.
    pub async fn persist_settings(&self) -> Result<()> {
        self.controller.persist_settings(&self.serial)
    }

    /// Model, firmware and hardware revision reported by the device.
    pub async fn hardware_info(&self) -> Result<HardwareInfo> {
        self.controller.hardware_info(&self.serial)
    }

    /// Version of the Kinesis filter flipper library.
    pub async fn software_version(&self) -> Result<FirmwareVersion> {
        self.controller.software_version(&self.serial)
    }

    /// Number of positions the device supports (2 for MFF10x).
    pub async fn number_of_positions(&self) -> Result<i32> {
        self.controller.number_of_positions(&self.serial)
    }

    /// Ask the device for a status update outside the polling schedule.
    pub async fn request_status(&self) -> Result<()> {
        self.controller.request_status(&self.serial)
    }

    /// Raw status bits from the last status update.
    pub async fn status_bits(&self) -> Result<u32> {
        self.controller.status_bits(&self.serial)
    }

    /// Stop polling and release the native handle.
    ///
    /// Both calls are always attempted; the first failure is returned.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        let stopped = self.controller.stop_polling(&self.serial);
        let closed = self.controller.close(&self.serial);
        info!(serial = %self.serial, "Closed filter flipper");
        stopped.and(closed)
    }
}

impl Drop for FlipperDevice {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.controller.stop_polling(&self.serial) {
            warn!(serial = %self.serial, error = %err, "Failed to stop polling on drop");
        }
        if let Err(err) = self.controller.close(&self.serial) {
            warn!(serial = %self.serial, error = %err, "Failed to close flipper on drop");
        }
    }
}

#[async_trait]
impl PositionSwitch for FlipperDevice {
    async fn position(&self) -> Result<Position> {
        self.get_position().await
    }

    async fn move_to(&self, target: Position) -> Result<()> {
        FlipperDevice::move_to(self, target).await
    }

    async fn flip(&self) -> Result<Position> {
        FlipperDevice::flip(self).await
    }

    async fn move_and_wait(&self, target: Position) -> Result<()> {
        FlipperDevice::move_and_wait(self, target).await
    }

    async fn home(&self) -> Result<()> {
        FlipperDevice::home(self).await
    }
}
