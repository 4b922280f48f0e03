//! Kinesis SDK binding
//!
//! Implements [`NativeMotionController`] on top of `kinesis-sys`. Every vendor call
//! is a short synchronous FFI call; motion progress is tracked by the SDK's own
//! polling thread, started with [`start_polling`](NativeMotionController::start_polling).
//!
//! The SDK serializes access per serial number internally, so the controller itself
//! holds no state and can be shared freely between devices.
#![allow(unsafe_code)]

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use kinesis_sys::*;
use tracing::trace;

use super::native::{parse_serial_list, FirmwareVersion, HardwareInfo, NativeMotionController};
use crate::error::{FlipperError, Result};

/// Stateless handle to the Kinesis filter flipper library.
#[derive(Debug, Default, Clone, Copy)]
pub struct KinesisController;

impl KinesisController {
    /// Handle to the SDK; the library is loaded with the process.
    pub fn new() -> Self {
        Self
    }
}

fn serial_cstring(serial: &str) -> Result<CString> {
    CString::new(serial).map_err(|_| {
        FlipperError::InvalidArgument(format!("serial number {:?} contains a NUL byte", serial))
    })
}

fn check(function: &'static str, code: i16) -> Result<()> {
    trace!(function, code, "kinesis call returned");
    if code == TL_OK {
        Ok(())
    } else {
        Err(FlipperError::Native { function, code })
    }
}

fn check_bool(function: &'static str, ok: bool) -> Result<()> {
    trace!(function, ok, "kinesis call returned");
    if ok {
        Ok(())
    } else {
        Err(FlipperError::native_false(function))
    }
}

fn buffer_to_string(buffer: &[c_char]) -> String {
    // SAFETY: the buffer is zero-initialised and the SDK writes at most len - 1 bytes,
    // so it always contains a terminating NUL.
    unsafe { CStr::from_ptr(buffer.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

impl NativeMotionController for KinesisController {
    fn build_device_list(&self) -> Result<()> {
        check("TLI_BuildDeviceList", unsafe { TLI_BuildDeviceList() })
    }

    fn device_list_by_type(&self, type_id: i32) -> Result<Vec<String>> {
        let mut buffer = vec![0 as c_char; STRING_BUFFER_LEN];
        check("TLI_GetDeviceListByTypeExt", unsafe {
            TLI_GetDeviceListByTypeExt(buffer.as_mut_ptr(), (STRING_BUFFER_LEN - 1) as DWORD, type_id)
        })?;
        Ok(parse_serial_list(&buffer_to_string(&buffer)))
    }

    fn open(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        check("FF_Open", unsafe { FF_Open(serial.as_ptr()) })
    }

    fn close(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        unsafe { FF_Close(serial.as_ptr()) };
        Ok(())
    }

    fn identify(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        unsafe { FF_Identify(serial.as_ptr()) };
        Ok(())
    }

    fn load_settings(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        check_bool("FF_LoadSettings", unsafe { FF_LoadSettings(serial.as_ptr()) })
    }

    fn persist_settings(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        check_bool("FF_PersistSettings", unsafe {
            FF_PersistSettings(serial.as_ptr())
        })
    }

    fn start_polling(&self, serial: &str, period_ms: i32) -> Result<()> {
        let serial = serial_cstring(serial)?;
        check_bool("FF_StartPolling", unsafe {
            FF_StartPolling(serial.as_ptr(), period_ms)
        })
    }

    fn stop_polling(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        unsafe { FF_StopPolling(serial.as_ptr()) };
        Ok(())
    }

    fn polling_duration(&self, serial: &str) -> Result<i64> {
        let serial = serial_cstring(serial)?;
        Ok(i64::from(unsafe { FF_PollingDuration(serial.as_ptr()) }))
    }

    fn transit_time(&self, serial: &str) -> Result<u32> {
        let serial = serial_cstring(serial)?;
        Ok(unsafe { FF_GetTransitTime(serial.as_ptr()) })
    }

    fn set_transit_time(&self, serial: &str, transit_ms: u32) -> Result<()> {
        let serial = serial_cstring(serial)?;
        check("FF_SetTransitTime", unsafe {
            FF_SetTransitTime(serial.as_ptr(), transit_ms)
        })
    }

    fn move_to_position(&self, serial: &str, code: i32) -> Result<()> {
        let position = FF_Positions::try_from(code).map_err(|_| {
            FlipperError::InvalidArgument(format!("position code {} out of range", code))
        })?;
        let serial = serial_cstring(serial)?;
        check("FF_MoveToPosition", unsafe {
            FF_MoveToPosition(serial.as_ptr(), position)
        })
    }

    fn position(&self, serial: &str) -> Result<i32> {
        let serial = serial_cstring(serial)?;
        Ok(i32::from(unsafe { FF_GetPosition(serial.as_ptr()) }))
    }

    fn home(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        check("FF_Home", unsafe { FF_Home(serial.as_ptr()) })
    }

    fn request_status(&self, serial: &str) -> Result<()> {
        let serial = serial_cstring(serial)?;
        check("FF_RequestStatus", unsafe { FF_RequestStatus(serial.as_ptr()) })
    }

    fn status_bits(&self, serial: &str) -> Result<u32> {
        let serial = serial_cstring(serial)?;
        Ok(unsafe { FF_GetStatusBits(serial.as_ptr()) })
    }

    fn number_of_positions(&self, serial: &str) -> Result<i32> {
        let serial = serial_cstring(serial)?;
        Ok(unsafe { FF_GetNumberPositions(serial.as_ptr()) })
    }

    fn hardware_info(&self, serial: &str) -> Result<HardwareInfo> {
        let serial = serial_cstring(serial)?;
        let mut model = vec![0 as c_char; STRING_BUFFER_LEN];
        let mut notes = vec![0 as c_char; STRING_BUFFER_LEN];
        let mut hardware_type: WORD = 0;
        let mut num_channels: WORD = 0;
        let mut firmware: DWORD = 0;
        let mut hardware_version: WORD = 0;
        let mut modification_state: WORD = 0;

        check("FF_GetHardwareInfo", unsafe {
            FF_GetHardwareInfo(
                serial.as_ptr(),
                model.as_mut_ptr(),
                (STRING_BUFFER_LEN - 1) as DWORD,
                &mut hardware_type,
                &mut num_channels,
                notes.as_mut_ptr(),
                (STRING_BUFFER_LEN - 1) as DWORD,
                &mut firmware,
                &mut hardware_version,
                &mut modification_state,
            )
        })?;

        Ok(HardwareInfo {
            model_number: buffer_to_string(&model),
            hardware_type,
            num_channels,
            notes: buffer_to_string(&notes),
            firmware_version: FirmwareVersion::from_packed(firmware),
            hardware_version,
            modification_state,
        })
    }

    fn software_version(&self, serial: &str) -> Result<FirmwareVersion> {
        let serial = serial_cstring(serial)?;
        Ok(FirmwareVersion::from_packed(unsafe {
            FF_GetSoftwareVersion(serial.as_ptr())
        }))
    }
}
