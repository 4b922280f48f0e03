//! Raw FFI declarations for the Thorlabs Kinesis filter flipper SDK.
//!
//! Covers the subset of `Thorlabs.MotionControl.FilterFlipper.dll` (and the
//! `TLI_` device-manager entry points it re-exports) used by the flipper driver.
//! The function declarations are only compiled with the `kinesis-sdk` feature,
//! which also links the vendor import libraries. Constants and the error-code
//! table are always available so that simulated backends can share them.
#![allow(non_camel_case_types, non_snake_case)]

/// Win32 `WORD`.
pub type WORD = u16;
/// Win32 `DWORD`.
pub type DWORD = u32;

/// Position codes reported and accepted by the flipper (`FF_Positions`).
pub type FF_Positions = u16;

/// Reported while the flipper is between positions.
pub const FF_POSITION_ERROR: FF_Positions = 0;
/// Flipper at position 1.
pub const FF_POSITION_1: FF_Positions = 1;
/// Flipper at position 2.
pub const FF_POSITION_2: FF_Positions = 2;

/// Kinesis device-type prefix for filter flippers (MFF101 / MFF102).
pub const FILTER_FLIPPER_TYPE: i32 = 37;

/// Success return code shared by every `short`-returning function.
pub const TL_OK: i16 = 0;

/// Stand-in code for `bool`-returning functions that reported failure.
pub const TL_CALL_FAILED: i16 = -1;

/// Size of the scratch buffers handed to string-returning functions.
pub const STRING_BUFFER_LEN: usize = 512;

/// Human readable description of a Kinesis return code.
///
/// Codes 1-8 are FTDI transport errors, 0x20 and above are Kinesis device errors.
pub fn error_description(code: i16) -> &'static str {
    match code {
        TL_CALL_FAILED => "call reported failure",
        0x00 => "success",
        0x01 => "FTDI invalid handle",
        0x02 => "FTDI device not found",
        0x03 => "FTDI device not opened",
        0x04 => "FTDI I/O error",
        0x05 => "FTDI insufficient resources",
        0x06 => "FTDI invalid parameter",
        0x07 => "FTDI device no longer present",
        0x08 => "FTDI incorrect device",
        0x10 => "device library could not be found",
        0x11 => "no functions available for this device",
        0x12 => "function not available for this device",
        0x13 => "bad function pointer",
        0x14 => "generic function failure",
        0x15 => "specific function failure",
        0x20 => "device is already open",
        0x21 => "no response from device",
        0x22 => "function not implemented",
        0x23 => "device reported a fault",
        0x24 => "invalid operation",
        0x25 => "device must be homed first",
        0x26 => "invalid position",
        0x27 => "invalid velocity parameter",
        0x28 => "device is disconnecting",
        0x29 => "firmware bug",
        0x2A => "device initialization failure",
        0x2B => "invalid channel",
        0x2C => "cannot home device",
        0x2D => "jog continuous mode error",
        0x2E => "no motor information",
        0x2F => "command temporarily unavailable",
        _ => "unknown Kinesis error",
    }
}

#[cfg(feature = "kinesis-sdk")]
mod ffi {
    use super::{FF_Positions, DWORD, WORD};
    use std::os::raw::{c_char, c_int, c_long, c_short, c_uint};

    extern "C" {
        pub fn TLI_BuildDeviceList() -> c_short;
        pub fn TLI_GetDeviceListSize() -> c_short;
        pub fn TLI_GetDeviceListByTypeExt(
            receive_buffer: *mut c_char,
            size_of_buffer: DWORD,
            type_id: c_int,
        ) -> c_short;

        pub fn FF_Open(serial_no: *const c_char) -> c_short;
        pub fn FF_Close(serial_no: *const c_char);
        pub fn FF_Identify(serial_no: *const c_char);
        pub fn FF_GetHardwareInfo(
            serial_no: *const c_char,
            model_no: *mut c_char,
            size_of_model_no: DWORD,
            hw_type: *mut WORD,
            num_channels: *mut WORD,
            notes: *mut c_char,
            size_of_notes: DWORD,
            firmware_version: *mut DWORD,
            hardware_version: *mut WORD,
            modification_state: *mut WORD,
        ) -> c_short;
        pub fn FF_GetFirmwareVersion(serial_no: *const c_char) -> DWORD;
        pub fn FF_GetSoftwareVersion(serial_no: *const c_char) -> DWORD;
        pub fn FF_LoadSettings(serial_no: *const c_char) -> bool;
        pub fn FF_PersistSettings(serial_no: *const c_char) -> bool;
        pub fn FF_GetNumberPositions(serial_no: *const c_char) -> c_int;
        pub fn FF_Home(serial_no: *const c_char) -> c_short;
        pub fn FF_MoveToPosition(serial_no: *const c_char, position: FF_Positions) -> c_short;
        pub fn FF_GetPosition(serial_no: *const c_char) -> FF_Positions;
        pub fn FF_GetTransitTime(serial_no: *const c_char) -> c_uint;
        pub fn FF_SetTransitTime(serial_no: *const c_char, transit_time: c_uint) -> c_short;
        pub fn FF_RequestStatus(serial_no: *const c_char) -> c_short;
        pub fn FF_GetStatusBits(serial_no: *const c_char) -> DWORD;
        pub fn FF_StartPolling(serial_no: *const c_char, milliseconds: c_int) -> bool;
        pub fn FF_PollingDuration(serial_no: *const c_char) -> c_long;
        pub fn FF_StopPolling(serial_no: *const c_char);
    }
}

#[cfg(feature = "kinesis-sdk")]
pub use ffi::*;
