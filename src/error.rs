//! Custom error types for the flipper driver.
//!
//! `FlipperError` is the single error type returned by the library. It follows the
//! failure taxonomy of the instrument:
//!
//! - **Discovery**: `InstrumentNotFound` when a serial number is not among the
//!   attached devices, `InstrumentType` when a parameter record does not describe a
//!   filter flipper at all.
//! - **Invalid target**: `InvalidArgument` for `Moving` targets and durations that do
//!   not fit the native millisecond fields.
//! - **Ambiguous flip**: `AmbiguousFlip` when `flip()` cannot tell which way to go.
//! - **Native failures**: `Native` carries the vendor function name and its raw return
//!   code untouched. `UnknownPosition` covers position codes outside the documented
//!   range.
//! - **Bounded waits**: `MoveTimeout` when `move_and_wait` runs out of time.
//!
//! Nothing in the library retries or swallows these errors; they are returned to the
//! immediate caller.

use std::time::Duration;

use thiserror::Error;

use crate::hardware::Position;

/// Convenience alias for results using the driver error type.
pub type Result<T> = std::result::Result<T, FlipperError>;

/// Errors returned by the flipper driver, its configuration and the CLI.
#[derive(Error, Debug)]
pub enum FlipperError {
    /// No attached flipper has the requested serial number
    #[error("No filter flipper with serial number '{serial}' is connected")]
    InstrumentNotFound {
        /// Serial number that was looked up
        serial: String,
    },

    /// Discovery record without a flipper serial
    #[error("Parameters do not describe a filter flipper: {0}")]
    InstrumentType(String),

    /// Target or duration the device cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `flip()` called while the flipper is moving
    #[error("Could not flip because the current position is {0}")]
    AmbiguousFlip(Position),

    /// `move_and_wait` ran out of time
    #[error("Flipper did not reach position {target} within {elapsed:?}")]
    MoveTimeout {
        /// Position that was commanded
        target: Position,
        /// Time limit that expired
        elapsed: Duration,
    },

    /// Vendor call failed; `code` is the raw return value
    #[error("{function} failed with code {code} ({})", describe_code(.code))]
    Native {
        /// Vendor function name
        function: &'static str,
        /// Raw return code
        code: i16,
    },

    /// Position code outside the documented range
    #[error("Device reported unknown position code {0}")]
    UnknownPosition(i32),

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(#[source] Box<figment::Error>),

    /// Configuration parsed but holds unusable values
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Backend requested without its cargo feature
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

fn describe_code(code: &i16) -> &'static str {
    kinesis_sys::error_description(*code)
}

impl FlipperError {
    /// Build a native error for a `bool`-returning vendor function that reported failure.
    pub(crate) fn native_false(function: &'static str) -> Self {
        FlipperError::Native {
            function,
            code: kinesis_sys::TL_CALL_FAILED,
        }
    }
}

impl From<figment::Error> for FlipperError {
    fn from(err: figment::Error) -> Self {
        FlipperError::Config(Box::new(err))
    }
}
