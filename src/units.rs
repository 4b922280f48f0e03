//! Duration conversions at the native boundary.
//!
//! The Kinesis SDK takes and returns whole milliseconds as plain integers. The rest of
//! the crate works in [`Duration`], and every crossing goes through these helpers so
//! the rounding rule lives in one place: half a millisecond rounds up.

use std::time::Duration;

use crate::error::{FlipperError, Result};

const NANOS_PER_MILLI: u128 = 1_000_000;

/// Round `duration` to the nearest whole millisecond.
pub fn round_to_millis(duration: Duration) -> u128 {
    (duration.as_nanos() + NANOS_PER_MILLI / 2) / NANOS_PER_MILLI
}

/// Convert to an unsigned native millisecond count.
pub fn to_native_millis(duration: Duration) -> Result<u32> {
    let millis = round_to_millis(duration);
    u32::try_from(millis).map_err(|_| {
        FlipperError::InvalidArgument(format!(
            "{:?} does not fit a native millisecond field",
            duration
        ))
    })
}

/// Convert to a signed native millisecond count (polling periods use `int`).
pub fn to_native_millis_signed(duration: Duration) -> Result<i32> {
    let millis = round_to_millis(duration);
    i32::try_from(millis).map_err(|_| {
        FlipperError::InvalidArgument(format!(
            "{:?} does not fit a native millisecond field",
            duration
        ))
    })
}

/// Convert a native millisecond count back into a [`Duration`].
pub fn from_native_millis(millis: u32) -> Duration {
    Duration::from_millis(u64::from(millis))
}
