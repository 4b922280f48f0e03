//! Flipper position states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FlipperError, Result};

/// Position of the flipper as reported by the most recent status poll.
///
/// `One` and `Two` are the stable states. `Moving` is only ever reported by the
/// device while it travels between them and is never a valid move target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Position 1
    One,
    /// Position 2
    Two,
    /// In transit between positions
    Moving,
}

impl Position {
    /// Decode a native position code (0 = moving, 1, 2).
    pub fn from_native(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Position::Moving),
            1 => Ok(Position::One),
            2 => Ok(Position::Two),
            other => Err(FlipperError::UnknownPosition(other)),
        }
    }

    /// Native position code understood by the SDK.
    pub fn native_code(self) -> i32 {
        match self {
            Position::Moving => 0,
            Position::One => 1,
            Position::Two => 2,
        }
    }

    /// True for positions that can be commanded.
    pub fn is_valid_target(self) -> bool {
        !matches!(self, Position::Moving)
    }

    /// The other stable position, if this is one.
    pub fn opposite(self) -> Option<Self> {
        match self {
            Position::One => Some(Position::Two),
            Position::Two => Some(Position::One),
            Position::Moving => None,
        }
    }

    /// Lowercase name used for display and parsing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::One => "one",
            Position::Two => "two",
            Position::Moving => "moving",
        }
    }
}

/// Returns true if `candidate` is a position the flipper can be moved to.
pub fn is_valid_position(candidate: Position) -> bool {
    candidate.is_valid_target()
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = FlipperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "one" | "1" => Ok(Position::One),
            "two" | "2" => Ok(Position::Two),
            "moving" | "0" => Ok(Position::Moving),
            other => Err(FlipperError::InvalidArgument(format!(
                "'{}' is not a flipper position",
                other
            ))),
        }
    }
}
