//! Hardware capability traits.
//!
//! Framework code drives instruments through these traits instead of concrete
//! driver types, so a simulated device and a real one are interchangeable.

use async_trait::async_trait;

use super::Position;
use crate::error::Result;

/// Capability for two-position switching devices (filter flippers, beam blocks).
#[async_trait]
pub trait PositionSwitch: Send + Sync {
    /// Position reported by the most recent status poll.
    async fn position(&self) -> Result<Position>;

    /// Command a move and return without waiting for arrival.
    async fn move_to(&self, target: Position) -> Result<()>;

    /// Move to the other stable position, returning the commanded target.
    async fn flip(&self) -> Result<Position>;

    /// Command a move and return once the device reports the target.
    async fn move_and_wait(&self, target: Position) -> Result<()>;

    /// Run the device homing sequence.
    async fn home(&self) -> Result<()>;
}
