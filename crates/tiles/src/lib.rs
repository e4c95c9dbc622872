mod buffer;
mod iterator;
mod scratch;
mod tile;

use std::fmt;

pub use buffer::{TiledBuffer, TiledBufferConfig};
pub use iterator::{BufferIterator, MAX_PARTICIPANTS, ParticipantIndex};
pub use scratch::ScratchBuffer;
pub use tile::{Tile, TileLockMisuse, TileLockOwner, UnlockNotify};

use model::{FormatError, Rect, TileGridError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRegionReason {
    Empty,
    OutsideExtent,
    SizeMismatch,
}

impl fmt::Display for InvalidRegionReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidRegionReason::Empty => write!(formatter, "region has no area"),
            InvalidRegionReason::OutsideExtent => {
                write!(formatter, "region leaves the extent under abyss policy None")
            }
            InvalidRegionReason::SizeMismatch => {
                write!(formatter, "region size differs from the first participant")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BufferError {
    #[error("invalid region {rect:?}: {reason}")]
    InvalidRegion {
        rect: Rect,
        reason: InvalidRegionReason,
    },
    #[error("pixel slice holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("scale {0} must be finite and positive")]
    InvalidScale(f64),
    #[error("level {0} exceeds the deepest supported level")]
    InvalidLevel(u8),
    #[error(transparent)]
    Grid(#[from] TileGridError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    TileLock(#[from] TileLockMisuse),
}

impl BufferError {
    pub(crate) fn invalid_region(rect: Rect, reason: InvalidRegionReason) -> Self {
        Self::InvalidRegion { rect, reason }
    }

    /// Reports invalid regions in the caller's coordinates.
    pub(crate) fn with_rect(self, caller_rect: Rect) -> Self {
        match self {
            Self::InvalidRegion { reason, .. } => Self::InvalidRegion {
                rect: caller_rect,
                reason,
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IteratorError {
    #[error("buffer iterator supports at most {max} participants")]
    Overflow { max: usize },
    #[error("invalid iterator region {rect:?}: {reason}")]
    InvalidRegion {
        rect: Rect,
        reason: InvalidRegionReason,
    },
    #[error("participants cannot be added once iteration has started")]
    AlreadyStarted,
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

#[cfg(test)]
mod tests;
