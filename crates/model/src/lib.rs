mod format;
mod rect;
mod region;

pub use format::{FormatError, PixelFormat, convert_pixels};
pub use rect::{Rect, RectPieces, ceil_div_pow2, floor_div_pow2};
pub use region::Region;

use bitflags::bitflags;
use thiserror::Error;

pub const DEFAULT_TILE_EDGE: u32 = 128;
/// Deepest mip level a buffer will address.
pub const MAX_LEVEL: u8 = 16;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMode: u8 {
        const READ = 1;
        const WRITE = 2;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl AccessMode {
    pub fn reads(self) -> bool {
        self.contains(AccessMode::READ)
    }

    pub fn writes(self) -> bool {
        self.contains(AccessMode::WRITE)
    }
}

/// How samples outside a buffer's extent are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbyssPolicy {
    /// Requests reaching outside the extent are rejected.
    None,
    /// Coordinates clamp to the nearest edge pixel, `[start, end - 1]` inclusive.
    Clamp,
    /// Samples outside the extent are all-zero bytes.
    Clear,
}

impl AbyssPolicy {
    /// Maps a coordinate onto the half-open span `[start, end)`.
    /// `None` means the sample is produced as zeros.
    pub fn map_coordinate(self, coordinate: i32, start: i32, end: i32) -> Option<i32> {
        if coordinate >= start && coordinate < end {
            return Some(coordinate);
        }
        match self {
            AbyssPolicy::Clamp if end > start => Some(coordinate.clamp(start, end - 1)),
            _ => None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub level: u8,
    pub tile_y: i32,
    pub tile_x: i32,
}

impl TileCoord {
    pub const fn new(tile_x: i32, tile_y: i32, level: u8) -> Self {
        Self {
            level,
            tile_y,
            tile_x,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileGridError {
    #[error("tile edge must be at least 1")]
    ZeroTileEdge,
    #[error("tile edge {0} exceeds supported range")]
    TileEdgeTooLarge(u32),
}

/// Square tile grid anchored at the origin of each level's pixel space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TileGrid {
    tile_edge: u32,
}

impl TileGrid {
    pub fn new(tile_edge: u32) -> Result<Self, TileGridError> {
        if tile_edge == 0 {
            return Err(TileGridError::ZeroTileEdge);
        }
        if tile_edge > 1 << 15 {
            return Err(TileGridError::TileEdgeTooLarge(tile_edge));
        }
        Ok(Self { tile_edge })
    }

    pub const fn tile_edge(self) -> u32 {
        self.tile_edge
    }

    pub const fn tile_pixels(self) -> usize {
        self.tile_edge as usize * self.tile_edge as usize
    }

    pub fn tile_index(self, coordinate: i32) -> i32 {
        coordinate.div_euclid(self.tile_edge as i32)
    }

    /// Distance from `coordinate` to the next tile boundary, at least 1.
    pub fn distance_to_boundary(self, coordinate: i32) -> i32 {
        let edge = self.tile_edge as i32;
        edge - coordinate.rem_euclid(edge)
    }

    pub fn tile_rect(self, tile_x: i32, tile_y: i32) -> Rect {
        let edge = self.tile_edge as i32;
        Rect::new(
            tile_x.saturating_mul(edge),
            tile_y.saturating_mul(edge),
            edge,
            edge,
        )
    }

    /// Tiles overlapping `rect` (level pixel space), row-major.
    pub fn tiles_in(self, rect: Rect, level: u8) -> impl Iterator<Item = TileCoord> {
        let (first_x, first_y, last_x, last_y) = if rect.is_empty() {
            (0, 0, -1, -1)
        } else {
            (
                self.tile_index(rect.x),
                self.tile_index(rect.y),
                self.tile_index(rect.right() - 1),
                self.tile_index(rect.bottom() - 1),
            )
        };
        (first_y..=last_y).flat_map(move |tile_y| {
            (first_x..=last_x).map(move |tile_x| TileCoord::new(tile_x, tile_y, level))
        })
    }
}
