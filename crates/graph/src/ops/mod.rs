mod checkerboard;
mod fill;
mod invert;
mod shift;
mod source;

pub use checkerboard::Checkerboard;
pub use fill::Fill;
pub use invert::Invert;
pub use shift::{Shift, ShiftDirection};
pub use source::BufferSource;

use model::{PixelFormat, Rect};
use tiles::TiledBuffer;

use crate::OperationError;

pub(crate) const RGBA_F32: PixelFormat = PixelFormat::RgbaF32;

/// Writes `rect` at `level` with `shade` evaluated at the level-0 coordinate
/// of each level pixel's top-left corner.
pub(crate) fn write_generated(
    output: &TiledBuffer,
    rect: Rect,
    level: u8,
    shade: impl Fn(i32, i32) -> [f32; 4],
) -> Result<(), OperationError> {
    let level_rect = rect.to_level(level);
    let pixel_bytes = RGBA_F32.bytes_per_pixel();
    let mut pixels = vec![0u8; level_rect.area() as usize * pixel_bytes];
    let rows = pixels.chunks_exact_mut(level_rect.width as usize * pixel_bytes);
    for (row, y) in rows.zip(level_rect.y..level_rect.bottom()) {
        for (pixel, x) in row.chunks_exact_mut(pixel_bytes).zip(level_rect.x..level_rect.right()) {
            RGBA_F32.encode_rgba(shade(x << level, y << level), pixel);
        }
    }
    output.set(rect, level, RGBA_F32, &pixels)?;
    Ok(())
}
