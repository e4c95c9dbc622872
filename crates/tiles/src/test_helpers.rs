use model::{PixelFormat, Rect};

use crate::{BufferError, TiledBuffer};

/// Deterministic RGBA value for a level-0 pixel coordinate.
pub fn pattern_pixel(x: i32, y: i32) -> [f32; 4] {
    [
        x.rem_euclid(256) as f32 / 256.0,
        y.rem_euclid(256) as f32 / 256.0,
        (x + y).rem_euclid(7) as f32 / 8.0,
        1.0,
    ]
}

pub fn pattern_bytes(rect: Rect) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(rect.area() as usize * 16);
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            for channel in pattern_pixel(x, y) {
                bytes.extend_from_slice(&channel.to_ne_bytes());
            }
        }
    }
    bytes
}

pub fn write_pattern(buffer: &TiledBuffer, rect: Rect) -> Result<Rect, BufferError> {
    buffer.set(rect, 0, PixelFormat::RgbaF32, &pattern_bytes(rect))
}

pub fn rgba_at(pixels: &[u8], width: i32, x: i32, y: i32) -> [f32; 4] {
    let offset = (y as usize * width as usize + x as usize) * 16;
    PixelFormat::RgbaF32.decode_rgba(&pixels[offset..offset + 16])
}
