use thiserror::Error;

/// Linear pixel layouts a buffer can store or a caller can request.
///
/// Conversion goes through a straight RGBA `f32` intermediate. Gray is derived
/// with Rec. 709 luma weights, missing alpha reads as opaque, and 8-bit
/// channels are clamped to `[0, 1]` and rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    RgbaF32,
    RgbF32,
    YaF32,
    YF32,
    RgbaU8,
    RgbU8,
    YU8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("source holds {actual} bytes, expected {expected} for {pixels} pixels")]
    SourceLength {
        pixels: usize,
        expected: usize,
        actual: usize,
    },
    #[error("destination holds {actual} bytes, expected {expected} for {pixels} pixels")]
    DestinationLength {
        pixels: usize,
        expected: usize,
        actual: usize,
    },
}

const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

impl PixelFormat {
    pub const fn components(self) -> usize {
        match self {
            PixelFormat::RgbaF32 | PixelFormat::RgbaU8 => 4,
            PixelFormat::RgbF32 | PixelFormat::RgbU8 => 3,
            PixelFormat::YaF32 => 2,
            PixelFormat::YF32 | PixelFormat::YU8 => 1,
        }
    }

    pub const fn bytes_per_component(self) -> usize {
        match self {
            PixelFormat::RgbaU8 | PixelFormat::RgbU8 | PixelFormat::YU8 => 1,
            _ => 4,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        self.components() * self.bytes_per_component()
    }

    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::RgbaF32 | PixelFormat::YaF32 | PixelFormat::RgbaU8
        )
    }

    pub const fn is_gray(self) -> bool {
        matches!(
            self,
            PixelFormat::YaF32 | PixelFormat::YF32 | PixelFormat::YU8
        )
    }

    fn read_component(self, pixel: &[u8], index: usize) -> f32 {
        if self.bytes_per_component() == 1 {
            return pixel[index] as f32 / 255.0;
        }
        let offset = index * 4;
        bytemuck::pod_read_unaligned::<f32>(&pixel[offset..offset + 4])
    }

    fn write_component(self, pixel: &mut [u8], index: usize, value: f32) {
        if self.bytes_per_component() == 1 {
            pixel[index] = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
            return;
        }
        let offset = index * 4;
        pixel[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(&value));
    }

    /// Decodes one pixel (`bytes_per_pixel` bytes) into straight RGBA.
    pub fn decode_rgba(self, pixel: &[u8]) -> [f32; 4] {
        let alpha = if self.has_alpha() {
            self.read_component(pixel, self.components() - 1)
        } else {
            1.0
        };
        if self.is_gray() {
            let luma = self.read_component(pixel, 0);
            return [luma, luma, luma, alpha];
        }
        [
            self.read_component(pixel, 0),
            self.read_component(pixel, 1),
            self.read_component(pixel, 2),
            alpha,
        ]
    }

    /// Encodes straight RGBA into one pixel (`bytes_per_pixel` bytes).
    pub fn encode_rgba(self, rgba: [f32; 4], pixel: &mut [u8]) {
        if self.is_gray() {
            let luma = rgba[0] * LUMA_WEIGHTS[0] + rgba[1] * LUMA_WEIGHTS[1] + rgba[2] * LUMA_WEIGHTS[2];
            self.write_component(pixel, 0, luma);
        } else {
            for channel in 0..3 {
                self.write_component(pixel, channel, rgba[channel]);
            }
        }
        if self.has_alpha() {
            self.write_component(pixel, self.components() - 1, rgba[3]);
        }
    }

    pub fn encode_rgba_to_vec(self, rgba: [f32; 4]) -> Vec<u8> {
        let mut pixel = vec![0u8; self.bytes_per_pixel()];
        self.encode_rgba(rgba, &mut pixel);
        pixel
    }
}

/// Converts `pixels` pixels from `src_format` to `dst_format`.
pub fn convert_pixels(
    src_format: PixelFormat,
    src: &[u8],
    dst_format: PixelFormat,
    dst: &mut [u8],
    pixels: usize,
) -> Result<(), FormatError> {
    let src_bpp = src_format.bytes_per_pixel();
    let dst_bpp = dst_format.bytes_per_pixel();
    let expected_src = pixels * src_bpp;
    let expected_dst = pixels * dst_bpp;
    if src.len() < expected_src {
        return Err(FormatError::SourceLength {
            pixels,
            expected: expected_src,
            actual: src.len(),
        });
    }
    if dst.len() < expected_dst {
        return Err(FormatError::DestinationLength {
            pixels,
            expected: expected_dst,
            actual: dst.len(),
        });
    }
    if src_format == dst_format {
        dst[..expected_dst].copy_from_slice(&src[..expected_src]);
        return Ok(());
    }
    for (src_pixel, dst_pixel) in src[..expected_src]
        .chunks_exact(src_bpp)
        .zip(dst[..expected_dst].chunks_exact_mut(dst_bpp))
    {
        dst_format.encode_rgba(src_format.decode_rgba(src_pixel), dst_pixel);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_to_float_round_trip_is_exact() {
        let rgba = [0.125f32, 0.5, 0.75, 0.25];
        let src: Vec<u8> = rgba.iter().flat_map(|value| value.to_ne_bytes()).collect();
        let mut rgb = vec![0u8; PixelFormat::RgbF32.bytes_per_pixel()];
        convert_pixels(PixelFormat::RgbaF32, &src, PixelFormat::RgbF32, &mut rgb, 1)
            .expect("convert to rgb");

        assert_eq!(PixelFormat::RgbF32.decode_rgba(&rgb), [0.125, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn u8_values_survive_float_intermediate() {
        let src: Vec<u8> = (0..=255u8).flat_map(|value| [value, 255 - value, value / 2, 7]).collect();
        let pixels = 256;
        let mut float = vec![0u8; pixels * PixelFormat::RgbaF32.bytes_per_pixel()];
        let mut back = vec![0u8; src.len()];
        convert_pixels(PixelFormat::RgbaU8, &src, PixelFormat::RgbaF32, &mut float, pixels)
            .expect("to float");
        convert_pixels(PixelFormat::RgbaF32, &float, PixelFormat::RgbaU8, &mut back, pixels)
            .expect("to u8");

        assert_eq!(back, src);
    }

    #[test]
    fn gray_reads_back_as_replicated_channels() {
        let pixel = PixelFormat::YF32.encode_rgba_to_vec([1.0, 1.0, 1.0, 1.0]);
        let rgba = PixelFormat::YF32.decode_rgba(&pixel);
        for channel in &rgba[..3] {
            assert!((channel - 1.0).abs() < 1e-6);
        }
        assert_eq!(rgba[3], 1.0);
    }

    #[test]
    fn rejects_short_destination() {
        let src = vec![0u8; 8];
        let mut dst = vec![0u8; 3];
        let error = convert_pixels(PixelFormat::RgbaU8, &src, PixelFormat::RgbU8, &mut dst, 2)
            .expect_err("short destination");
        assert!(matches!(error, FormatError::DestinationLength { expected: 6, .. }));
    }
}
