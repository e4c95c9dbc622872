use std::sync::OnceLock;

use model::{AbyssPolicy, Rect, floor_div_pow2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tiles::TiledBuffer;

use super::RGBA_F32;
use crate::{FormatRequirements, Operation, OperationContext, OperationError};

pub const MAX_SHIFT: u32 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShiftDirection {
    #[default]
    Horizontal,
    Vertical,
}

/// Per-line random offsets, indexed from `start` (first row or column of the
/// input bounding box).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ShiftOffsets {
    start: i32,
    values: Vec<i32>,
}

impl ShiftOffsets {
    fn generate(amount: i32, seed: u64, start: i32, len: i32) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let values = (0..len).map(|_| rng.random_range(-amount..amount)).collect();
        Self { start, values }
    }

    fn at(&self, line: i32) -> i32 {
        usize::try_from(line - self.start)
            .ok()
            .and_then(|index| self.values.get(index).copied())
            .unwrap_or(0)
    }
}

/// Displaces each row (or column) by a random amount in `[-amount, amount)`.
///
/// Offsets are drawn once per instance over the input bounding box seen by the
/// first `prepare`; lines outside it are not displaced.
#[derive(Debug)]
pub struct Shift {
    amount: i32,
    seed: u64,
    direction: ShiftDirection,
    offsets: OnceLock<ShiftOffsets>,
}

impl Shift {
    pub fn new(amount: u32, seed: u64, direction: ShiftDirection) -> Result<Self, OperationError> {
        if !(1..=MAX_SHIFT).contains(&amount) {
            return Err(OperationError::InvalidShiftAmount(amount));
        }
        Ok(Self {
            amount: amount as i32,
            seed,
            direction,
            offsets: OnceLock::new(),
        })
    }

    pub fn amount(&self) -> u32 {
        self.amount as u32
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn direction(&self) -> ShiftDirection {
        self.direction
    }

    /// Offset applied to level-0 `line`, or `None` before the first `prepare`
    /// with a bounded input.
    pub fn offset(&self, line: i32) -> Option<i32> {
        self.offsets.get().map(|offsets| offsets.at(line))
    }

    fn margins(&self) -> (i32, i32) {
        match self.direction {
            ShiftDirection::Horizontal => (self.amount, 0),
            ShiftDirection::Vertical => (0, self.amount),
        }
    }
}

impl Operation for Shift {
    fn name(&self) -> &'static str {
        "shift"
    }

    fn prepare(&self, context: &OperationContext) -> FormatRequirements {
        if let Some(bounds) = context.input_bounding_box {
            self.offsets.get_or_init(|| {
                let (start, len) = match self.direction {
                    ShiftDirection::Horizontal => (bounds.y, bounds.height),
                    ShiftDirection::Vertical => (bounds.x, bounds.width),
                };
                log::debug!("shift offsets drawn for {len} lines from seed {}", self.seed);
                ShiftOffsets::generate(self.amount, self.seed, start, len)
            });
        }
        FormatRequirements::filter(RGBA_F32)
    }

    fn input_region(&self, rect: Rect) -> Rect {
        let (horizontal, vertical) = self.margins();
        rect.expand(horizontal, vertical, horizontal, vertical)
    }

    fn bounding_box(&self, input: Option<Rect>) -> Option<Rect> {
        input.map(|bounds| self.input_region(bounds))
    }

    fn process(
        &self,
        input: Option<&TiledBuffer>,
        output: &TiledBuffer,
        rect: Rect,
        level: u8,
    ) -> Result<(), OperationError> {
        let input = input.ok_or(OperationError::MissingInput {
            operation: self.name(),
        })?;
        let offsets = self.offsets.get().ok_or(OperationError::UnboundedInput {
            operation: self.name(),
        })?;

        let source_rect = self.input_region(rect);
        let source = source_rect.to_level(level);
        let mut source_pixels = vec![0u8; source.area() as usize * RGBA_F32.bytes_per_pixel()];
        input.get(
            source_rect,
            level,
            RGBA_F32,
            1.0,
            AbyssPolicy::Clear,
            &mut source_pixels,
        )?;

        let target = rect.to_level(level);
        let pixel_bytes = RGBA_F32.bytes_per_pixel();
        let mut pixels = vec![0u8; target.area() as usize * pixel_bytes];
        let rows = pixels.chunks_exact_mut(target.width as usize * pixel_bytes);
        for (row, y) in rows.zip(target.y..target.bottom()) {
            for (pixel, x) in row.chunks_exact_mut(pixel_bytes).zip(target.x..target.right()) {
                let (sample_x, sample_y) = match self.direction {
                    ShiftDirection::Horizontal => {
                        (x + floor_div_pow2(offsets.at(y << level), level), y)
                    }
                    ShiftDirection::Vertical => {
                        (x, y + floor_div_pow2(offsets.at(x << level), level))
                    }
                };
                if !source.contains_point(sample_x, sample_y) {
                    continue;
                }
                let index = ((sample_y - source.y) as usize * source.width as usize
                    + (sample_x - source.x) as usize)
                    * pixel_bytes;
                pixel.copy_from_slice(&source_pixels[index..index + pixel_bytes]);
            }
        }
        output.set(rect, level, RGBA_F32, &pixels)?;
        Ok(())
    }
}
