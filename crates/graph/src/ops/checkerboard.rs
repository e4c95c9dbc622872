use model::Rect;
use tiles::TiledBuffer;

use super::{RGBA_F32, write_generated};
use crate::{FormatRequirements, Operation, OperationContext, OperationError};

/// Unbounded two-color checkerboard with square cells anchored at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkerboard {
    cell: i32,
    colors: [[f32; 4]; 2],
}

impl Checkerboard {
    pub fn new(cell: u32, colors: [[f32; 4]; 2]) -> Result<Self, OperationError> {
        let cell = i32::try_from(cell).map_err(|_| OperationError::InvalidCellSize)?;
        if cell < 1 {
            return Err(OperationError::InvalidCellSize);
        }
        Ok(Self { cell, colors })
    }

    pub fn color_at(&self, x: i32, y: i32) -> [f32; 4] {
        let parity = (x.div_euclid(self.cell) + y.div_euclid(self.cell)).rem_euclid(2);
        self.colors[parity as usize]
    }
}

impl Operation for Checkerboard {
    fn name(&self) -> &'static str {
        "checkerboard"
    }

    fn prepare(&self, _context: &OperationContext) -> FormatRequirements {
        FormatRequirements::source(RGBA_F32)
    }

    fn bounding_box(&self, _input: Option<Rect>) -> Option<Rect> {
        None
    }

    fn process(
        &self,
        _input: Option<&TiledBuffer>,
        output: &TiledBuffer,
        rect: Rect,
        level: u8,
    ) -> Result<(), OperationError> {
        write_generated(output, rect, level, |x, y| self.color_at(x, y))
    }
}
