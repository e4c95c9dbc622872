use model::Rect;
use tiles::TiledBuffer;

use super::{RGBA_F32, write_generated};
use crate::{FormatRequirements, Operation, OperationContext, OperationError};

/// Solid color, optionally limited to `extent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub color: [f32; 4],
    pub extent: Option<Rect>,
}

impl Fill {
    pub const fn new(color: [f32; 4]) -> Self {
        Self {
            color,
            extent: None,
        }
    }

    pub const fn with_extent(mut self, extent: Rect) -> Self {
        self.extent = Some(extent);
        self
    }
}

impl Operation for Fill {
    fn name(&self) -> &'static str {
        "fill"
    }

    fn prepare(&self, _context: &OperationContext) -> FormatRequirements {
        FormatRequirements::source(RGBA_F32)
    }

    fn bounding_box(&self, _input: Option<Rect>) -> Option<Rect> {
        self.extent
    }

    fn process(
        &self,
        _input: Option<&TiledBuffer>,
        output: &TiledBuffer,
        rect: Rect,
        level: u8,
    ) -> Result<(), OperationError> {
        write_generated(output, rect, level, |x, y| match self.extent {
            Some(extent) if !extent.contains_point(x, y) => [0.0; 4],
            _ => self.color,
        })
    }
}
