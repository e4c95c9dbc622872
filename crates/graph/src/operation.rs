use std::fmt::Debug;

use model::{PixelFormat, Rect};
use tiles::TiledBuffer;

use crate::OperationError;

/// What an operation learns about its surroundings before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationContext {
    /// `None` for source operations and for unbounded inputs.
    pub input_bounding_box: Option<Rect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatRequirements {
    pub input: Option<PixelFormat>,
    pub output: PixelFormat,
}

impl FormatRequirements {
    pub const fn source(output: PixelFormat) -> Self {
        Self {
            input: None,
            output,
        }
    }

    pub const fn filter(format: PixelFormat) -> Self {
        Self {
            input: Some(format),
            output: format,
        }
    }
}

/// Pixel kernel of a graph node.
///
/// Rectangles are in level-0 units. `process` writes `rect` at `level` into
/// `output`, reading from `input`, which the graph has filled over
/// [`Operation::input_region`] of `rect`.
pub trait Operation: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn prepare(&self, context: &OperationContext) -> FormatRequirements;

    fn input_region(&self, rect: Rect) -> Rect {
        rect
    }

    /// Area the operation can produce non-empty pixels in. `None` is unbounded.
    fn bounding_box(&self, input: Option<Rect>) -> Option<Rect>;

    fn process(
        &self,
        input: Option<&TiledBuffer>,
        output: &TiledBuffer,
        rect: Rect,
        level: u8,
    ) -> Result<(), OperationError>;
}
