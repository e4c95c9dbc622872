use std::sync::Arc;

use model::{AbyssPolicy, Rect};
use tiles::TiledBuffer;

use super::RGBA_F32;
use crate::{FormatRequirements, Operation, OperationContext, OperationError};

/// Exposes an existing buffer as a graph source. Outside its extent the
/// source is transparent.
#[derive(Debug, Clone)]
pub struct BufferSource {
    buffer: Arc<TiledBuffer>,
}

impl BufferSource {
    pub fn new(buffer: Arc<TiledBuffer>) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &Arc<TiledBuffer> {
        &self.buffer
    }
}

impl Operation for BufferSource {
    fn name(&self) -> &'static str {
        "buffer-source"
    }

    fn prepare(&self, _context: &OperationContext) -> FormatRequirements {
        FormatRequirements::source(RGBA_F32)
    }

    fn bounding_box(&self, _input: Option<Rect>) -> Option<Rect> {
        Some(self.buffer.extent())
    }

    fn process(
        &self,
        _input: Option<&TiledBuffer>,
        output: &TiledBuffer,
        rect: Rect,
        level: u8,
    ) -> Result<(), OperationError> {
        let (width, height) = TiledBuffer::output_size(rect, level, 1.0);
        let mut pixels = vec![0u8; width * height * RGBA_F32.bytes_per_pixel()];
        self.buffer
            .get(rect, level, RGBA_F32, 1.0, AbyssPolicy::Clear, &mut pixels)?;
        output.set(rect, level, RGBA_F32, &pixels)?;
        Ok(())
    }
}
