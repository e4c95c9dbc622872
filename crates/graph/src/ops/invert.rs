use model::{AbyssPolicy, AccessMode, Rect};
use tiles::{BufferIterator, ParticipantIndex, TiledBuffer};

use super::RGBA_F32;
use crate::{FormatRequirements, Operation, OperationContext, OperationError};

/// Inverts the color channels and keeps alpha.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invert;

impl Operation for Invert {
    fn name(&self) -> &'static str {
        "invert"
    }

    fn prepare(&self, _context: &OperationContext) -> FormatRequirements {
        FormatRequirements::filter(RGBA_F32)
    }

    fn bounding_box(&self, input: Option<Rect>) -> Option<Rect> {
        input
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
        let mut iterator = BufferIterator::new(
            input,
            rect,
            level,
            RGBA_F32,
            AccessMode::READ,
            AbyssPolicy::Clear,
        )?;
        let destination = iterator.add(
            output,
            rect,
            level,
            RGBA_F32,
            AccessMode::WRITE,
            AbyssPolicy::Clear,
        )?;
        while iterator.next()? {
            let source = iterator.data_f32(ParticipantIndex::FIRST).to_vec();
            let target = iterator.data_f32_mut(destination);
            for (out, pixel) in target.chunks_exact_mut(4).zip(source.chunks_exact(4)) {
                out[0] = 1.0 - pixel[0];
                out[1] = 1.0 - pixel[1];
                out[2] = 1.0 - pixel[2];
                out[3] = pixel[3];
            }
        }
        iterator.finish()?;
        Ok(())
    }
}
