//! Lock-step iteration over several tiled buffers.
//!
//! Every step exposes the same geometric chunk of each participant as linear,
//! format-converted memory. Chunk boundaries follow the union of all
//! participants' tile grids, so a chunk never straddles a tile of any
//! participant: equal tilings give whole tiles, mismatched edges, levels or
//! ROI offsets degrade to smaller sub-tile chunks. Chunks touching a
//! participant's abyss are served through the general read/write paths.

use model::{AbyssPolicy, AccessMode, MAX_LEVEL, PixelFormat, Rect};
use smallvec::SmallVec;

use crate::buffer::TiledBuffer;
use crate::scratch::ScratchBuffer;
use crate::{BufferError, InvalidRegionReason, IteratorError};

pub const MAX_PARTICIPANTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantIndex(usize);

impl ParticipantIndex {
    /// The buffer passed to [`BufferIterator::new`].
    pub const FIRST: Self = Self(0);

    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Participant<'a> {
    buffer: &'a TiledBuffer,
    level_roi: Rect,
    level: u8,
    format: PixelFormat,
    access: AccessMode,
    abyss: AbyssPolicy,
    scratch: ScratchBuffer,
    chunk: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IterationState {
    NotStarted,
    InChunk,
    Between,
    Finished,
}

#[derive(Debug)]
pub struct BufferIterator<'a> {
    participants: SmallVec<[Participant<'a>; MAX_PARTICIPANTS]>,
    width: i32,
    height: i32,
    cursor_x: i32,
    cursor_y: i32,
    band_height: i32,
    length: usize,
    state: IterationState,
}

impl<'a> BufferIterator<'a> {
    /// `roi` is in level-0 units; the iterator walks `roi.to_level(level)`.
    pub fn new(
        buffer: &'a TiledBuffer,
        roi: Rect,
        level: u8,
        format: PixelFormat,
        access: AccessMode,
        abyss: AbyssPolicy,
    ) -> Result<Self, IteratorError> {
        let mut iterator = Self {
            participants: SmallVec::new(),
            width: 0,
            height: 0,
            cursor_x: 0,
            cursor_y: 0,
            band_height: 0,
            length: 0,
            state: IterationState::NotStarted,
        };
        iterator.add(buffer, roi, level, format, access, abyss)?;
        Ok(iterator)
    }

    /// Registers another buffer processed in sync with the first one. Its ROI
    /// must have the same size as the first participant's at their levels.
    pub fn add(
        &mut self,
        buffer: &'a TiledBuffer,
        roi: Rect,
        level: u8,
        format: PixelFormat,
        access: AccessMode,
        abyss: AbyssPolicy,
    ) -> Result<ParticipantIndex, IteratorError> {
        if self.state != IterationState::NotStarted {
            return Err(IteratorError::AlreadyStarted);
        }
        if self.participants.len() >= MAX_PARTICIPANTS {
            return Err(IteratorError::Overflow {
                max: MAX_PARTICIPANTS,
            });
        }
        if level > MAX_LEVEL {
            return Err(BufferError::InvalidLevel(level).into());
        }
        if roi.is_empty() {
            return Err(IteratorError::InvalidRegion {
                rect: roi,
                reason: InvalidRegionReason::Empty,
            });
        }
        let level_roi = roi.to_level(level);
        if let Some(first) = self.participants.first()
            && (first.level_roi.width != level_roi.width
                || first.level_roi.height != level_roi.height)
        {
            return Err(IteratorError::InvalidRegion {
                rect: roi,
                reason: InvalidRegionReason::SizeMismatch,
            });
        }
        if abyss == AbyssPolicy::None && !buffer.level_extent(level).contains_rect(&level_roi) {
            return Err(IteratorError::InvalidRegion {
                rect: roi,
                reason: InvalidRegionReason::OutsideExtent,
            });
        }

        if self.participants.is_empty() {
            self.width = level_roi.width;
            self.height = level_roi.height;
        }
        self.participants.push(Participant {
            buffer,
            level_roi,
            level,
            format,
            access,
            abyss,
            scratch: ScratchBuffer::default(),
            chunk: Rect::EMPTY,
        });
        Ok(ParticipantIndex(self.participants.len() - 1))
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Pixel count of the current chunk.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Current chunk of a participant, in that participant's level pixels.
    pub fn chunk_rect(&self, participant: ParticipantIndex) -> Rect {
        self.participants[participant.0].chunk
    }

    pub fn level(&self, participant: ParticipantIndex) -> u8 {
        self.participants[participant.0].level
    }

    pub fn data(&self, participant: ParticipantIndex) -> &[u8] {
        self.participants[participant.0].scratch.bytes()
    }

    pub fn data_mut(&mut self, participant: ParticipantIndex) -> &mut [u8] {
        self.participants[participant.0].scratch.bytes_mut()
    }

    /// Float view of the chunk; meaningful for the `*F32` formats.
    pub fn data_f32(&self, participant: ParticipantIndex) -> &[f32] {
        self.participants[participant.0].scratch.as_f32()
    }

    pub fn data_f32_mut(&mut self, participant: ParticipantIndex) -> &mut [f32] {
        self.participants[participant.0].scratch.as_f32_mut()
    }

    /// Chunk of `source` alongside the mutable chunk of `target`, for copying
    /// between participants without an intermediate buffer. `None` when both
    /// name the same participant.
    pub fn data_pair(
        &mut self,
        source: ParticipantIndex,
        target: ParticipantIndex,
    ) -> Option<(&[u8], &mut [u8])> {
        let (source, target) = (source.0, target.0);
        if source == target {
            return None;
        }
        let participants = self.participants.as_mut_slice();
        if source < target {
            let (head, tail) = participants.split_at_mut(target);
            Some((head[source].scratch.bytes(), tail[0].scratch.bytes_mut()))
        } else {
            let (head, tail) = participants.split_at_mut(source);
            Some((tail[0].scratch.bytes(), head[target].scratch.bytes_mut()))
        }
    }

    /// Stores the previous chunk of every writing participant, then moves to
    /// the next one. Returns `false` once the whole ROI has been processed.
    pub fn next(&mut self) -> Result<bool, IteratorError> {
        if self.state == IterationState::InChunk {
            self.state = IterationState::Between;
            self.flush_chunk()?;
        }
        if self.state == IterationState::Finished {
            return Ok(false);
        }
        let Some(offset) = self.advance() else {
            self.state = IterationState::Finished;
            self.length = 0;
            return Ok(false);
        };

        self.length = offset.area() as usize;
        for participant in &mut self.participants {
            participant.chunk = offset.translate(participant.level_roi.x, participant.level_roi.y);
            participant
                .scratch
                .reset(self.length * participant.format.bytes_per_pixel());
            if participant.access.reads() {
                load_chunk(participant)?;
            }
        }
        self.state = IterationState::InChunk;
        log::trace!("iterator chunk {offset:?} ({} pixels)", self.length);
        Ok(true)
    }

    /// Flushes the pending chunk and ends the iteration.
    pub fn finish(mut self) -> Result<(), IteratorError> {
        let pending = self.state == IterationState::InChunk;
        self.state = IterationState::Finished;
        if pending {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Cancels the iteration. Writes made to the current chunk are discarded.
    pub fn stop(mut self) {
        if self.state == IterationState::InChunk {
            log::debug!("iterator stopped, discarding unflushed chunk");
        }
        self.state = IterationState::Finished;
    }

    fn advance(&mut self) -> Option<Rect> {
        if self.width <= 0 || self.cursor_y >= self.height {
            return None;
        }
        if self.cursor_x == 0 {
            let cursor_y = self.cursor_y;
            self.band_height = self
                .participants
                .iter()
                .map(|participant| {
                    participant
                        .buffer
                        .grid()
                        .distance_to_boundary(participant.level_roi.y + cursor_y)
                })
                .fold(self.height - cursor_y, i32::min);
        }
        let cursor_x = self.cursor_x;
        let width = self
            .participants
            .iter()
            .map(|participant| {
                participant
                    .buffer
                    .grid()
                    .distance_to_boundary(participant.level_roi.x + cursor_x)
            })
            .fold(self.width - cursor_x, i32::min);

        let chunk = Rect::new(cursor_x, self.cursor_y, width, self.band_height);
        self.cursor_x += width;
        if self.cursor_x >= self.width {
            self.cursor_x = 0;
            self.cursor_y += self.band_height;
        }
        Some(chunk)
    }

    fn flush_chunk(&mut self) -> Result<(), IteratorError> {
        for participant in &self.participants {
            if !participant.access.writes() {
                continue;
            }
            participant.buffer.write_level(
                participant.level,
                participant.chunk,
                participant.format,
                participant.abyss,
                participant.scratch.bytes(),
            )?;
        }
        Ok(())
    }
}

fn load_chunk(participant: &mut Participant<'_>) -> Result<(), BufferError> {
    let inside = participant
        .buffer
        .level_extent(participant.level)
        .contains_rect(&participant.chunk);
    if inside {
        return participant.buffer.read_within_tile(
            participant.level,
            participant.chunk,
            participant.format,
            participant.scratch.bytes_mut(),
        );
    }
    participant.buffer.read_level(
        participant.level,
        participant.chunk,
        participant.format,
        1.0,
        participant.abyss,
        participant.scratch.bytes_mut(),
    )
}

impl Drop for BufferIterator<'_> {
    fn drop(&mut self) {
        if self.state != IterationState::InChunk {
            return;
        }
        self.state = IterationState::Finished;
        if let Err(error) = self.flush_chunk() {
            log::error!("buffer iterator failed to store its last chunk: {error}");
        }
    }
}
