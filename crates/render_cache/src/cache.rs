use std::sync::Arc;

use model::{AbyssPolicy, AccessMode, MAX_LEVEL, Rect, Region};
use render_protocol::{CacheEvent, StepOutcome};
use tiles::{BufferIterator, ParticipantIndex, TiledBuffer, TiledBufferConfig};

use crate::dirty::{DirtyEntry, DirtyRegionQueue};
use crate::notifier::GraphNotifier;
use crate::{ProducerError, RegionProducer, RenderCacheError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCacheConfig {
    /// Upper bound on pixels computed by one step. A step always covers at
    /// least one tile cell, whatever this says.
    pub max_step_pixels: u64,
    /// Compute attempts per region before it is recorded as failed.
    pub max_retries: u32,
    pub level: u8,
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self {
            max_step_pixels: 128 * 128,
            max_retries: 3,
            level: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Idle,
    Pending,
    Stepping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedRegion {
    pub rect: Rect,
    pub attempts: u32,
}

/// Incrementally fills `buffer` with the output of `producer`.
///
/// Work is requested with [`RenderCache::enqueue`] and performed one bounded
/// chunk per [`RenderCache::render_step`]. Every committed chunk is announced
/// as [`CacheEvent::Computed`] through the notifier.
#[derive(Debug)]
pub struct RenderCache {
    buffer: Arc<TiledBuffer>,
    producer: Arc<dyn RegionProducer>,
    config: RenderCacheConfig,
    queue: DirtyRegionQueue,
    committed: Region,
    failed: Vec<FailedRegion>,
    /// Chunks that failed and wait for a retry. Kept apart from the queue so
    /// that dequeue and merge do not reset their attempt counts.
    retrying: Vec<FailedRegion>,
    notifier: GraphNotifier,
    state: CacheState,
}

impl RenderCache {
    pub fn new(
        buffer: Arc<TiledBuffer>,
        producer: Arc<dyn RegionProducer>,
        config: RenderCacheConfig,
    ) -> Result<Self, RenderCacheError> {
        if config.max_step_pixels == 0 {
            return Err(RenderCacheError::InvalidConfig(
                "max_step_pixels must be at least 1",
            ));
        }
        if config.max_retries == 0 {
            return Err(RenderCacheError::InvalidConfig(
                "max_retries must be at least 1",
            ));
        }
        if config.level > MAX_LEVEL {
            return Err(RenderCacheError::InvalidConfig("level exceeds MAX_LEVEL"));
        }
        Ok(Self {
            buffer,
            producer,
            config,
            queue: DirtyRegionQueue::new(),
            committed: Region::new(),
            failed: Vec::new(),
            retrying: Vec::new(),
            notifier: GraphNotifier::new(),
            state: CacheState::Idle,
        })
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn config(&self) -> RenderCacheConfig {
        self.config
    }

    pub fn buffer(&self) -> &Arc<TiledBuffer> {
        &self.buffer
    }

    pub fn notifier(&self) -> &GraphNotifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut GraphNotifier {
        &mut self.notifier
    }

    pub fn pending_rects(&self) -> Vec<Rect> {
        self.queue.rects()
    }

    pub fn pending_area(&self) -> u64 {
        self.queue.area()
    }

    pub fn committed_region(&self) -> &Region {
        &self.committed
    }

    pub fn failed_regions(&self) -> &[FailedRegion] {
        &self.failed
    }

    /// Requests `rect` (level-0 units). Area already committed or recorded as
    /// failed is skipped; the rest is clipped to the buffer extent and the
    /// producer's bounding box. Returns whether pending work changed.
    pub fn enqueue(&mut self, rect: Rect) -> bool {
        let mut wanted = rect.intersect(&self.buffer.extent());
        if let Some(bounds) = self.producer.bounding_box() {
            wanted = wanted.intersect(&bounds);
        }
        if wanted.is_empty() {
            return false;
        }

        let mut skipped = self.committed.clone();
        for failed in &self.failed {
            skipped.add(failed.rect);
        }
        let mut changed = false;
        for piece in skipped.uncovered_parts(wanted) {
            changed |= self.queue.enqueue(piece);
        }
        if changed {
            log::debug!(
                "render cache enqueued {wanted:?}, {} pending pixels",
                self.queue.area()
            );
        }
        self.refresh_state();
        changed
    }

    /// Drops pending work inside `rect`, or all pending work for `None`.
    pub fn dequeue(&mut self, rect: Option<Rect>) {
        self.queue.dequeue(rect);
        self.refresh_state();
    }

    /// Computes and commits at most one chunk of pending work.
    ///
    /// On a producer failure nothing is committed; the chunk is retried later
    /// or, once attempts reach `max_retries`, recorded in
    /// [`RenderCache::failed_regions`] and announced as [`CacheEvent::Failed`].
    pub fn render_step(&mut self) -> Result<StepOutcome, RenderCacheError> {
        let Some(entry) = self.queue.pop_front() else {
            self.state = CacheState::Idle;
            return Ok(StepOutcome::Done);
        };
        self.state = CacheState::Stepping;

        let chunk = self.cut_chunk(entry.rect);
        for piece in entry.rect.subtract(&chunk).into_iter().rev() {
            self.queue.push_front(DirtyEntry {
                rect: piece,
                attempts: entry.attempts,
            });
        }

        let result = self.compute_chunk(chunk);
        let outcome = match result {
            Ok(()) => {
                self.committed.add(chunk);
                let committed = &self.committed;
                self.retrying
                    .retain(|pending| !committed.contains_rect(&pending.rect));
                log::debug!("render cache committed {chunk:?}");
                self.notifier.emit(CacheEvent::Computed(chunk));
                Ok(self.outcome())
            }
            Err(RenderCacheError::ComputeFailure { source, .. }) => {
                let attempts = self.previous_attempts(chunk).max(entry.attempts) + 1;
                Err(self.record_failure(attempts, chunk, source))
            }
            Err(error) => {
                log::error!("render cache dropped {chunk:?}: {error}");
                Err(error)
            }
        };
        self.refresh_state();
        outcome
    }

    /// Marks `rect` as stale: it leaves the committed region, pending work
    /// and failure records, and tiles lying wholly inside it are evicted.
    pub fn invalidate(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.committed.subtract(rect);
        self.queue.dequeue(Some(rect));
        self.failed.retain(|failed| !failed.rect.intersects(&rect));
        self.retrying.retain(|pending| !pending.rect.intersects(&rect));
        let evicted = self.buffer.evict(rect);
        log::debug!("render cache invalidated {rect:?}, {evicted} tiles evicted");
        self.notifier.emit(CacheEvent::Invalidated(rect));
        self.refresh_state();
    }

    /// Largest tile-aligned piece at the top-left of `rect`: one row band of
    /// tile columns that fits `max_step_pixels`, never less than one cell.
    fn cut_chunk(&self, rect: Rect) -> Rect {
        let level = self.config.level;
        let grid = self.buffer.grid();
        let level_rect = rect.to_level(level);

        let top = level_rect.y;
        let bottom = (top + grid.distance_to_boundary(top)).min(level_rect.bottom());
        let band_height = u64::from((bottom - top).unsigned_abs());

        let left = level_rect.x;
        let mut right = (left + grid.distance_to_boundary(left)).min(level_rect.right());
        while right < level_rect.right() {
            let next = (right + grid.distance_to_boundary(right)).min(level_rect.right());
            let width = u64::from((next - left).unsigned_abs());
            if width * band_height > self.config.max_step_pixels {
                break;
            }
            right = next;
        }

        Rect::from_edges(left, top, right, bottom)
            .from_level(level)
            .intersect(&rect)
    }

    fn compute_chunk(&self, chunk: Rect) -> Result<(), RenderCacheError> {
        let level = self.config.level;
        let staging = TiledBuffer::new(
            chunk,
            TiledBufferConfig {
                tile_edge: self.buffer.tile_edge(),
                format: self.buffer.format(),
                abyss: AbyssPolicy::Clear,
            },
        )?;
        self.producer
            .compute(chunk, level, &staging)
            .map_err(|source| RenderCacheError::ComputeFailure {
                rect: chunk,
                attempts: 0,
                will_retry: false,
                source,
            })?;

        let format = self.buffer.format();
        let mut iterator = BufferIterator::new(
            &staging,
            chunk,
            level,
            format,
            AccessMode::READ,
            AbyssPolicy::Clear,
        )?;
        let target = iterator.add(
            &self.buffer,
            chunk,
            level,
            format,
            AccessMode::WRITE,
            AbyssPolicy::Clear,
        )?;
        while iterator.next()? {
            if let Some((staged, stored)) = iterator.data_pair(ParticipantIndex::FIRST, target) {
                stored.copy_from_slice(staged);
            }
        }
        iterator.finish()?;
        Ok(())
    }

    fn record_failure(
        &mut self,
        attempts: u32,
        chunk: Rect,
        source: ProducerError,
    ) -> RenderCacheError {
        let will_retry = attempts < self.config.max_retries;
        self.retrying
            .retain(|pending| !chunk.contains_rect(&pending.rect));
        if will_retry {
            self.retrying.push(FailedRegion {
                rect: chunk,
                attempts,
            });
            log::warn!("computing {chunk:?} failed (attempt {attempts}), retrying later: {source}");
            self.queue.push_back(DirtyEntry {
                rect: chunk,
                attempts,
            });
        } else {
            log::error!("computing {chunk:?} failed {attempts} times, giving up: {source}");
            self.failed.push(FailedRegion {
                rect: chunk,
                attempts,
            });
            self.notifier.emit(CacheEvent::Failed(chunk));
        }
        RenderCacheError::ComputeFailure {
            rect: chunk,
            attempts,
            will_retry,
            source,
        }
    }

    /// Highest attempt count recorded for earlier failures overlapping `chunk`.
    fn previous_attempts(&self, chunk: Rect) -> u32 {
        self.retrying
            .iter()
            .filter(|pending| pending.rect.intersects(&chunk))
            .map(|pending| pending.attempts)
            .max()
            .unwrap_or(0)
    }

    fn outcome(&self) -> StepOutcome {
        if self.queue.is_empty() {
            StepOutcome::Done
        } else {
            StepOutcome::MoreWork
        }
    }

    fn refresh_state(&mut self) {
        self.state = if self.queue.is_empty() {
            CacheState::Idle
        } else {
            CacheState::Pending
        };
    }
}
