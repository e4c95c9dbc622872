mod cache;
mod dirty;
mod notifier;

pub use cache::{CacheState, FailedRegion, RenderCache, RenderCacheConfig};
pub use dirty::{DirtyEntry, DirtyRegionQueue};
pub use notifier::{GraphNotifier, SubscriptionId};

use std::fmt::Debug;

use frame_scheduler::StepTask;
use graph::GraphNodeProducer;
use model::Rect;
use render_protocol::StepOutcome;
use thiserror::Error;
use tiles::{BufferError, IteratorError, TiledBuffer};

pub type ProducerError = Box<dyn std::error::Error + Send + Sync>;

/// Source of the pixels a [`RenderCache`] commits.
pub trait RegionProducer: Debug + Send + Sync {
    /// Area with content, in level-0 units; `None` is unbounded.
    fn bounding_box(&self) -> Option<Rect>;

    /// Writes `rect` at `level` into `output`, whose extent covers `rect`.
    fn compute(&self, rect: Rect, level: u8, output: &TiledBuffer) -> Result<(), ProducerError>;
}

impl RegionProducer for GraphNodeProducer {
    fn bounding_box(&self) -> Option<Rect> {
        match GraphNodeProducer::bounding_box(self) {
            Ok(bounds) => bounds,
            Err(error) => {
                log::warn!("bounding box of node {:?} unavailable: {error}", self.node());
                None
            }
        }
    }

    fn compute(&self, rect: Rect, level: u8, output: &TiledBuffer) -> Result<(), ProducerError> {
        GraphNodeProducer::compute(self, rect, level, output)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RenderCacheError {
    #[error("computing {rect:?} failed on attempt {attempts} (will retry: {will_retry})")]
    ComputeFailure {
        rect: Rect,
        attempts: u32,
        will_retry: bool,
        #[source]
        source: ProducerError,
    },
    #[error("invalid render cache config: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    Iterator(#[from] IteratorError),
}

impl StepTask for RenderCache {
    type Error = RenderCacheError;

    fn step(&mut self) -> Result<StepOutcome, RenderCacheError> {
        self.render_step()
    }

    fn pending_steps(&self) -> u32 {
        let per_step = self.config().max_step_pixels.max(1);
        u32::try_from(self.pending_area().div_ceil(per_step)).unwrap_or(u32::MAX)
    }
}
