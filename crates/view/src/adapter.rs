//! Bridges a render cache to something that presents pixels.
//!
//! Cache callbacks run inside `RenderCache` calls, so they only forward events
//! over a channel; [`ViewAdapter::process_events`] drains it later with the
//! cache borrowed mutably.

use crossbeam_channel::{Receiver, Sender};
use model::{AbyssPolicy, PixelFormat, Rect};
use render_cache::{RenderCache, SubscriptionId};
use render_protocol::{CacheEvent, CacheEventKind, DeviceRect, RepaintSink, Viewport};
use tiles::TiledBuffer;

use crate::{ViewError, ViewTransform, ViewTransformError};

/// RGB u8 pixels for a device rectangle. The image starts at the rectangle's
/// origin and may extend past it by less than one canvas pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedPixels {
    pub device_rect: DeviceRect,
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl ExposedPixels {
    pub fn rgb_at(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * self.width + x) * 3;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }
}

#[derive(Debug)]
pub struct ViewAdapter {
    transform: ViewTransform,
    viewport: Viewport,
    sender: Sender<CacheEvent>,
    events: Receiver<CacheEvent>,
    subscriptions: Vec<SubscriptionId>,
}

impl ViewAdapter {
    pub fn new(transform: ViewTransform, viewport: Viewport) -> Result<Self, ViewTransformError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(ViewTransformError::InvalidViewport);
        }
        let (sender, events) = crossbeam_channel::unbounded();
        Ok(Self {
            transform,
            viewport,
            sender,
            events,
            subscriptions: Vec::new(),
        })
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }

    /// Subscribes to computed and invalidated events of `cache` and requests
    /// the visible area.
    pub fn attach(&mut self, cache: &mut RenderCache) -> Result<(), ViewError> {
        if self.is_attached() {
            self.detach(cache);
        }
        for kind in [CacheEventKind::Computed, CacheEventKind::Invalidated] {
            let sender = self.sender.clone();
            let id = cache.notifier_mut().subscribe(kind, move |rect| {
                let event = match kind {
                    CacheEventKind::Computed => CacheEvent::Computed(rect),
                    CacheEventKind::Invalidated => CacheEvent::Invalidated(rect),
                    CacheEventKind::Failed => CacheEvent::Failed(rect),
                };
                if sender.send(event).is_err() {
                    log::trace!("view adapter gone, dropping {event:?}");
                }
            });
            self.subscriptions.push(id);
        }
        self.repaint(cache)
    }

    pub fn detach(&mut self, cache: &mut RenderCache) {
        for id in self.subscriptions.drain(..) {
            cache.notifier_mut().unsubscribe(id);
        }
        while self.events.try_recv().is_ok() {}
    }

    /// Canvas area under the viewport.
    pub fn roi(&self) -> Result<Rect, ViewTransformError> {
        self.transform.device_to_canvas(self.viewport.rect())
    }

    /// Forgets queued work and requests the visible area instead.
    pub fn repaint(&self, cache: &mut RenderCache) -> Result<(), ViewError> {
        let roi = self.roi()?;
        cache.dequeue(None);
        cache.enqueue(roi);
        log::debug!("view repaint requested {roi:?}");
        Ok(())
    }

    pub fn set_transform(
        &mut self,
        transform: ViewTransform,
        cache: &mut RenderCache,
    ) -> Result<(), ViewError> {
        self.transform = transform;
        self.repaint(cache)
    }

    pub fn set_viewport(
        &mut self,
        viewport: Viewport,
        cache: &mut RenderCache,
    ) -> Result<(), ViewError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(ViewTransformError::InvalidViewport.into());
        }
        self.viewport = viewport;
        self.repaint(cache)
    }

    /// Device rectangle for a canvas rectangle, clipped to the viewport.
    pub fn device_rect(&self, canvas: Rect) -> Result<Option<DeviceRect>, ViewTransformError> {
        let device = self.transform.canvas_to_device(canvas)?;
        Ok(self.viewport.clip(device))
    }

    /// Drains forwarded cache events: computed areas become repaint requests
    /// on `sink`, an invalidation triggers one [`ViewAdapter::repaint`].
    /// Returns the number of repaint requests issued.
    pub fn process_events(
        &mut self,
        cache: &mut RenderCache,
        sink: &mut impl RepaintSink,
    ) -> Result<usize, ViewError> {
        let mut requests = 0;
        let mut invalidated = false;
        while let Ok(event) = self.events.try_recv() {
            match event {
                CacheEvent::Computed(rect) => {
                    if let Some(device) = self.device_rect(rect)? {
                        sink.repaint_request(device);
                        requests += 1;
                    }
                }
                CacheEvent::Invalidated(_) => invalidated = true,
                CacheEvent::Failed(rect) => {
                    log::debug!("view ignoring failed region {rect:?}");
                }
            }
        }
        if invalidated {
            self.repaint(cache)?;
        }
        Ok(requests)
    }

    /// Reads the cache's content for a device area at the view scale.
    pub fn expose(&self, cache: &RenderCache, area: DeviceRect) -> Result<ExposedPixels, ViewError> {
        let roi = self.transform.device_to_canvas(area.rect())?;
        let level = cache.config().level;
        let scale = self.transform.scale() * f64::from(1u32 << level);
        let (width, height) = TiledBuffer::output_size(roi, level, scale);
        let mut pixels = vec![0u8; width * height * PixelFormat::RgbU8.bytes_per_pixel()];
        cache.buffer().get(
            roi,
            level,
            PixelFormat::RgbU8,
            scale,
            AbyssPolicy::Clear,
            &mut pixels,
        )?;
        Ok(ExposedPixels {
            device_rect: area,
            width,
            height,
            pixels,
        })
    }
}
