use model::Rect;

/// Selects which [`CacheEvent`]s a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    Computed,
    Invalidated,
    Failed,
}

/// Notification emitted by a render cache. Rects are in level-0 units of the
/// cached node's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Computed(Rect),
    Invalidated(Rect),
    Failed(Rect),
}

impl CacheEvent {
    pub const fn kind(&self) -> CacheEventKind {
        match self {
            CacheEvent::Computed(_) => CacheEventKind::Computed,
            CacheEvent::Invalidated(_) => CacheEventKind::Invalidated,
            CacheEvent::Failed(_) => CacheEventKind::Failed,
        }
    }

    pub const fn rect(&self) -> Rect {
        match self {
            CacheEvent::Computed(rect) | CacheEvent::Invalidated(rect) | CacheEvent::Failed(rect) => {
                *rect
            }
        }
    }
}

/// Result of one bounded unit of render work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    MoreWork,
}

impl StepOutcome {
    pub const fn has_more_work(self) -> bool {
        matches!(self, StepOutcome::MoreWork)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub origin_x: u32,
    pub origin_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn rect(&self) -> Rect {
        Rect::new(
            saturating_i32(self.origin_x),
            saturating_i32(self.origin_y),
            saturating_i32(self.width),
            saturating_i32(self.height),
        )
    }

    /// Clips a device-space rectangle to the viewport; `None` when nothing of
    /// it is visible.
    pub fn clip(&self, rect: Rect) -> Option<DeviceRect> {
        let visible = rect.intersect(&self.rect());
        (!visible.is_empty()).then_some(DeviceRect(visible))
    }
}

fn saturating_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Rectangle in device pixels, already clipped to a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRect(pub Rect);

impl DeviceRect {
    pub const fn rect(self) -> Rect {
        self.0
    }
}

/// Receiver of repaint requests, implemented by whatever presents pixels.
pub trait RepaintSink {
    fn repaint_request(&mut self, rect: DeviceRect);
}

impl RepaintSink for Vec<DeviceRect> {
    fn repaint_request(&mut self, rect: DeviceRect) {
        self.push(rect);
    }
}
