use crate::Rect;

/// Set of pixels stored as pairwise-disjoint rectangles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rect> + '_ {
        self.rects.iter()
    }

    pub fn area(&self) -> u64 {
        self.rects.iter().map(Rect::area).sum()
    }

    pub fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::EMPTY, |bounds, rect| bounds.union(rect))
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn add(&mut self, rect: Rect) {
        for piece in self.uncovered_parts(rect) {
            self.rects.push(piece);
        }
    }

    pub fn subtract(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut remaining = Vec::with_capacity(self.rects.len());
        for existing in self.rects.drain(..) {
            remaining.extend(existing.subtract(&rect));
        }
        self.rects = remaining;
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|existing| existing.intersects(rect))
    }

    pub fn contains_rect(&self, rect: &Rect) -> bool {
        self.uncovered_parts(*rect).is_empty()
    }

    /// Parts of `rect` not covered by this region, as disjoint pieces.
    pub fn uncovered_parts(&self, rect: Rect) -> Vec<Rect> {
        if rect.is_empty() {
            return Vec::new();
        }
        let mut pieces = vec![rect];
        for existing in &self.rects {
            if pieces.is_empty() {
                break;
            }
            let mut next = Vec::with_capacity(pieces.len());
            for piece in pieces {
                next.extend(piece.subtract(existing));
            }
            pieces = next;
        }
        pieces
    }
}
