use smallvec::SmallVec;

/// Integer axis-aligned rectangle. `right()`/`bottom()` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

pub type RectPieces = SmallVec<[Rect; 4]>;

impl Rect {
    pub const EMPTY: Self = Self {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width: if width < 0 { 0 } else { width },
            height: if height < 0 { 0 } else { height },
        }
    }

    pub fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub const fn area(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.width as u64 * self.height as u64
    }

    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// An empty rectangle is contained in every rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        if other.is_empty() {
            return true;
        }
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Rect::EMPTY;
        }
        Rect::from_edges(left, top, right, bottom)
    }

    /// Bounding box of both rectangles; empty operands do not contribute.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Area of `self` not covered by `other`, as disjoint pieces.
    pub fn subtract(&self, other: &Rect) -> RectPieces {
        let mut pieces = RectPieces::new();
        if self.is_empty() {
            return pieces;
        }
        let overlap = self.intersect(other);
        if overlap.is_empty() {
            pieces.push(*self);
            return pieces;
        }

        let top = Rect::from_edges(self.x, self.y, self.right(), overlap.y);
        let bottom = Rect::from_edges(self.x, overlap.bottom(), self.right(), self.bottom());
        let left = Rect::from_edges(self.x, overlap.y, overlap.x, overlap.bottom());
        let right = Rect::from_edges(overlap.right(), overlap.y, self.right(), overlap.bottom());
        for piece in [top, left, right, bottom] {
            if !piece.is_empty() {
                pieces.push(piece);
            }
        }
        pieces
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Grows the rectangle by the given margins on each side.
    pub fn expand(&self, left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect::from_edges(
            self.x.saturating_sub(left),
            self.y.saturating_sub(top),
            self.right().saturating_add(right),
            self.bottom().saturating_add(bottom),
        )
    }

    /// Covering rectangle in the pixel space of `level`, where level `n`
    /// addresses the image at `1 / 2^n` of its level-0 size.
    pub fn to_level(&self, level: u8) -> Rect {
        if level == 0 || self.is_empty() {
            return *self;
        }
        Rect::from_edges(
            floor_div_pow2(self.x, level),
            floor_div_pow2(self.y, level),
            ceil_div_pow2(self.right(), level),
            ceil_div_pow2(self.bottom(), level),
        )
    }

    /// Expresses a rectangle given in `level` pixels in level-0 units.
    pub fn from_level(&self, level: u8) -> Rect {
        if level == 0 {
            return *self;
        }
        let factor = 1i32 << level.min(30);
        Rect::new(
            self.x.saturating_mul(factor),
            self.y.saturating_mul(factor),
            self.width.saturating_mul(factor),
            self.height.saturating_mul(factor),
        )
    }
}

pub fn floor_div_pow2(value: i32, level: u8) -> i32 {
    value >> level.min(31)
}

pub fn ceil_div_pow2(value: i32, level: u8) -> i32 {
    let shift = level.min(31);
    let factor = 1i64 << shift;
    (value as i64 + factor - 1).div_euclid(factor) as i32
}
