//! Pending render work.
//!
//! The queue keeps rectangles in FIFO order and pairwise disjoint: an incoming
//! rectangle absorbs every pending entry it overlaps into their bounding box.

use std::collections::VecDeque;

use model::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyEntry {
    pub rect: Rect,
    /// Failed compute attempts so far.
    pub attempts: u32,
}

impl DirtyEntry {
    pub const fn new(rect: Rect) -> Self {
        Self { rect, attempts: 0 }
    }
}

#[derive(Debug, Default, Clone)]
pub struct DirtyRegionQueue {
    entries: VecDeque<DirtyEntry>,
}

impl DirtyRegionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirtyEntry> + '_ {
        self.entries.iter()
    }

    pub fn rects(&self) -> Vec<Rect> {
        self.entries.iter().map(|entry| entry.rect).collect()
    }

    /// Pending pixel count. Entries are disjoint, so this is exact.
    pub fn area(&self) -> u64 {
        self.entries.iter().map(|entry| entry.rect.area()).sum()
    }

    /// Adds `rect` as pending work. Returns `false` when nothing changed
    /// because `rect` is empty or already pending.
    pub fn enqueue(&mut self, rect: Rect) -> bool {
        if rect.is_empty()
            || self
                .entries
                .iter()
                .any(|entry| entry.rect.contains_rect(&rect))
        {
            return false;
        }

        let mut merged = rect;
        let mut slot = None;
        while let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.rect.intersects(&merged))
        {
            if let Some(entry) = self.entries.remove(index) {
                merged = merged.union(&entry.rect);
                slot = Some(slot.map_or(index, |slot: usize| slot.min(index)));
            }
        }

        let entry = DirtyEntry::new(merged);
        match slot {
            Some(index) => self.entries.insert(index, entry),
            None => self.entries.push_back(entry),
        }
        true
    }

    /// Removes `rect` from every pending entry, or all pending work for `None`.
    pub fn dequeue(&mut self, rect: Option<Rect>) {
        let Some(rect) = rect else {
            self.entries.clear();
            return;
        };
        if !self.entries.iter().any(|entry| entry.rect.intersects(&rect)) {
            return;
        }
        self.entries = self
            .entries
            .drain(..)
            .flat_map(|entry| {
                entry
                    .rect
                    .subtract(&rect)
                    .into_iter()
                    .map(move |piece| DirtyEntry {
                        rect: piece,
                        attempts: entry.attempts,
                    })
            })
            .collect();
    }

    pub(crate) fn pop_front(&mut self) -> Option<DirtyEntry> {
        self.entries.pop_front()
    }

    /// Callers must keep entries disjoint: only pieces of a popped entry may
    /// be pushed back.
    pub(crate) fn push_front(&mut self, entry: DirtyEntry) {
        self.entries.push_front(entry);
    }

    pub(crate) fn push_back(&mut self, entry: DirtyEntry) {
        self.entries.push_back(entry);
    }
}
