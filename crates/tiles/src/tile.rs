use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use model::{PixelFormat, TileCoord};
use thiserror::Error;

/// Identity of a logical lock holder. Tile locks are re-entrant for the same
/// owner and refuse every other owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileLockOwner(u64);

static NEXT_LOCK_OWNER: AtomicU64 = AtomicU64::new(1);

impl TileLockOwner {
    pub fn next() -> Self {
        Self(NEXT_LOCK_OWNER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TileLockMisuse {
    #[error("unlock called on a tile that is not locked")]
    NotLocked,
    #[error("tile is locked by {holder:?}, not by {caller:?}")]
    NotOwner {
        holder: Option<TileLockOwner>,
        caller: TileLockOwner,
    },
    #[error("tile is already locked by {holder:?}; {caller:?} cannot take it")]
    HeldByOtherOwner {
        holder: TileLockOwner,
        caller: TileLockOwner,
    },
    #[error("an unlock notification is already pending on this tile")]
    NotifyAlreadyPending,
}

pub type UnlockNotify = Box<dyn FnOnce(&Tile) + Send>;

struct TileState {
    lock_depth: u32,
    owner: Option<TileLockOwner>,
    holder_thread: Option<ThreadId>,
    dirty: bool,
    unlock_notify: Option<UnlockNotify>,
    data: Box<[u8]>,
}

/// Square block of pixels in one format, the unit of storage of a
/// [`crate::TiledBuffer`].
pub struct Tile {
    coord: TileCoord,
    format: PixelFormat,
    edge: u32,
    state: Mutex<TileState>,
    unlocked: Condvar,
}

impl fmt::Debug for Tile {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Tile")
            .field("coord", &self.coord)
            .field("format", &self.format)
            .field("edge", &self.edge)
            .field("lock_depth", &self.lock_depth())
            .finish()
    }
}

impl Tile {
    pub fn new(coord: TileCoord, format: PixelFormat, edge: u32) -> Self {
        let byte_len = edge as usize * edge as usize * format.bytes_per_pixel();
        Self {
            coord,
            format,
            edge,
            state: Mutex::new(TileState {
                lock_depth: 0,
                owner: None,
                holder_thread: None,
                dirty: false,
                unlock_notify: None,
                data: vec![0u8; byte_len].into_boxed_slice(),
            }),
            unlocked: Condvar::new(),
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn edge(&self) -> u32 {
        self.edge
    }

    pub fn byte_len(&self) -> usize {
        self.edge as usize * self.edge as usize * self.format.bytes_per_pixel()
    }

    pub fn lock_depth(&self) -> u32 {
        self.state().lock_depth
    }

    pub fn is_locked(&self) -> bool {
        self.lock_depth() > 0
    }

    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    pub fn clear_dirty(&self) {
        self.state().dirty = false;
    }

    pub fn lock(&self, owner: TileLockOwner) -> Result<(), TileLockMisuse> {
        let mut state = self.state();
        match state.owner {
            Some(holder) if state.lock_depth > 0 && holder != owner => {
                let misuse = TileLockMisuse::HeldByOtherOwner {
                    holder,
                    caller: owner,
                };
                log::error!("tile {:?}: {misuse}", self.coord);
                Err(misuse)
            }
            _ => {
                if state.lock_depth == 0 {
                    state.holder_thread = Some(thread::current().id());
                }
                state.owner = Some(owner);
                state.lock_depth += 1;
                Ok(())
            }
        }
    }

    pub fn unlock(&self, owner: TileLockOwner) -> Result<(), TileLockMisuse> {
        let mut state = self.state();
        if state.lock_depth == 0 {
            let misuse = TileLockMisuse::NotLocked;
            log::error!("tile {:?}: {misuse}", self.coord);
            return Err(misuse);
        }
        if state.owner != Some(owner) {
            let misuse = TileLockMisuse::NotOwner {
                holder: state.owner,
                caller: owner,
            };
            log::error!("tile {:?}: {misuse}", self.coord);
            return Err(misuse);
        }
        state.lock_depth -= 1;
        if state.lock_depth > 0 {
            return Ok(());
        }
        state.owner = None;
        state.holder_thread = None;
        let notify = state.unlock_notify.take();
        drop(state);
        self.unlocked.notify_all();
        if let Some(notify) = notify {
            notify(self);
        }
        Ok(())
    }

    /// Registers a one-shot callback for the next transition to unlocked.
    /// Fires immediately when the tile is not locked. A second registration
    /// while one is pending is rejected and the first stays in place.
    pub fn set_unlock_notify(
        &self,
        notify: impl FnOnce(&Tile) + Send + 'static,
    ) -> Result<(), TileLockMisuse> {
        let mut state = self.state();
        if state.unlock_notify.is_some() {
            let misuse = TileLockMisuse::NotifyAlreadyPending;
            log::error!("tile {:?}: {misuse}", self.coord);
            return Err(misuse);
        }
        if state.lock_depth == 0 {
            drop(state);
            notify(self);
            return Ok(());
        }
        state.unlock_notify = Some(Box::new(notify));
        Ok(())
    }

    pub fn has_pending_notify(&self) -> bool {
        self.state().unlock_notify.is_some()
    }

    /// Reads the pixel data while holding the tile lock as `owner`.
    pub fn with_data<R>(
        &self,
        owner: TileLockOwner,
        read: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, TileLockMisuse> {
        let state = self.state();
        Self::check_holder(&state, owner)?;
        Ok(read(&state.data))
    }

    /// Mutates the pixel data while holding the tile lock as `owner`.
    pub fn with_data_mut<R>(
        &self,
        owner: TileLockOwner,
        write: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, TileLockMisuse> {
        let mut state = self.state();
        Self::check_holder(&state, owner)?;
        state.dirty = true;
        Ok(write(&mut state.data))
    }

    /// Transient read for buffer internals: waits out a logical lock held from
    /// another thread. The holder's own thread reads through its lock.
    pub(crate) fn read_transient<R>(&self, read: impl FnOnce(&[u8]) -> R) -> R {
        let state = self.wait_unlocked();
        read(&state.data)
    }

    /// Transient write for buffer internals. Outside a logical lock it counts
    /// as a lock/unlock pair, so a pending unlock notification fires
    /// afterwards; inside the holder's lock the notification stays pending.
    pub(crate) fn write_transient<R>(&self, write: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut state = self.wait_unlocked();
        state.dirty = true;
        let result = write(&mut state.data);
        let notify = if state.lock_depth == 0 {
            state.unlock_notify.take()
        } else {
            None
        };
        drop(state);
        if let Some(notify) = notify {
            notify(self);
        }
        result
    }

    fn check_holder(state: &TileState, owner: TileLockOwner) -> Result<(), TileLockMisuse> {
        if state.lock_depth == 0 || state.owner != Some(owner) {
            return Err(TileLockMisuse::NotOwner {
                holder: state.owner,
                caller: owner,
            });
        }
        Ok(())
    }

    fn wait_unlocked(&self) -> MutexGuard<'_, TileState> {
        let mut state = self.state();
        let current = thread::current().id();
        while state.lock_depth > 0 && state.holder_thread != Some(current) {
            state = self
                .unlocked
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state
    }

    fn state(&self) -> MutexGuard<'_, TileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
