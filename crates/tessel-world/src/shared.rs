use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tessel_geom::Offset3;

use crate::chunk::ChunkedWorld;
use crate::source::{CellRead, CellSource, WorldError};

/// Thread-shareable handle to a [`ChunkedWorld`].
///
/// The simulation thread owns the handle and is the only writer. Scan
/// workers get a [`WorldReader`], which can read but never mutate. Every
/// read takes the lock for a single cell so the writer is never starved by
/// a long scan.
#[derive(Clone)]
pub struct SharedWorld {
    inner: Arc<RwLock<ChunkedWorld>>,
    closed: Arc<AtomicBool>,
}

impl SharedWorld {
    pub fn new(world: ChunkedWorld) -> Self {
        Self {
            inner: Arc::new(RwLock::new(world)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn reader(&self) -> WorldReader {
        WorldReader {
            inner: Arc::clone(&self.inner),
            closed: Arc::clone(&self.closed),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, ChunkedWorld>, WorldError> {
        if self.is_closed() {
            return Err(WorldError::Closed);
        }
        self.inner.read().map_err(|_| WorldError::Poisoned)
    }

    /// Exclusive access for main-thread mutation.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, ChunkedWorld>, WorldError> {
        if self.is_closed() {
            return Err(WorldError::Closed);
        }
        self.inner.write().map_err(|_| WorldError::Poisoned)
    }

    /// Tear the world down. Readers observe [`CellRead::Closed`] from now on.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            log::debug!(target: "world", "world closed");
        }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl CellSource for SharedWorld {
    fn cell_at(&self, pos: Offset3) -> CellRead {
        read_cell(&self.inner, &self.closed, pos)
    }
}

/// Read-only accessor handed to scan workers.
#[derive(Clone)]
pub struct WorldReader {
    inner: Arc<RwLock<ChunkedWorld>>,
    closed: Arc<AtomicBool>,
}

impl WorldReader {
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl CellSource for WorldReader {
    fn cell_at(&self, pos: Offset3) -> CellRead {
        read_cell(&self.inner, &self.closed, pos)
    }
}

fn read_cell(inner: &RwLock<ChunkedWorld>, closed: &AtomicBool, pos: Offset3) -> CellRead {
    if closed.load(Ordering::Acquire) {
        return CellRead::Closed;
    }
    match inner.read() {
        Ok(world) => world.get(pos),
        // A writer panicked mid-mutation; nothing it left behind is trustworthy.
        Err(_) => CellRead::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKey;
    use tessel_cells::Cell;

    #[test]
    fn reader_sees_main_thread_writes() {
        let shared = SharedWorld::new(ChunkedWorld::new(8));
        let reader = shared.reader();
        {
            let mut w = shared.write().unwrap();
            w.load_chunk(ChunkKey::new(0, 0, 0));
            w.set(Offset3::new(1, 1, 1), Cell::new(4, 0)).unwrap();
        }
        assert_eq!(
            reader.cell_at(Offset3::new(1, 1, 1)),
            CellRead::Loaded(Cell::new(4, 0))
        );
        assert!(reader.is_loaded(Offset3::ZERO));
        assert!(!reader.is_loaded(Offset3::new(-1, 0, 0)));
    }

    #[test]
    fn close_turns_reads_into_closed() {
        let shared = SharedWorld::new(ChunkedWorld::new(8));
        shared.write().unwrap().load_chunk(ChunkKey::new(0, 0, 0));
        let reader = shared.reader();
        shared.close();
        assert!(reader.is_closed());
        assert_eq!(reader.cell_at(Offset3::ZERO), CellRead::Closed);
        assert!(matches!(shared.write(), Err(WorldError::Closed)));
    }

    #[test]
    fn reader_is_usable_from_other_threads() {
        let shared = SharedWorld::new(ChunkedWorld::new(8));
        shared.write().unwrap().load_chunk(ChunkKey::new(0, 0, 0));
        let reader = shared.reader();
        let handle = std::thread::spawn(move || reader.cell_at(Offset3::new(2, 2, 2)));
        assert_eq!(handle.join().unwrap(), CellRead::Loaded(Cell::EMPTY));
    }
}
