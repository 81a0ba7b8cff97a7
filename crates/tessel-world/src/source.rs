use std::collections::BTreeMap;

use tessel_cells::Cell;
use tessel_geom::Offset3;

/// Outcome of reading one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellRead {
    Loaded(Cell),
    /// Region not resident. Never an error for readers; folds into "no match".
    NotLoaded,
    /// The world was torn down; long-running readers must give up.
    Closed,
}

impl CellRead {
    #[inline]
    pub fn cell(self) -> Option<Cell> {
        match self {
            CellRead::Loaded(c) => Some(c),
            CellRead::NotLoaded | CellRead::Closed => None,
        }
    }
}

/// Read access to world cells. Implementations must tolerate concurrent
/// readers on worker threads.
pub trait CellSource: Send + Sync {
    fn cell_at(&self, pos: Offset3) -> CellRead;

    fn is_loaded(&self, pos: Offset3) -> bool {
        matches!(self.cell_at(pos), CellRead::Loaded(_))
    }
}

impl<S: CellSource + ?Sized> CellSource for &S {
    #[inline]
    fn cell_at(&self, pos: Offset3) -> CellRead {
        (**self).cell_at(pos)
    }

    #[inline]
    fn is_loaded(&self, pos: Offset3) -> bool {
        (**self).is_loaded(pos)
    }
}

/// Write access, used only from the simulation thread.
pub trait CellSink {
    fn set_cell(&mut self, pos: Offset3, cell: Cell) -> Result<(), WorldError>;
    fn attach_tile(&mut self, pos: Offset3, data: TileData) -> Result<(), WorldError>;
}

/// Extra per-cell state attached next to a cell (counters, links, owners).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileData {
    pub tag: String,
    pub fields: BTreeMap<String, i64>,
}

impl TileData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: i64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.fields.get(key).copied()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("cell at {0:?} is not loaded")]
    NotLoaded(Offset3),
    #[error("world has been closed")]
    Closed,
    #[error("world lock poisoned")]
    Poisoned,
    #[error("unknown cell `{0}`")]
    UnknownCell(String),
}
