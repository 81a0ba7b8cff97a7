use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tessel_cells::Cell;
use tessel_geom::{Offset3, Rotation};
use tessel_world::{CellSink, TileData, WorldError};

/// Everything a tile hook sees when its offset is realized.
pub struct TileContext<'a> {
    /// Offset relative to the pattern origin.
    pub offset: Offset3,
    /// Absolute world position.
    pub pos: Offset3,
    /// Cell written at `pos`, `None` for the no-check marker.
    pub cell: Option<Cell>,
    sink: &'a mut dyn CellSink,
}

impl<'a> TileContext<'a> {
    pub(crate) fn new(
        offset: Offset3,
        pos: Offset3,
        cell: Option<Cell>,
        sink: &'a mut dyn CellSink,
    ) -> Self {
        Self {
            offset,
            pos,
            cell,
            sink,
        }
    }

    pub fn attach(&mut self, data: TileData) -> Result<(), WorldError> {
        self.sink.attach_tile(self.pos, data)
    }
}

pub type TileHook = Arc<dyn Fn(&mut TileContext<'_>) -> Result<(), WorldError> + Send + Sync>;

/// Per-offset hooks fired once each when a pattern is placed.
#[derive(Clone, Default)]
pub struct TileCallbacks {
    hooks: HashMap<Offset3, TileHook>,
}

impl TileCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: Offset3, hook: TileHook) -> Option<TileHook> {
        self.hooks.insert(offset, hook)
    }

    pub fn get(&self, offset: Offset3) -> Option<&TileHook> {
        self.hooks.get(&offset)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Offsets carrying a hook, sorted so firing order is reproducible.
    pub fn offsets(&self) -> Vec<Offset3> {
        let mut v: Vec<Offset3> = self.hooks.keys().copied().collect();
        v.sort();
        v
    }

    pub(crate) fn rotated(&self, rot: Rotation) -> Self {
        Self {
            hooks: self
                .hooks
                .iter()
                .map(|(o, h)| (rot.apply(*o), Arc::clone(h)))
                .collect(),
        }
    }
}

impl fmt::Debug for TileCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileCallbacks")
            .field("offsets", &self.offsets())
            .finish()
    }
}
