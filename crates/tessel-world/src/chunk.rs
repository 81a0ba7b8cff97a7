use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tessel_cells::Cell;
use tessel_geom::{Bounds3, Offset3};

use crate::source::{CellRead, CellSink, CellSource, TileData, WorldError};

pub const CHUNK_SIZE: i32 = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub cx: i32,
    pub cy: i32,
    pub cz: i32,
}

impl ChunkKey {
    #[inline]
    pub const fn new(cx: i32, cy: i32, cz: i32) -> Self {
        Self { cx, cy, cz }
    }

    /// World position of this chunk's minimum corner.
    #[inline]
    pub fn origin(self, size: i32) -> Offset3 {
        Offset3::new(self.cx * size, self.cy * size, self.cz * size)
    }
}

struct Chunk {
    cells: Vec<Cell>,
}

impl Chunk {
    fn empty(size: i32) -> Self {
        let n = (size * size * size) as usize;
        Self {
            cells: vec![Cell::EMPTY; n],
        }
    }

    #[inline]
    fn idx(size: i32, lx: i32, ly: i32, lz: i32) -> usize {
        ((ly * size + lz) * size + lx) as usize
    }
}

/// Sparse, chunk-granular cell store. Chunks must be loaded explicitly;
/// reads outside loaded chunks report [`CellRead::NotLoaded`].
pub struct ChunkedWorld {
    size: i32,
    chunks: HashMap<ChunkKey, Chunk>,
    tiles: HashMap<Offset3, TileData>,
    rev: u64,
}

impl Default for ChunkedWorld {
    fn default() -> Self {
        Self::new(CHUNK_SIZE)
    }
}

impl ChunkedWorld {
    pub fn new(chunk_size: i32) -> Self {
        debug_assert!(chunk_size > 0);
        Self {
            size: chunk_size.max(1),
            chunks: HashMap::new(),
            tiles: HashMap::new(),
            rev: 0,
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> i32 {
        self.size
    }

    #[inline]
    pub fn chunk_key(&self, pos: Offset3) -> ChunkKey {
        ChunkKey::new(
            pos.x.div_euclid(self.size),
            pos.y.div_euclid(self.size),
            pos.z.div_euclid(self.size),
        )
    }

    #[inline]
    fn local(&self, pos: Offset3) -> (i32, i32, i32) {
        (
            pos.x.rem_euclid(self.size),
            pos.y.rem_euclid(self.size),
            pos.z.rem_euclid(self.size),
        )
    }

    /// Monotonic counter bumped by every mutation.
    #[inline]
    pub fn rev(&self) -> u64 {
        self.rev
    }

    fn bump_rev(&mut self) {
        self.rev = self.rev.wrapping_add(1).max(1);
    }

    /// Make `key` resident, filled with empty cells. Returns false when it
    /// was already loaded.
    pub fn load_chunk(&mut self, key: ChunkKey) -> bool {
        if self.chunks.contains_key(&key) {
            return false;
        }
        self.chunks.insert(key, Chunk::empty(self.size));
        self.bump_rev();
        true
    }

    /// Drop a chunk together with any tile data inside it.
    pub fn unload_chunk(&mut self, key: ChunkKey) -> bool {
        if self.chunks.remove(&key).is_none() {
            return false;
        }
        let size = self.size;
        self.tiles.retain(|p, _| {
            ChunkKey::new(
                p.x.div_euclid(size),
                p.y.div_euclid(size),
                p.z.div_euclid(size),
            ) != key
        });
        self.bump_rev();
        true
    }

    #[inline]
    pub fn is_chunk_loaded(&self, key: ChunkKey) -> bool {
        self.chunks.contains_key(&key)
    }

    pub fn loaded_chunks(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.chunks.keys().copied()
    }

    /// Keys of every chunk overlapping `bounds`.
    pub fn chunks_overlapping(&self, bounds: Bounds3) -> Vec<ChunkKey> {
        let lo = self.chunk_key(bounds.min);
        let hi = self.chunk_key(bounds.max);
        let mut out = Vec::new();
        for cy in lo.cy..=hi.cy {
            for cz in lo.cz..=hi.cz {
                for cx in lo.cx..=hi.cx {
                    out.push(ChunkKey::new(cx, cy, cz));
                }
            }
        }
        out
    }

    /// Load every chunk overlapping `bounds`; returns how many were new.
    pub fn load_region(&mut self, bounds: Bounds3) -> usize {
        self.chunks_overlapping(bounds)
            .into_iter()
            .filter(|k| self.load_chunk(*k))
            .count()
    }

    pub fn get(&self, pos: Offset3) -> CellRead {
        let key = self.chunk_key(pos);
        match self.chunks.get(&key) {
            Some(chunk) => {
                let (lx, ly, lz) = self.local(pos);
                CellRead::Loaded(chunk.cells[Chunk::idx(self.size, lx, ly, lz)])
            }
            None => CellRead::NotLoaded,
        }
    }

    pub fn set(&mut self, pos: Offset3, cell: Cell) -> Result<(), WorldError> {
        let key = self.chunk_key(pos);
        let (lx, ly, lz) = self.local(pos);
        let size = self.size;
        let chunk = self
            .chunks
            .get_mut(&key)
            .ok_or(WorldError::NotLoaded(pos))?;
        chunk.cells[Chunk::idx(size, lx, ly, lz)] = cell;
        self.bump_rev();
        Ok(())
    }

    pub fn tile(&self, pos: Offset3) -> Option<&TileData> {
        self.tiles.get(&pos)
    }

    pub fn remove_tile(&mut self, pos: Offset3) -> Option<TileData> {
        self.tiles.remove(&pos)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Every non-empty cell inside a loaded chunk, in no particular order.
    pub fn non_empty_cells(&self) -> Vec<(Offset3, Cell)> {
        let mut out = Vec::new();
        for (key, chunk) in &self.chunks {
            let base = key.origin(self.size);
            for ly in 0..self.size {
                for lz in 0..self.size {
                    for lx in 0..self.size {
                        let c = chunk.cells[Chunk::idx(self.size, lx, ly, lz)];
                        if !c.is_empty() {
                            out.push((base + Offset3::new(lx, ly, lz), c));
                        }
                    }
                }
            }
        }
        out
    }
}

impl CellSource for ChunkedWorld {
    #[inline]
    fn cell_at(&self, pos: Offset3) -> CellRead {
        self.get(pos)
    }

    #[inline]
    fn is_loaded(&self, pos: Offset3) -> bool {
        self.is_chunk_loaded(self.chunk_key(pos))
    }
}

impl CellSink for ChunkedWorld {
    fn set_cell(&mut self, pos: Offset3, cell: Cell) -> Result<(), WorldError> {
        self.set(pos, cell)
    }

    fn attach_tile(&mut self, pos: Offset3, data: TileData) -> Result<(), WorldError> {
        if !self.is_loaded(pos) {
            return Err(WorldError::NotLoaded(pos));
        }
        self.tiles.insert(pos, data);
        self.bump_rev();
        Ok(())
    }
}
