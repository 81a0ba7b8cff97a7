use fastnoise_lite::{FastNoiseLite, NoiseType};
use serde::Deserialize;
use tessel_cells::{Cell, CellRegistry};
use tessel_geom::{Bounds3, Offset3};

use crate::chunk::{ChunkKey, ChunkedWorld};
use crate::source::WorldError;

#[derive(Clone, Debug, Deserialize)]
pub struct WorldGenConfig {
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default)]
    pub floor: Floor,
    #[serde(default)]
    pub veins: Vec<VeinRule>,
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            floor: Floor::default(),
            veins: Vec::new(),
        }
    }
}

fn default_seed() -> i32 {
    1337
}

#[derive(Clone, Debug, Deserialize)]
pub struct Floor {
    #[serde(default = "default_floor_cell")]
    pub cell: String,
    #[serde(default = "default_floor_y")]
    pub y: i32,
    #[serde(default = "default_floor_thickness")]
    pub thickness: i32,
}
fn default_floor_cell() -> String {
    "stone".into()
}
fn default_floor_y() -> i32 {
    -1
}
fn default_floor_thickness() -> i32 {
    1
}
impl Default for Floor {
    fn default() -> Self {
        Self {
            cell: default_floor_cell(),
            y: default_floor_y(),
            thickness: default_floor_thickness(),
        }
    }
}

/// Scatter `cell` wherever 3-D noise exceeds `threshold` inside `[y_min, y_max]`.
#[derive(Clone, Debug, Deserialize)]
pub struct VeinRule {
    pub cell: String,
    #[serde(default = "default_vein_freq")]
    pub frequency: f32,
    #[serde(default = "default_vein_thr")]
    pub threshold: f32,
    #[serde(default = "default_vein_y_min")]
    pub y_min: i32,
    #[serde(default = "default_vein_y_max")]
    pub y_max: i32,
}
fn default_vein_freq() -> f32 {
    0.09
}
fn default_vein_thr() -> f32 {
    0.72
}
fn default_vein_y_min() -> i32 {
    0
}
fn default_vein_y_max() -> i32 {
    8
}

struct Vein {
    cell: Cell,
    noise: FastNoiseLite,
    threshold: f32,
    y_min: i32,
    y_max: i32,
}

/// Deterministic chunk filler: a floor slab plus noise-scattered veins.
pub struct WorldGen {
    floor: Cell,
    floor_y: i32,
    floor_thickness: i32,
    veins: Vec<Vein>,
}

impl WorldGen {
    pub fn new(cfg: &WorldGenConfig, reg: &CellRegistry) -> Result<Self, WorldError> {
        let floor = reg
            .cell(&cfg.floor.cell)
            .ok_or_else(|| WorldError::UnknownCell(cfg.floor.cell.clone()))?;
        let mut veins = Vec::with_capacity(cfg.veins.len());
        for (i, rule) in cfg.veins.iter().enumerate() {
            let cell = reg
                .cell(&rule.cell)
                .ok_or_else(|| WorldError::UnknownCell(rule.cell.clone()))?;
            let mut noise = FastNoiseLite::with_seed(cfg.seed ^ (0x5EED_0000 + i as i32));
            noise.set_noise_type(Some(NoiseType::OpenSimplex2));
            noise.set_frequency(Some(rule.frequency));
            veins.push(Vein {
                cell,
                noise,
                threshold: rule.threshold,
                y_min: rule.y_min,
                y_max: rule.y_max,
            });
        }
        Ok(Self {
            floor,
            floor_y: cfg.floor.y,
            floor_thickness: cfg.floor.thickness.max(0),
            veins,
        })
    }

    /// Cell generated at `pos`, before any edits.
    pub fn cell_for(&self, pos: Offset3) -> Cell {
        if pos.y <= self.floor_y && pos.y > self.floor_y - self.floor_thickness {
            return self.floor;
        }
        for v in &self.veins {
            if pos.y < v.y_min || pos.y > v.y_max {
                continue;
            }
            let n = v
                .noise
                .get_noise_3d(pos.x as f32, pos.y as f32, pos.z as f32);
            if n > v.threshold {
                return v.cell;
            }
        }
        Cell::EMPTY
    }

    /// Load and fill `key`. Already-resident chunks are left untouched.
    pub fn populate_chunk(&self, world: &mut ChunkedWorld, key: ChunkKey) -> bool {
        if !world.load_chunk(key) {
            return false;
        }
        let size = world.chunk_size();
        let base = key.origin(size);
        for ly in 0..size {
            for lz in 0..size {
                for lx in 0..size {
                    let pos = base + Offset3::new(lx, ly, lz);
                    let cell = self.cell_for(pos);
                    if !cell.is_empty() {
                        // Chunk was loaded just above.
                        let _ = world.set(pos, cell);
                    }
                }
            }
        }
        true
    }

    /// Populate every chunk overlapping `bounds`; returns how many were new.
    pub fn populate_region(&self, world: &mut ChunkedWorld, bounds: Bounds3) -> usize {
        let keys = world.chunks_overlapping(bounds);
        let n = keys
            .into_iter()
            .filter(|k| self.populate_chunk(world, *k))
            .count();
        log::debug!(target: "world", "generated {} chunk(s) over {:?}", n, bounds);
        n
    }
}
