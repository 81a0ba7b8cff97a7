use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tessel_geom::Offset3;
use tessel_world::WorldGenConfig;

// Top-level host config file (host.toml)
#[derive(Deserialize, Debug, Clone)]
pub struct HostConfig {
    #[serde(default = "default_cells_path")]
    pub cells: String,
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    // Relays rescan for partners every N ticks while complete
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval: u64,
    // Wall-clock pause per tick; 0 runs flat out
    #[serde(default)]
    pub tick_ms: u64,
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub presets: BTreeMap<String, PresetDef>,
    #[serde(default, rename = "relay")]
    pub relays: Vec<RelayDef>,
    #[serde(default, rename = "edit")]
    pub edits: Vec<EditDef>,
    #[serde(default, rename = "build")]
    pub builds: Vec<RelayAt>,
    #[serde(default, rename = "remove")]
    pub removals: Vec<RelayAt>,
}

fn default_cells_path() -> String {
    "assets/cells.toml".into()
}
fn default_ticks() -> u64 {
    60
}
fn default_rescan_interval() -> u64 {
    10
}

#[derive(Deserialize, Debug, Clone)]
pub struct WorldSection {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i32,
    // Half-width in cells of the cube around the origin kept resident
    #[serde(default = "default_load_radius")]
    pub load_radius: i32,
    #[serde(default)]
    pub worldgen: WorldGenConfig,
}

fn default_chunk_size() -> i32 {
    16
}
fn default_load_radius() -> i32 {
    32
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            load_radius: default_load_radius(),
            worldgen: WorldGenConfig::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ScanSection {
    #[serde(default = "default_scan_radius")]
    pub radius: i32,
    // 0 = one per core
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub drain_budget: Option<usize>,
}

fn default_scan_radius() -> i32 {
    12
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            radius: default_scan_radius(),
            workers: 0,
            drain_budget: None,
        }
    }
}

/// ASCII structure: `layers` bottom to top, rows along z, columns along x.
#[derive(Deserialize, Debug, Clone)]
pub struct PresetDef {
    #[serde(default = "default_origin")]
    pub origin: char,
    // symbol -> cell spec ("name", "name:state" or "*")
    pub legend: BTreeMap<char, String>,
    pub layers: Vec<Vec<String>>,
}

fn default_origin() -> char {
    '@'
}

#[derive(Deserialize, Debug, Clone)]
pub struct RelayDef {
    pub name: String,
    pub pos: [i32; 3],
    pub preset: String,
    // Cell type this relay looks for when scanning
    pub partner: String,
    // Cell placed at the relay position itself
    #[serde(default = "default_core")]
    pub core: String,
    // Place the whole structure at startup instead of only the core
    #[serde(default)]
    pub prebuilt: bool,
}

fn default_core() -> String {
    "core".into()
}

impl RelayDef {
    pub fn position(&self) -> Offset3 {
        let [x, y, z] = self.pos;
        Offset3::new(x, y, z)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct EditDef {
    pub tick: u64,
    pub pos: [i32; 3],
    pub cell: String,
}

// Scheduled action on a named relay
#[derive(Deserialize, Debug, Clone)]
pub struct RelayAt {
    pub tick: u64,
    pub relay: String,
}

impl HostConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: HostConfig = toml::from_str(text)?;
        Ok(cfg)
    }
}

pub fn load_from_path(path: &Path) -> Result<HostConfig, Box<dyn Error>> {
    let s = fs::read_to_string(path)?;
    HostConfig::from_toml_str(&s)
}
