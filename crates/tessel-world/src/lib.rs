//! World access contract, chunked cell storage, and seeded generation.
#![forbid(unsafe_code)]

pub mod chunk;
pub mod shared;
pub mod source;
pub mod worldgen;

pub use chunk::{CHUNK_SIZE, ChunkKey, ChunkedWorld};
pub use shared::{SharedWorld, WorldReader};
pub use source::{CellRead, CellSink, CellSource, TileData, WorldError};
pub use worldgen::{WorldGen, WorldGenConfig};
