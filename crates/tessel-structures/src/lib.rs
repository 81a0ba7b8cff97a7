//! Sparse cell patterns, tile hooks, and structure matching.
#![forbid(unsafe_code)]

pub mod pattern;
pub mod structure;
pub mod tiles;

pub use pattern::{Pattern, PatternBuilder, PatternError};
pub use structure::{CENTER_OFFSET, Progress, StructurePattern};
pub use tiles::{TileCallbacks, TileContext, TileHook};
