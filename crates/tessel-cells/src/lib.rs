//! Cell types, pattern descriptors, and the cell registry.
#![forbid(unsafe_code)]

pub mod config;
pub mod registry;
pub mod types;

pub use registry::{CellRegistry, CellType, RegistryError};
pub use types::{Cell, CellDescriptor, CellId, CellState};
