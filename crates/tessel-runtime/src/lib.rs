//! Region scanning and the async scan scheduler.
#![forbid(unsafe_code)]

pub mod discover;
pub mod predicate;
pub mod scheduler;
pub mod targets;

pub use discover::{
    BlockDiscoverer, CancelFlag, MAX_SCAN_RADIUS, Nearest, ScanError, nearest, scan,
};
pub use predicate::{AnyOf, ByCell, CellPredicate, IsCell, IsType, Matches, by_cell};
pub use scheduler::{
    DrainStats, ScanOutcome, ScanReport, ScanRequest, ScanScheduler, ScanTicket, SchedulerConfig,
};
pub use targets::{ScanTarget, ScanTargets, TargetArena, TargetId};
