use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tessel_cells::CellDescriptor;
use tessel_geom::{Bounds3, Offset3};
use tessel_structures::Pattern;
use tessel_world::{CellRead, CellSource};

use crate::predicate::CellPredicate;

/// Largest radius a single scan may cover; `(2r+1)^3` reads per scan.
pub const MAX_SCAN_RADIUS: i32 = 64;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("scan radius {0} outside 0..={MAX_SCAN_RADIUS}")]
    RadiusOutOfRange(i32),
    #[error("world closed during scan")]
    WorldClosed,
    #[error("scan cancelled")]
    Cancelled,
    #[error("scan worker pool unavailable: {0}")]
    Pool(String),
    #[error("scan predicate panicked")]
    Panicked,
}

/// Shared cancellation flag polled by scanners between layers.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Bounded region scanner.
///
/// Walks the axis-aligned cube `[-radius, radius]^3` around an origin and
/// collects every offset whose cell satisfies a predicate into a fresh
/// [`Pattern`] of exact descriptors. Unloaded cells are simply not
/// candidates. If the world is torn down or the scan is cancelled the
/// partial result is discarded and an error is returned instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDiscoverer {
    radius: i32,
}

impl BlockDiscoverer {
    pub fn new(radius: i32) -> Result<Self, ScanError> {
        if !(0..=MAX_SCAN_RADIUS).contains(&radius) {
            return Err(ScanError::RadiusOutOfRange(radius));
        }
        Ok(Self { radius })
    }

    #[inline]
    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Absolute region covered for `origin`.
    #[inline]
    pub fn region(&self, origin: Offset3) -> Bounds3 {
        Bounds3::cube(origin, self.radius)
    }

    /// Number of world reads one scan performs.
    #[inline]
    pub fn volume(&self) -> usize {
        let side = (2 * self.radius + 1) as usize;
        side * side * side
    }

    pub fn scan<W, P>(&self, world: &W, origin: Offset3, predicate: &P) -> Result<Pattern, ScanError>
    where
        W: CellSource + ?Sized,
        P: CellPredicate + ?Sized,
    {
        self.scan_with_cancel(world, origin, predicate, &CancelFlag::new())
    }

    pub fn scan_with_cancel<W, P>(
        &self,
        world: &W,
        origin: Offset3,
        predicate: &P,
        cancel: &CancelFlag,
    ) -> Result<Pattern, ScanError>
    where
        W: CellSource + ?Sized,
        P: CellPredicate + ?Sized,
    {
        let r = self.radius;
        let mut found = Pattern::new();
        for dy in -r..=r {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            for dz in -r..=r {
                for dx in -r..=r {
                    let offset = Offset3::new(dx, dy, dz);
                    // Cells past the edge of the integer lattice are never loaded.
                    let Some(pos) = origin.checked_add(offset) else {
                        continue;
                    };
                    match world.cell_at(pos) {
                        CellRead::Loaded(cell) => {
                            if predicate.test(cell, pos) {
                                found.add_cell(offset, CellDescriptor::exact(cell));
                            }
                        }
                        CellRead::NotLoaded => {}
                        CellRead::Closed => return Err(ScanError::WorldClosed),
                    }
                }
            }
        }
        Ok(found)
    }
}

/// One-shot form of [`BlockDiscoverer::scan`].
pub fn scan<W, P>(world: &W, origin: Offset3, radius: i32, predicate: &P) -> Result<Pattern, ScanError>
where
    W: CellSource + ?Sized,
    P: CellPredicate + ?Sized,
{
    BlockDiscoverer::new(radius)?.scan(world, origin, predicate)
}

/// Closest candidate to the scan origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nearest {
    pub offset: Offset3,
    pub distance_sq: i128,
}

impl Nearest {
    #[inline]
    pub fn distance(&self) -> f64 {
        (self.distance_sq as f64).sqrt()
    }
}

/// Nearest candidate by straight-line distance from the origin.
///
/// Ties go to the lexicographically smallest offset (x, then y, then z), so
/// the answer depends only on the candidate set. With `skip_origin` the
/// origin itself (usually the requester's own cell) is ignored.
pub fn nearest(candidates: &Pattern, skip_origin: bool) -> Option<Nearest> {
    candidates
        .offsets()
        .filter(|o| !(skip_origin && o.is_zero()))
        .map(|o| (o.distance_sq(Offset3::ZERO), o))
        .min()
        .map(|(distance_sq, offset)| Nearest {
            offset,
            distance_sq,
        })
}
