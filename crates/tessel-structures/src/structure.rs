use std::ops::Deref;

use tessel_cells::CellDescriptor;
use tessel_geom::{Axis, Offset3, Rotation};
use tessel_world::{CellRead, CellSource};

use crate::pattern::{Pattern, PatternError};

/// The structure's center. It is the object hosting the check, not a cell
/// to verify, so single-offset checks against it always succeed.
pub const CENTER_OFFSET: Offset3 = Offset3::ZERO;

/// Count of satisfied versus required (non-marker) cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub satisfied: usize,
    pub required: usize,
}

impl Progress {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.satisfied == self.required
    }
}

/// A non-empty [`Pattern`] with read-only matching against a live world.
///
/// Every query treats unloaded or closed cells as mismatches, so partially
/// streamed worlds read as "incomplete" and never as complete.
#[derive(Clone, Debug, PartialEq)]
pub struct StructurePattern {
    pattern: Pattern,
}

impl Deref for StructurePattern {
    type Target = Pattern;

    fn deref(&self) -> &Pattern {
        &self.pattern
    }
}

impl TryFrom<Pattern> for StructurePattern {
    type Error = PatternError;

    fn try_from(pattern: Pattern) -> Result<Self, Self::Error> {
        StructurePattern::new(pattern)
    }
}

#[inline]
fn cell_matches<W: CellSource + ?Sized>(
    world: &W,
    anchor: Offset3,
    offset: Offset3,
    want: CellDescriptor,
) -> bool {
    if want.is_empty_marker() {
        return true;
    }
    // A position outside the i32 lattice reads like an unloaded cell.
    let Some(pos) = anchor.checked_add(offset) else {
        return false;
    };
    match world.cell_at(pos) {
        CellRead::Loaded(cell) => want.accepts(cell),
        CellRead::NotLoaded | CellRead::Closed => false,
    }
}

impl StructurePattern {
    pub fn new(pattern: Pattern) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// True when every offset accepts the world cell at `anchor + offset`.
    /// Stops at the first mismatch.
    pub fn matches<W: CellSource + ?Sized>(&self, world: &W, anchor: Offset3) -> bool {
        self.pattern
            .cells()
            .all(|(o, d)| cell_matches(world, anchor, o, d))
    }

    /// Check a single offset. [`CENTER_OFFSET`] always matches; offsets the
    /// pattern does not contain never do.
    pub fn match_single<W: CellSource + ?Sized>(
        &self,
        world: &W,
        anchor: Offset3,
        offset: Offset3,
    ) -> bool {
        if offset == CENTER_OFFSET {
            return true;
        }
        match self.pattern.get(offset) {
            Some(d) => cell_matches(world, anchor, offset, d),
            None => false,
        }
    }

    /// Full match restricted to one vertical level (pattern-relative y).
    /// A level without cells matches trivially.
    pub fn matches_slice<W: CellSource + ?Sized>(
        &self,
        world: &W,
        anchor: Offset3,
        level: i32,
    ) -> bool {
        self.matches_slice_along(world, anchor, Axis::VERTICAL, level)
    }

    pub fn matches_slice_along<W: CellSource + ?Sized>(
        &self,
        world: &W,
        anchor: Offset3,
        axis: Axis,
        level: i32,
    ) -> bool {
        self.pattern
            .cells()
            .filter(|(o, _)| o.component(axis) == level)
            .all(|(o, d)| cell_matches(world, anchor, o, d))
    }

    /// Lowest vertical level that does not match, `None` when complete.
    pub fn first_incomplete_level<W: CellSource + ?Sized>(
        &self,
        world: &W,
        anchor: Offset3,
    ) -> Option<i32> {
        self.pattern
            .levels(Axis::VERTICAL)
            .find(|y| !self.matches_slice(world, anchor, *y))
    }

    /// Every offset whose cell is wrong or unreadable, sorted.
    pub fn missing<W: CellSource + ?Sized>(&self, world: &W, anchor: Offset3) -> Vec<Offset3> {
        let mut out: Vec<Offset3> = self
            .pattern
            .cells()
            .filter(|(o, d)| !cell_matches(world, anchor, *o, *d))
            .map(|(o, _)| o)
            .collect();
        out.sort();
        out
    }

    pub fn progress<W: CellSource + ?Sized>(&self, world: &W, anchor: Offset3) -> Progress {
        let mut p = Progress::default();
        for (o, d) in self.pattern.cells() {
            if d.is_empty_marker() {
                continue;
            }
            p.required += 1;
            if cell_matches(world, anchor, o, d) {
                p.satisfied += 1;
            }
        }
        p
    }

    /// [`matches`](Self::matches) with offsets turned by `rot`, without
    /// building a rotated copy.
    pub fn matches_rotated<W: CellSource + ?Sized>(
        &self,
        world: &W,
        anchor: Offset3,
        rot: Rotation,
    ) -> bool {
        self.pattern
            .cells()
            .all(|(o, d)| cell_matches(world, anchor, rot.apply(o), d))
    }

    /// First quarter turn (in [`Rotation::ALL`] order) under which the
    /// structure is complete.
    pub fn find_rotation<W: CellSource + ?Sized>(
        &self,
        world: &W,
        anchor: Offset3,
    ) -> Option<Rotation> {
        Rotation::ALL
            .into_iter()
            .find(|r| self.matches_rotated(world, anchor, *r))
    }

    pub fn rotated(&self, rot: Rotation) -> StructurePattern {
        StructurePattern {
            pattern: self.pattern.rotated(rot),
        }
    }
}
