use std::collections::HashMap;
use std::sync::Arc;

use tessel_cells::CellDescriptor;
use tessel_geom::{Axis, Bounds3, Offset3, Rotation};
use tessel_world::{CellSink, CellSource, WorldError};

use crate::tiles::{TileCallbacks, TileContext, TileHook};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern has no cells")]
    Empty,
    #[error("symbol {0:?} has no legend entry")]
    UnknownSymbol(char),
    #[error("layout has no origin symbol {0:?}")]
    MissingOrigin(char),
    #[error("origin symbol {0:?} appears more than once")]
    DuplicateOrigin(char),
}

/// Sparse map from offset to expected cell, with a cached bounding box.
///
/// Offsets are relative to a logical origin `(0,0,0)`. Built once, then only
/// read; matchers never mutate it.
#[derive(Clone, Debug, Default)]
pub struct Pattern {
    cells: HashMap<Offset3, CellDescriptor>,
    bounds: Option<Bounds3>,
    tiles: TileCallbacks,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one cell.
    pub fn add_cell(&mut self, offset: Offset3, descriptor: CellDescriptor) {
        self.cells.insert(offset, descriptor);
        match self.bounds.as_mut() {
            Some(b) => b.include(offset),
            None => self.bounds = Some(Bounds3::point(offset)),
        }
    }

    pub fn set_tile_hook(&mut self, offset: Offset3, hook: TileHook) {
        self.tiles.insert(offset, hook);
    }

    /// Bounding box over all offsets. Must not be called on an empty
    /// pattern; release builds get a zero box.
    pub fn bounds(&self) -> Bounds3 {
        debug_assert!(self.bounds.is_some(), "bounds() on an empty pattern");
        self.bounds.unwrap_or(Bounds3::ZERO)
    }

    #[inline]
    pub fn try_bounds(&self) -> Option<Bounds3> {
        self.bounds
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, offset: Offset3) -> Option<CellDescriptor> {
        self.cells.get(&offset).copied()
    }

    #[inline]
    pub fn contains(&self, offset: Offset3) -> bool {
        self.cells.contains_key(&offset)
    }

    /// Read-only view; order is not significant.
    pub fn cells(&self) -> impl Iterator<Item = (Offset3, CellDescriptor)> + '_ {
        self.cells.iter().map(|(o, d)| (*o, *d))
    }

    pub fn offsets(&self) -> impl Iterator<Item = Offset3> + '_ {
        self.cells.keys().copied()
    }

    pub fn tiles(&self) -> &TileCallbacks {
        &self.tiles
    }

    /// All entries whose `axis` coordinate equals `level`. Empty when the
    /// level holds no cells.
    pub fn slice_at(&self, axis: Axis, level: i32) -> Vec<(Offset3, CellDescriptor)> {
        let mut out: Vec<(Offset3, CellDescriptor)> = self
            .cells()
            .filter(|(o, _)| o.component(axis) == level)
            .collect();
        out.sort_by_key(|(o, _)| *o);
        out
    }

    /// Level range along `axis`, empty range for an empty pattern.
    pub fn levels(&self, axis: Axis) -> std::ops::RangeInclusive<i32> {
        match self.bounds {
            Some(b) => b.levels(axis),
            #[allow(clippy::reversed_empty_ranges)]
            None => 1..=0,
        }
    }

    /// Vertical slices from bottom to top, each sorted by offset. Levels with
    /// no cells are skipped.
    pub fn layers(&self) -> Vec<(i32, Vec<(Offset3, CellDescriptor)>)> {
        self.levels(Axis::VERTICAL)
            .map(|y| (y, self.slice_at(Axis::VERTICAL, y)))
            .filter(|(_, s)| !s.is_empty())
            .collect()
    }

    /// Copy of this pattern turned about the vertical axis. Tile hooks move
    /// with their offsets.
    pub fn rotated(&self, rot: Rotation) -> Pattern {
        let mut out = Pattern::new();
        for (o, d) in self.cells() {
            out.add_cell(rot.apply(o), d);
        }
        out.tiles = self.tiles.rotated(rot);
        out
    }

    /// Write the pattern into a world anchored at `anchor`, then fire each
    /// tile hook once. Nothing is written unless every target is loaded.
    /// Returns the number of cells written.
    pub fn place<W>(&self, world: &mut W, anchor: Offset3) -> Result<usize, WorldError>
    where
        W: CellSink + CellSource,
    {
        let mut order: Vec<(Offset3, CellDescriptor)> = self.cells().collect();
        order.sort_by_key(|(o, _)| *o);
        for (o, _) in &order {
            // Off the i32 lattice counts as unloaded.
            match anchor.checked_add(*o) {
                Some(pos) if world.is_loaded(pos) => {}
                Some(pos) => return Err(WorldError::NotLoaded(pos)),
                None => return Err(WorldError::NotLoaded(anchor)),
            }
        }
        let mut written = 0usize;
        for (o, d) in &order {
            if let Some(cell) = d.realize() {
                world.set_cell(anchor + *o, cell)?;
                written += 1;
            }
        }
        for o in self.tiles.offsets() {
            let Some(hook) = self.tiles.get(o) else {
                continue;
            };
            let Some(pos) = anchor.checked_add(o) else {
                return Err(WorldError::NotLoaded(anchor));
            };
            let hook = Arc::clone(hook);
            let cell = self.get(o).and_then(|d| d.realize());
            let mut ctx = TileContext::new(o, pos, cell, world);
            hook(&mut ctx)?;
        }
        log::trace!(target: "structures", "placed {} cell(s) at {:?}", written, anchor);
        Ok(written)
    }
}

impl PartialEq for Pattern {
    /// Cell sets only; hooks are not comparable.
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

/// Fluent construction for static content patterns.
#[derive(Default)]
pub struct PatternBuilder {
    pattern: Pattern,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the no-check marker at the origin; the origin is the object that
    /// hosts the structure, not a cell to verify.
    pub fn origin_marker(mut self) -> Self {
        self.pattern.add_cell(Offset3::ZERO, CellDescriptor::Empty);
        self
    }

    pub fn cell(mut self, offset: impl Into<Offset3>, descriptor: CellDescriptor) -> Self {
        self.pattern.add_cell(offset.into(), descriptor);
        self
    }

    /// Fill every offset of `bounds` that is not yet set.
    pub fn fill_box(mut self, bounds: Bounds3, descriptor: CellDescriptor) -> Self {
        for y in bounds.min.y..=bounds.max.y {
            for z in bounds.min.z..=bounds.max.z {
                for x in bounds.min.x..=bounds.max.x {
                    let o = Offset3::new(x, y, z);
                    if !self.pattern.contains(o) {
                        self.pattern.add_cell(o, descriptor);
                    }
                }
            }
        }
        self
    }

    pub fn tile(mut self, offset: impl Into<Offset3>, hook: TileHook) -> Self {
        self.pattern.set_tile_hook(offset.into(), hook);
        self
    }

    /// Add cells from an ASCII layout.
    ///
    /// `layers` run bottom to top; within a layer each row is one `z` step
    /// and each character one `x` step. `' '` and `'.'` are skipped. The
    /// single `origin` symbol becomes `(0,0,0)` with the no-check marker and
    /// every other offset is taken relative to it.
    pub fn layout<L, R>(
        mut self,
        layers: &[L],
        legend: &[(char, CellDescriptor)],
        origin: char,
    ) -> Result<Self, PatternError>
    where
        L: AsRef<[R]>,
        R: AsRef<str>,
    {
        let mut at: Option<Offset3> = None;
        let mut raw: Vec<(Offset3, char)> = Vec::new();
        for (y, layer) in layers.iter().enumerate() {
            for (z, row) in layer.as_ref().iter().enumerate() {
                for (x, ch) in row.as_ref().chars().enumerate() {
                    let o = Offset3::new(x as i32, y as i32, z as i32);
                    if ch == origin {
                        if at.replace(o).is_some() {
                            return Err(PatternError::DuplicateOrigin(origin));
                        }
                    } else if ch != ' ' && ch != '.' {
                        raw.push((o, ch));
                    }
                }
            }
        }
        let at = at.ok_or(PatternError::MissingOrigin(origin))?;
        self.pattern.add_cell(Offset3::ZERO, CellDescriptor::Empty);
        for (o, ch) in raw {
            let d = legend
                .iter()
                .find(|(c, _)| *c == ch)
                .map(|(_, d)| *d)
                .ok_or(PatternError::UnknownSymbol(ch))?;
            self.pattern.add_cell(o - at, d);
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Pattern, PatternError> {
        if self.pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_cells::Cell;
    use tessel_world::{CellRead, ChunkedWorld, TileData};

    fn d(id: u16) -> CellDescriptor {
        CellDescriptor::exact(Cell::new(id, 0))
    }

    #[test]
    fn bounds_track_inserts() {
        let mut p = Pattern::new();
        assert_eq!(p.try_bounds(), None);
        p.add_cell(Offset3::new(1, 0, 0), d(1));
        p.add_cell(Offset3::new(-2, 3, 0), d(1));
        p.add_cell(Offset3::new(1, 0, 0), d(2));
        assert_eq!(p.len(), 2);
        assert_eq!(p.get(Offset3::new(1, 0, 0)), Some(d(2)));
        let b = p.bounds();
        assert_eq!(b.min, Offset3::new(-2, 0, 0));
        assert_eq!(b.max, Offset3::new(1, 3, 0));
    }

    #[test]
    #[should_panic(expected = "empty pattern")]
    #[cfg(debug_assertions)]
    fn bounds_on_empty_pattern_fails_loudly() {
        let _ = Pattern::new().bounds();
    }

    #[test]
    fn slice_at_filters_one_level() {
        let p = PatternBuilder::new()
            .cell((0, 0, 0), d(1))
            .cell((1, 0, 0), d(1))
            .cell((0, 2, 0), d(2))
            .build()
            .unwrap();
        assert_eq!(p.slice_at(Axis::Y, 0).len(), 2);
        assert_eq!(p.slice_at(Axis::Y, 2), vec![(Offset3::new(0, 2, 0), d(2))]);
        assert!(p.slice_at(Axis::Y, 1).is_empty());
        assert_eq!(p.slice_at(Axis::X, 1), vec![(Offset3::new(1, 0, 0), d(1))]);
        let layers: Vec<i32> = p.layers().into_iter().map(|(y, _)| y).collect();
        assert_eq!(layers, vec![0, 2]);
    }

    #[test]
    fn builder_refuses_empty() {
        assert_eq!(PatternBuilder::new().build().unwrap_err(), PatternError::Empty);
    }

    #[test]
    fn fill_box_keeps_existing_entries() {
        let p = PatternBuilder::new()
            .origin_marker()
            .fill_box(Bounds3::cube(Offset3::ZERO, 1), d(3))
            .build()
            .unwrap();
        assert_eq!(p.len(), 27);
        assert_eq!(p.get(Offset3::ZERO), Some(CellDescriptor::Empty));
    }

    #[test]
    fn layout_is_relative_to_origin() {
        let legend = [('#', d(1)), ('o', d(2))];
        let p = PatternBuilder::new()
            .layout(&[["#@#"], [".o."]], &legend, '@')
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(p.get(Offset3::ZERO), Some(CellDescriptor::Empty));
        assert_eq!(p.get(Offset3::new(-1, 0, 0)), Some(d(1)));
        assert_eq!(p.get(Offset3::new(1, 0, 0)), Some(d(1)));
        assert_eq!(p.get(Offset3::new(0, 1, 0)), Some(d(2)));
        assert_eq!(p.len(), 4);
    }

    #[test]
    fn layout_errors() {
        let legend = [('#', d(1))];
        let missing = PatternBuilder::new().layout(&[["##"]], &legend, '@');
        assert!(matches!(missing, Err(PatternError::MissingOrigin('@'))));
        let dup = PatternBuilder::new().layout(&[["@@"]], &legend, '@');
        assert!(matches!(dup, Err(PatternError::DuplicateOrigin('@'))));
        let unknown = PatternBuilder::new().layout(&[["@x"]], &legend, '@');
        assert!(matches!(unknown, Err(PatternError::UnknownSymbol('x'))));
    }

    #[test]
    fn rotated_moves_cells_and_hooks() {
        let hook: TileHook = Arc::new(|_ctx: &mut TileContext<'_>| Ok(()));
        let p = PatternBuilder::new()
            .cell((1, 0, 0), d(1))
            .tile((1, 0, 0), hook)
            .build()
            .unwrap();
        let r = p.rotated(Rotation::Cw90);
        assert_eq!(r.get(Offset3::new(0, 0, 1)), Some(d(1)));
        assert_eq!(r.tiles().offsets(), vec![Offset3::new(0, 0, 1)]);
        assert_eq!(r.rotated(Rotation::Cw270), p);
    }

    #[test]
    fn place_writes_cells_then_fires_hooks_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let hook: TileHook = Arc::new(move |ctx: &mut TileContext<'_>| {
            counter.fetch_add(1, Ordering::SeqCst);
            let id = ctx.cell.map(|c| c.id as i64).unwrap_or(-1);
            ctx.attach(TileData::new("core").with("id", id))
        });
        let p = PatternBuilder::new()
            .origin_marker()
            .cell((1, 0, 0), d(7))
            .cell((0, 1, 0), CellDescriptor::any_state(8))
            .tile((1, 0, 0), hook)
            .build()
            .unwrap();
        let mut w = ChunkedWorld::new(8);
        w.load_region(Bounds3::cube(Offset3::new(4, 4, 4), 2));
        let anchor = Offset3::new(4, 4, 4);
        assert_eq!(p.place(&mut w, anchor), Ok(2));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(w.get(anchor + Offset3::new(1, 0, 0)), CellRead::Loaded(Cell::new(7, 0)));
        assert_eq!(w.get(anchor + Offset3::new(0, 1, 0)), CellRead::Loaded(Cell::new(8, 0)));
        assert_eq!(w.get(anchor), CellRead::Loaded(Cell::EMPTY));
        assert_eq!(
            w.tile(anchor + Offset3::new(1, 0, 0)).and_then(|t| t.get("id")),
            Some(7)
        );
    }

    #[test]
    fn place_into_unloaded_region_writes_nothing() {
        let p = PatternBuilder::new()
            .cell((0, 0, 0), d(1))
            .cell((9, 0, 0), d(1))
            .build()
            .unwrap();
        let mut w = ChunkedWorld::new(8);
        w.load_region(Bounds3::point(Offset3::ZERO));
        assert_eq!(
            p.place(&mut w, Offset3::ZERO),
            Err(WorldError::NotLoaded(Offset3::new(9, 0, 0)))
        );
        assert_eq!(w.get(Offset3::ZERO), CellRead::Loaded(Cell::EMPTY));
    }
}
