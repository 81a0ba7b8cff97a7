use tessel_cells::{Cell, CellDescriptor, CellId};
use tessel_geom::Offset3;

/// Opaque cell test run by scanners, possibly on worker threads.
///
/// Any `Fn(Cell, Offset3) -> bool` closure qualifies; the position is the
/// absolute world position of the cell. Use [`by_cell`] for tests that only
/// look at the cell itself.
pub trait CellPredicate: Send + Sync {
    fn test(&self, cell: Cell, pos: Offset3) -> bool;
}

impl<F> CellPredicate for F
where
    F: Fn(Cell, Offset3) -> bool + Send + Sync,
{
    #[inline]
    fn test(&self, cell: Cell, pos: Offset3) -> bool {
        self(cell, pos)
    }
}

/// Adapter for position-independent predicates.
pub struct ByCell<F>(pub F);

impl<F> CellPredicate for ByCell<F>
where
    F: Fn(Cell) -> bool + Send + Sync,
{
    #[inline]
    fn test(&self, cell: Cell, _pos: Offset3) -> bool {
        (self.0)(cell)
    }
}

pub fn by_cell<F>(f: F) -> ByCell<F>
where
    F: Fn(Cell) -> bool + Send + Sync,
{
    ByCell(f)
}

/// Cell type equals, any state.
#[derive(Clone, Copy, Debug)]
pub struct IsType(pub CellId);

impl CellPredicate for IsType {
    #[inline]
    fn test(&self, cell: Cell, _pos: Offset3) -> bool {
        cell.id == self.0
    }
}

/// Exact type and state.
#[derive(Clone, Copy, Debug)]
pub struct IsCell(pub Cell);

impl CellPredicate for IsCell {
    #[inline]
    fn test(&self, cell: Cell, _pos: Offset3) -> bool {
        cell == self.0
    }
}

/// Same acceptance rule the structure matcher uses. The no-check marker
/// accepts every loaded cell.
#[derive(Clone, Copy, Debug)]
pub struct Matches(pub CellDescriptor);

impl CellPredicate for Matches {
    #[inline]
    fn test(&self, cell: Cell, _pos: Offset3) -> bool {
        self.0.accepts(cell)
    }
}

#[derive(Clone, Debug)]
pub struct AnyOf(pub Vec<CellId>);

impl CellPredicate for AnyOf {
    fn test(&self, cell: Cell, _pos: Offset3) -> bool {
        self.0.contains(&cell.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_and_adapters() {
        let above_ground = |c: Cell, p: Offset3| !c.is_empty() && p.y >= 0;
        assert!(above_ground.test(Cell::new(1, 0), Offset3::new(0, 3, 0)));
        assert!(!above_ground.test(Cell::new(1, 0), Offset3::new(0, -3, 0)));

        let odd_state = by_cell(|c: Cell| c.state % 2 == 1);
        assert!(odd_state.test(Cell::new(4, 3), Offset3::ZERO));

        assert!(IsType(4).test(Cell::new(4, 9), Offset3::ZERO));
        assert!(!IsCell(Cell::new(4, 0)).test(Cell::new(4, 9), Offset3::ZERO));
        assert!(Matches(CellDescriptor::any_state(4)).test(Cell::new(4, 9), Offset3::ZERO));
        assert!(AnyOf(vec![2, 5]).test(Cell::new(5, 0), Offset3::ZERO));
    }
}
