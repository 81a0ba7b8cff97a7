use serde::{Deserialize, Serialize};

pub type CellId = u16;
pub type CellState = u16;

// Compact cell representation used by worlds and patterns alike
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Debug, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub state: CellState,
}

impl Cell {
    pub const EMPTY: Cell = Cell { id: 0, state: 0 };

    #[inline]
    pub const fn new(id: CellId, state: CellState) -> Self {
        Self { id, state }
    }

    #[inline]
    pub const fn of_type(id: CellId) -> Self {
        Self { id, state: 0 }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.id == Self::EMPTY.id
    }
}

/// What a pattern expects to find at one offset.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellDescriptor {
    /// No check; matches any cell, loaded or not.
    Empty,
    /// Type and variant state must both be equal.
    Exact { cell: Cell },
    /// Type must be equal, state is ignored.
    AnyState { id: CellId },
}

impl CellDescriptor {
    #[inline]
    pub const fn exact(cell: Cell) -> Self {
        CellDescriptor::Exact { cell }
    }

    #[inline]
    pub const fn any_state(id: CellId) -> Self {
        CellDescriptor::AnyState { id }
    }

    #[inline]
    pub fn is_empty_marker(&self) -> bool {
        matches!(self, CellDescriptor::Empty)
    }

    #[inline]
    pub fn accepts(&self, cell: Cell) -> bool {
        match *self {
            CellDescriptor::Empty => true,
            CellDescriptor::Exact { cell: want } => want == cell,
            CellDescriptor::AnyState { id } => id == cell.id,
        }
    }

    /// Concrete cell written when a pattern is placed. `Empty` places nothing.
    #[inline]
    pub fn realize(&self) -> Option<Cell> {
        match *self {
            CellDescriptor::Empty => None,
            CellDescriptor::Exact { cell } => Some(cell),
            CellDescriptor::AnyState { id } => Some(Cell::of_type(id)),
        }
    }
}

impl From<Cell> for CellDescriptor {
    fn from(cell: Cell) -> Self {
        CellDescriptor::exact(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_requires_state() {
        let d = CellDescriptor::exact(Cell::new(3, 1));
        assert!(d.accepts(Cell::new(3, 1)));
        assert!(!d.accepts(Cell::new(3, 2)));
        assert!(!d.accepts(Cell::new(4, 1)));
    }

    #[test]
    fn any_state_ignores_variant() {
        let d = CellDescriptor::any_state(3);
        assert!(d.accepts(Cell::new(3, 0)));
        assert!(d.accepts(Cell::new(3, 9)));
        assert!(!d.accepts(Cell::new(2, 0)));
        assert_eq!(d.realize(), Some(Cell::new(3, 0)));
    }

    #[test]
    fn empty_marker_accepts_everything() {
        let d = CellDescriptor::Empty;
        assert!(d.is_empty_marker());
        assert!(d.accepts(Cell::EMPTY));
        assert!(d.accepts(Cell::new(u16::MAX, u16::MAX)));
        assert_eq!(d.realize(), None);
    }
}
