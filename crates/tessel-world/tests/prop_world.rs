use proptest::prelude::*;
use tessel_cells::Cell;
use tessel_geom::{Bounds3, Offset3};
use tessel_world::{CellRead, CellSink, CellSource, ChunkedWorld};

fn pos() -> impl Strategy<Value = Offset3> {
    (-20i32..=20, -20i32..=20, -20i32..=20).prop_map(|(x, y, z)| Offset3::new(x, y, z))
}

proptest! {
    // The last write to a position wins, and neighbours are untouched.
    #[test]
    fn set_then_get(writes in proptest::collection::vec((pos(), 1u16..50, 0u16..4), 1..64), size in 4i32..=9) {
        let mut w = ChunkedWorld::new(size);
        w.load_region(Bounds3::cube(Offset3::ZERO, 21));
        let mut expect = std::collections::HashMap::new();
        for (p, id, st) in &writes {
            let c = Cell::new(*id, *st);
            w.set_cell(*p, c).unwrap();
            expect.insert(*p, c);
        }
        for (p, c) in &expect {
            prop_assert_eq!(w.cell_at(*p), CellRead::Loaded(*c));
        }
        prop_assert_eq!(w.non_empty_cells().len(), expect.len());
    }

    // Chunk keys partition space: a position's chunk origin is within one chunk of it.
    #[test]
    fn chunk_key_contains_position(p in pos(), size in 1i32..=17) {
        let w = ChunkedWorld::new(size);
        let origin = w.chunk_key(p).origin(size);
        let local = p - origin;
        prop_assert!(local.x >= 0 && local.x < size);
        prop_assert!(local.y >= 0 && local.y < size);
        prop_assert!(local.z >= 0 && local.z < size);
    }
}
