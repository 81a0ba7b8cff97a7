use std::collections::{BTreeMap, VecDeque};

use tessel_cells::Cell;
use tessel_geom::Offset3;

/// Scripted world changes, applied on the simulation thread between scans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    SetCell { pos: Offset3, cell: Cell },
    PlaceStructure { relay: String },
    RemoveRelay { relay: String },
}

#[derive(Debug)]
pub struct EventEnvelope {
    pub id: u64,
    pub tick: u64,
    pub kind: Event,
}

pub struct EventQueue {
    // map of tick -> FIFO queue of events
    by_tick: BTreeMap<u64, VecDeque<EventEnvelope>>,
    pub now: u64,
    next_id: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self {
            by_tick: BTreeMap::new(),
            now: 0,
            next_id: 1,
        }
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Events scheduled in the past land on the current tick.
    pub fn emit_at(&mut self, tick: u64, kind: Event) -> u64 {
        let tick = tick.max(self.now);
        let id = self.alloc_id();
        let env = EventEnvelope { id, tick, kind };
        self.by_tick.entry(tick).or_default().push_back(env);
        id
    }

    pub fn pop_ready(&mut self) -> Option<EventEnvelope> {
        let q = self.by_tick.get_mut(&self.now)?;
        q.pop_front()
    }

    pub fn advance_tick(&mut self) {
        if self.by_tick.get(&self.now).is_some_and(VecDeque::is_empty) {
            self.by_tick.remove(&self.now);
        }
        self.now = self.now.wrapping_add(1);
    }

    /// Events not yet popped, across all ticks.
    pub fn len(&self) -> usize {
        self.by_tick.values().map(VecDeque::len).sum()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(x: i32) -> Event {
        Event::SetCell {
            pos: Offset3::new(x, 0, 0),
            cell: Cell::new(1, 0),
        }
    }

    #[test]
    fn events_fire_on_their_tick_in_order() {
        let mut q = EventQueue::new();
        q.emit_at(2, set(1));
        q.emit_at(0, set(2));
        q.emit_at(2, set(3));
        assert_eq!(q.len(), 3);

        assert_eq!(q.pop_ready().map(|e| e.kind), Some(set(2)));
        assert!(q.pop_ready().is_none());
        q.advance_tick();
        assert!(q.pop_ready().is_none());
        q.advance_tick();
        let a = q.pop_ready().unwrap();
        let b = q.pop_ready().unwrap();
        assert_eq!((a.kind, b.kind), (set(1), set(3)));
        assert!(a.id < b.id);
        assert!(q.is_empty());
    }

    #[test]
    fn late_events_run_now() {
        let mut q = EventQueue::new();
        q.advance_tick();
        q.advance_tick();
        q.emit_at(0, set(7));
        let e = q.pop_ready().unwrap();
        assert_eq!(e.tick, 2);
    }
}
