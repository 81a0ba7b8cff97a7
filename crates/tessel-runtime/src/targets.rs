//! Generational handles for scan requesters.
//!
//! A scan result carries the [`TargetId`] of whoever asked for it. By the
//! time it is drained the requester may be gone; a removed slot bumps its
//! generation so the old id no longer resolves and the result is dropped.

/// Index plus generation. Never reused for a different target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    pub index: u32,
    pub generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slab of targets with free-slot reuse.
pub struct TargetArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for TargetArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> TargetArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> TargetId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return TargetId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        TargetId {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, id: TargetId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, id: TargetId) -> Option<&T> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, id: TargetId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.value.as_mut()
    }

    #[inline]
    pub fn contains(&self, id: TargetId) -> bool {
        self.get(id).is_some()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value.as_ref().map(|v| {
                (
                    TargetId {
                        index: i as u32,
                        generation: s.generation,
                    },
                    v,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TargetId, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value.as_mut().map(|v| {
                (
                    TargetId {
                        index: i as u32,
                        generation,
                    },
                    v,
                )
            })
        })
    }

    /// Live ids, in slot order.
    pub fn ids(&self) -> Vec<TargetId> {
        self.iter().map(|(id, _)| id).collect()
    }
}

/// A requester that may stop accepting results before it is removed,
/// e.g. an object torn down but not yet reclaimed.
pub trait ScanTarget {
    fn is_live(&self) -> bool {
        true
    }
}

/// Lookup used by the scheduler's drain to resolve completions.
pub trait ScanTargets {
    type Target;

    /// `None` when the target no longer exists or is no longer live.
    fn target_mut(&mut self, id: TargetId) -> Option<&mut Self::Target>;
}

impl<T: ScanTarget> ScanTargets for TargetArena<T> {
    type Target = T;

    fn target_mut(&mut self, id: TargetId) -> Option<&mut T> {
        self.get_mut(id).filter(|t| t.is_live())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        live: bool,
    }

    impl ScanTarget for Probe {
        fn is_live(&self) -> bool {
            self.live
        }
    }

    #[test]
    fn removed_ids_stay_dead_after_reuse() {
        let mut arena = TargetArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.remove(a), None);

        let c = arena.insert("c");
        assert_eq!(c.index, a.index);
        assert_ne!(c.generation, a.generation);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(c), Some(&"c"));
        assert_eq!(arena.ids(), vec![c, b]);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn dead_targets_do_not_resolve() {
        let mut arena = TargetArena::new();
        let id = arena.insert(Probe { live: true });
        assert!(arena.target_mut(id).is_some());
        if let Some(p) = arena.get_mut(id) {
            p.live = false;
        }
        assert!(arena.target_mut(id).is_none());
        assert!(arena.contains(id));
    }

    #[test]
    fn iter_mut_reaches_every_live_value() {
        let mut arena = TargetArena::new();
        let ids: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        arena.remove(ids[1]);
        for (_, v) in arena.iter_mut() {
            *v *= 10;
        }
        let vals: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(vals, vec![0, 20, 30]);
    }
}
