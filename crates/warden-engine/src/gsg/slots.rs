//! Bounded identity-keyed slot pool.
//!
//! Hardware exposes a handful of numbered slots (light 0..n, clip plane
//! 0..n) while the scene can name any number of items. A pool keeps each
//! slot's binding across passes so an item that stays active is a cache hit
//! and needs no re-upload.

use std::rc::Rc;

/// Identity comparison for pooled items.
pub trait SlotIdentity {
    fn same(&self, other: &Self) -> bool;
}

impl<T> SlotIdentity for Rc<T> {
    #[inline]
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

/// Outcome of placing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Slot already held this item; parameters are still valid.
    Hit(usize),
    /// Slot was free or evicted; parameters must be uploaded.
    Bound(usize),
}

impl Assignment {
    #[inline]
    pub fn slot(self) -> usize {
        match self {
            Assignment::Hit(i) | Assignment::Bound(i) => i,
        }
    }
}

#[derive(Debug)]
struct Slot<K> {
    item: Option<K>,
    /// Claimed during the current pass.
    keep: bool,
}

#[derive(Debug)]
pub struct SlotPool<K> {
    slots: Vec<Slot<K>>,
}

impl<K: SlotIdentity + Clone> SlotPool<K> {
    pub fn new(size: usize) -> Self {
        Self { slots: (0..size).map(|_| Slot { item: None, keep: false }).collect() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Starts an allocation pass: no slot is claimed.
    pub fn begin_pass(&mut self) {
        for s in &mut self.slots {
            s.keep = false;
        }
    }

    /// Claims a slot for `item`. `active` is the complete set being placed
    /// this pass; only slots bound to items outside it may be evicted.
    ///
    /// Returns `None` when every slot is taken by an active item.
    pub fn assign(&mut self, item: &K, active: &[K]) -> Option<Assignment> {
        if let Some(i) = self.slots.iter().position(|s| s.item.as_ref().is_some_and(|b| b.same(item))) {
            self.slots[i].keep = true;
            return Some(Assignment::Hit(i));
        }

        let free = self.slots.iter().position(|s| s.item.is_none());
        let slot = free.or_else(|| {
            self.slots.iter().position(|s| {
                !s.keep && s.item.as_ref().is_some_and(|b| !active.iter().any(|a| a.same(b)))
            })
        })?;

        let s = &mut self.slots[slot];
        s.item = Some(item.clone());
        s.keep = true;
        Some(Assignment::Bound(slot))
    }

    #[inline]
    pub fn is_claimed(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| s.keep)
    }

    pub fn claimed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.keep).count()
    }

    pub fn bound(&self, slot: usize) -> Option<&K> {
        self.slots.get(slot).and_then(|s| s.item.as_ref())
    }

    /// Forgets every binding, forcing the next pass to upload again.
    pub fn clear_bindings(&mut self) {
        for s in &mut self.slots {
            s.item = None;
            s.keep = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<Rc<u32>> {
        (0..n as u32).map(Rc::new).collect()
    }

    fn place(pool: &mut SlotPool<Rc<u32>>, active: &[Rc<u32>]) -> Vec<Option<Assignment>> {
        pool.begin_pass();
        active.iter().map(|item| pool.assign(item, active)).collect()
    }

    // ── allocation passes ───────────────────────────────────────────────

    #[test]
    fn first_pass_binds_then_second_hits() {
        let mut pool = SlotPool::new(4);
        let set = items(3);
        let first = place(&mut pool, &set);
        assert!(first.iter().all(|a| matches!(a, Some(Assignment::Bound(_)))));

        let second = place(&mut pool, &set);
        assert_eq!(second, first.iter().map(|a| a.map(|a| Assignment::Hit(a.slot()))).collect::<Vec<_>>());
        assert_eq!(pool.claimed_count(), 3);
    }

    #[test]
    fn evicts_only_inactive_items() {
        let mut pool = SlotPool::new(2);
        let set = items(3);
        place(&mut pool, &set[..2]);

        // set[1] stays, set[0] leaves, set[2] arrives.
        let next = vec![set[1].clone(), set[2].clone()];
        let out = place(&mut pool, &next);
        assert_eq!(out[0], Some(Assignment::Hit(1)));
        assert_eq!(out[1], Some(Assignment::Bound(0)));
        assert!(Rc::ptr_eq(pool.bound(0).unwrap(), &set[2]));
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut pool = SlotPool::new(2);
        let set = items(3);
        let out = place(&mut pool, &set);
        assert!(out[2].is_none());
        assert_eq!(pool.claimed_count(), 2);
    }

    #[test]
    fn unclaimed_slots_keep_their_binding() {
        let mut pool = SlotPool::new(2);
        let set = items(2);
        place(&mut pool, &set);
        place(&mut pool, &set[..1]);
        assert!(pool.is_claimed(0));
        assert!(!pool.is_claimed(1));
        assert!(pool.bound(1).is_some());

        // Coming back is a hit, not a re-upload.
        let out = place(&mut pool, &set);
        assert_eq!(out[1], Some(Assignment::Hit(1)));
    }

    #[test]
    fn clear_bindings_forces_rebind() {
        let mut pool = SlotPool::new(1);
        let set = items(1);
        place(&mut pool, &set);
        pool.clear_bindings();
        assert_eq!(place(&mut pool, &set)[0], Some(Assignment::Bound(0)));
    }
}
