/*!
 * Request Slot Pool
 *
 * Slots live in one growable vector partitioned by `active`:
 * `[0, active)` are in flight, `[active, len)` are idle and reusable.
 * Completions arrive in any order, so a released slot is swapped with the
 * last active slot instead of shifting everything after it. Both swapped
 * slots get their identity rewritten to their new position, which keeps
 * identity-to-slot lookup a plain index.
 */

use super::slot::Slot;
use crate::core::PoolError;
use tracing::trace;

/// Pool of reusable request slots
#[derive(Debug, Default)]
pub struct SlotPool {
    slots: Vec<Slot>,
    active: usize,
    submissions: u64,
    completions: u64,
}

impl SlotPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool with `capacity` idle slots already allocated
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            slots.push(Slot::new(i as u32));
        }
        Self {
            slots,
            ..Self::default()
        }
    }

    /// Take an idle slot, growing the pool when every slot is in flight
    ///
    /// # Performance
    /// Hot path - O(1), allocates only when the pool grows
    pub fn acquire(&mut self) -> &mut Slot {
        if self.active == self.slots.len() {
            let id = self.slots.len() as u32;
            self.slots.push(Slot::new(id));
            trace!(id = id, capacity = self.slots.len(), "Request pool grew");
        }

        let slot = &mut self.slots[self.active];
        self.active += 1;
        self.submissions += 1;
        slot
    }

    /// Return slot `id` to the free suffix
    ///
    /// Returns the released slot at its new position so the caller can
    /// detach it. Fails if `id` is not in the active prefix or holds no
    /// continuation.
    ///
    /// # Performance
    /// Hot path - O(1) swap removal
    pub fn release(&mut self, id: u32) -> Result<&mut Slot, PoolError> {
        let index = id as usize;
        if index >= self.active {
            return Err(PoolError::NotActive {
                id,
                active: self.active,
            });
        }
        if !self.slots[index].is_armed() {
            return Err(PoolError::MissingContinuation(id));
        }

        self.active -= 1;
        self.completions += 1;
        let last = self.active;

        if index != last {
            self.slots.swap(index, last);
            self.slots[index].control().set_id(index as u32);
            self.slots[last].control().set_id(last as u32);
        }

        Ok(&mut self.slots[last])
    }

    /// Slot at position `id`
    #[inline]
    pub fn get(&self, id: u32) -> Option<&Slot> {
        self.slots.get(id as usize)
    }

    /// Slots ever allocated
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots currently in flight
    #[inline]
    pub fn active(&self) -> usize {
        self.active
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.slots.len(),
            active: self.active,
            submissions: self.submissions,
            completions: self.completions,
        }
    }
}

/// Statistics snapshot for a slot pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub active: usize,
    pub submissions: u64,
    pub completions: u64,
}
