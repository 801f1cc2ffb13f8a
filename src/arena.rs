//! Reference-counted arena (C7): a fixed-capacity pool of single-allocation
//! blocks, each holding a counter plus payload, carved out of one
//! process-wide heap sized at boot. No allocation happens after that (spec
//! §4.6 Non-goals).
//!
//! Grounded on `original_source/src/netstack/util/memory.hpp`'s `RefPtr<T>`,
//! which places the refcount and the object in one allocation so freeing is
//! a single `free()` call. Expressed here as a slot table plus a smart
//! pointer borrowing from it, since Rust has no placement-new: `NetworkContext`
//! owns the slots, `ArenaBox` borrows from it and does the counting.

use crate::status::Status;
use std::sync::Mutex;

struct Slot<T> {
    refcount: usize,
    value: Option<T>,
}

impl<T> Slot<T> {
    const fn empty() -> Self {
        Self { refcount: 0, value: None }
    }
}

/// A bounded pool of `N` blocks of type `T`, allocated once. Every
/// [`ArenaBox`] handed out borrows from this context for its lifetime.
pub struct NetworkContext<T, const N: usize> {
    slots: Mutex<[Slot<T>; N]>,
}

impl<T, const N: usize> NetworkContext<T, N> {
    pub fn new() -> Self {
        Self { slots: Mutex::new(std::array::from_fn(|_| Slot::empty())) }
    }

    /// Claim a free slot and move `value` into it. Fails with
    /// `Status::Memory` if every slot is occupied -- the arena never grows.
    pub fn alloc(&self, value: T) -> Result<ArenaBox<'_, T, N>, Status> {
        let mut slots = self.slots.lock().map_err(|_| Status::Fail)?;
        let index = slots.iter().position(|s| s.refcount == 0).ok_or(Status::Memory)?;
        slots[index] = Slot { refcount: 1, value: Some(value) };
        drop(slots);
        Ok(ArenaBox { context: self, index })
    }

    pub fn available(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.iter().filter(|s| s.refcount == 0).count())
            .unwrap_or(0)
    }

    fn retain(&self, index: usize) {
        if let Ok(mut slots) = self.slots.lock() {
            slots[index].refcount += 1;
        }
    }

    fn release(&self, index: usize) {
        if let Ok(mut slots) = self.slots.lock() {
            slots[index].refcount -= 1;
            if slots[index].refcount == 0 {
                slots[index].value = None;
            }
        }
    }
}

impl<T, const N: usize> Default for NetworkContext<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte-budget admission control over the same process-wide heap the slot
/// table above is carved from. `ArenaBox` tracks *which* blocks are alive;
/// `HeapBudget` tracks *how much room is left*, which is what the
/// fragmenter's pre-flight check needs (spec §4.5: "check against the
/// context's remaining free memory; fail with Memory if insufficient")
/// before it builds a variable-sized fragment list.
pub struct HeapBudget {
    total: usize,
    used: Mutex<usize>,
}

impl HeapBudget {
    pub const fn new(total_bytes: usize) -> Self {
        Self { total: total_bytes, used: Mutex::new(0) }
    }

    pub fn available(&self) -> usize {
        self.total - *self.used.lock().expect("heap budget mutex poisoned")
    }

    /// Admit a `bytes`-sized allocation. Fails with `Status::Memory` without
    /// mutating the budget if there isn't room.
    pub fn reserve(&self, bytes: usize) -> Result<(), Status> {
        let mut used = self.used.lock().map_err(|_| Status::Fail)?;
        if self.total - *used < bytes {
            return Err(Status::Memory);
        }
        *used += bytes;
        Ok(())
    }

    /// Give back `bytes` reserved by an earlier [`Self::reserve`] call, once
    /// the allocation it covered is fully freed.
    pub fn release(&self, bytes: usize) {
        if let Ok(mut used) = self.used.lock() {
            *used = used.saturating_sub(bytes);
        }
    }
}

impl Default for HeapBudget {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A reference-counted handle into a [`NetworkContext`]'s slot table.
/// Cloning bumps the slot's refcount; dropping the last handle frees it
/// back to the pool.
pub struct ArenaBox<'ctx, T, const N: usize> {
    context: &'ctx NetworkContext<T, N>,
    index: usize,
}

impl<'ctx, T, const N: usize> ArenaBox<'ctx, T, N> {
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let slots = self.context.slots.lock().expect("arena mutex poisoned");
        f(slots[self.index].value.as_ref().expect("slot owned by this handle must be occupied"))
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut slots = self.context.slots.lock().expect("arena mutex poisoned");
        f(slots[self.index].value.as_mut().expect("slot owned by this handle must be occupied"))
    }
}

impl<'ctx, T, const N: usize> Clone for ArenaBox<'ctx, T, N> {
    fn clone(&self) -> Self {
        self.context.retain(self.index);
        Self { context: self.context, index: self.index }
    }
}

impl<'ctx, T, const N: usize> Drop for ArenaBox<'ctx, T, N> {
    fn drop(&mut self) {
        self.context.release(self.index);
    }
}
