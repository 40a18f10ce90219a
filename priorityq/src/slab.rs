//! Slab storage for queue items, and the generational `ItemId` handle.
//!
//! The original C core holds items by raw pointer into caller-allocated
//! memory and never allocates; a safe Rust port can't soundly keep live
//! pointers into storage the caller still owns, so this crate moves the
//! storage *into* the queue instead (see `DESIGN.md` / `SPEC_FULL.md` §9).
//! `Slab<T>` is a `Vec<Slot<T>>` plus a free list of recycled indices;
//! `ItemId` pairs a slot index with a generation counter so that using a
//! stale handle (one from a slot that has since been removed and reused)
//! is a well-defined no-op rather than aliasing an unrelated item.

use alloc::vec::Vec;

use crate::list::Links;

/// Raw index into a `Slab<T>`'s backing vector. Never exposed to callers on
/// its own — always wrapped in an `ItemId` alongside a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    #[inline]
    pub(crate) fn raw(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn from_usize(i: usize) -> Self {
        Self(u32::try_from(i).expect("priorityq: slab grew past u32::MAX slots"))
    }

    #[cfg(test)]
    pub(crate) fn from_raw_for_test(i: u32) -> Self {
        Self(i)
    }
}

/// Opaque handle to an item stored in a `Queue`. Returned by `Queue::insert`
/// and accepted by `enqueue`/`remove`/`payload`/`priority`/`is_active`.
///
/// Carries a generation counter alongside the slot index: every `Queue`
/// method that takes an `ItemId` checks it against the slot's live
/// generation and treats a mismatch (a handle from an item that has since
/// been dequeued/removed and whose slot was recycled for something else) as
/// "not present" rather than operating on the wrong item. This is additive
/// relative to the original C library, which has no equivalent concept
/// because it never reuses caller memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    index: SlotIndex,
    generation: u32,
}

impl ItemId {
    pub(crate) fn new(index: SlotIndex, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> SlotIndex {
        self.index
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

/// Where a live slot currently sits. `None` means the slot is either free
/// (on the slab's free list) or not part of any of the four queue lists;
/// the two are disambiguated by whether the slot's generation is currently
/// "occupied" (tracked by `Slab` via `occupied`, not by this enum alone).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    None,
    Done,
    Immediate,
    Q,
}

/// One slab row: the payload plus all of an item's queue bookkeeping.
/// Matches the base spec's `Item` record field-for-field, except storage
/// (`payload`) is now owned by the slot and `prev`/`next` are slab indices.
pub struct Slot<T> {
    payload: Option<T>,
    pub(crate) abs_priority: u8,
    pub(crate) rel_priority: u8,
    pub(crate) location: Location,
    pub(crate) urgent: bool,
    /// Which of the eight buckets this slot sits in, valid only while
    /// `location == Location::Q`. Lets `Queue::enqueue`/`remove` unlink an
    /// item in O(1) without scanning all eight bins to find its home.
    pub(crate) bin_index: u8,
    pub(crate) links: Links,
    generation: u32,
}

impl<T> Slot<T> {
    fn occupied(payload: T, abs_priority: u8, urgent: bool, generation: u32) -> Self {
        Self {
            payload: Some(payload),
            abs_priority,
            rel_priority: 0,
            location: Location::None,
            urgent,
            bin_index: 0,
            links: Links::new(),
            generation,
        }
    }

    fn vacant(generation: u32) -> Self {
        Self {
            payload: None,
            abs_priority: 0,
            rel_priority: 0,
            location: Location::None,
            urgent: false,
            bin_index: 0,
            links: Links::new(),
            generation,
        }
    }

    pub(crate) fn payload_ref(&self) -> &T {
        self.payload.as_ref().expect("occupied slot always holds a payload")
    }

    pub(crate) fn payload_mut(&mut self) -> &mut T {
        self.payload.as_mut().expect("occupied slot always holds a payload")
    }

    #[cfg(test)]
    pub(crate) fn vacant_for_test(generation: u32) -> Self {
        Self::vacant(generation)
    }
}

/// Slab of item slots backing a `Queue<T>`, plus a LIFO free list of
/// recycled indices. Growth only ever appends (`Vec::push`); a removed slot
/// is never physically removed from the vector, only marked vacant and
/// pushed onto `free`.
pub struct Slab<T> {
    slots: Vec<Slot<T>>,
    free: Vec<SlotIndex>,
}

impl<T> Slab<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { slots: Vec::with_capacity(cap), free: Vec::new() }
    }

    pub fn as_slice_mut(&mut self) -> &mut [Slot<T>] {
        &mut self.slots
    }

    /// Insert a brand-new payload, returning its handle. Reuses a freed slot
    /// if one is available (bumping its generation so any outstanding
    /// `ItemId` into the old occupant becomes stale), else grows the vector.
    pub fn insert(&mut self, payload: T, abs_priority: u8, urgent: bool) -> ItemId {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx.raw()];
            debug_assert!(slot.payload.is_none(), "free-listed slot still occupied");
            slot.payload = Some(payload);
            slot.abs_priority = abs_priority;
            slot.rel_priority = 0;
            slot.location = Location::None;
            slot.urgent = urgent;
            slot.generation = slot.generation.wrapping_add(1);
            ItemId { index: idx, generation: slot.generation }
        } else {
            let idx = SlotIndex::from_usize(self.slots.len());
            self.slots.push(Slot::occupied(payload, abs_priority, urgent, 0));
            ItemId { index: idx, generation: 0 }
        }
    }

    /// Look up a slot by `ItemId`, returning `None` if stale (generation
    /// mismatch) or out of range.
    pub fn get(&self, id: ItemId) -> Option<&Slot<T>> {
        let slot = self.slots.get(id.index().raw())?;
        (slot.payload.is_some() && slot.generation == id.generation()).then_some(slot)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Slot<T>> {
        let slot = self.slots.get_mut(id.index().raw())?;
        (slot.payload.is_some() && slot.generation == id.generation()).then_some(slot)
    }

    /// Whether `id` currently names a live (occupied, matching-generation)
    /// slot. Unlike `get`, does not borrow.
    pub fn is_live(&self, id: ItemId) -> bool {
        self.slots
            .get(id.index().raw())
            .is_some_and(|s| s.payload.is_some() && s.generation == id.generation())
    }

    /// Current generation of the slot at `idx`. Used to mint the `ItemId`
    /// returned from `Queue::dequeue`'s pop of the `done` list, where we
    /// have a bare `SlotIndex` and need the generation to build the handle
    /// callers expect to read back.
    pub fn generation_of(&self, idx: SlotIndex) -> u32 {
        self.slots[idx.raw()].generation
    }

    /// Take the payload out of `idx`, marking the slot vacant and pushing it
    /// onto the free list for reuse. Caller must have already unlinked the
    /// slot from whichever of the four queue lists it was in.
    pub fn take_and_free(&mut self, idx: SlotIndex) -> T {
        let slot = &mut self.slots[idx.raw()];
        debug_assert!(!slot.links.is_linked(), "freeing a slot still linked into a list");
        let payload = slot.payload.take().expect("freeing an already-vacant slot");
        slot.location = Location::None;
        self.free.push(idx);
        payload
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}
