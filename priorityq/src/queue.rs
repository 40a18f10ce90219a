//! The lazy, starvation-free priority queue.
//!
//! Four regions hold items at any moment:
//!
//! - `done`: ready to be returned, head of line for `dequeue`. Urgent items
//!   land here directly.
//! - `immediate`: priority-0 items and items promoted out of the bucket
//!   bank, waiting to be lazily drained into `done`.
//! - `processing`: a scratch list holding whatever bucket a counter advance
//!   just fired; never non-empty outside the body of a `dequeue` call.
//! - `bins[0..8)`: eight buckets holding items not yet due, indexed by
//!   [`bits::bucket_index`].
//!
//! A rolling 8-bit counter `pc` advances during `dequeue` to promote
//! bucketed items toward `immediate`; see `bits::advance_counter` for the
//! bit arithmetic and `counter_advance` below for how it's driven. None of
//! this is safe to replace with a generic priority comparator — the
//! starvation freedom and amortized-cost guarantees both come from the
//! exact bit-difference rule in `bits.rs`.

use log::{debug, trace};

use crate::bits::{self, BINS, URGENT};
use crate::list::IndexList;
use crate::slab::{ItemId, Location, Slab, SlotIndex};

/// A lazy, starvation-free, bounded-priority queue.
///
/// `T` is the caller's payload type; the queue owns it for as long as the
/// item is enqueued. Priorities run `0..=127`, plus the distinguished
/// [`URGENT`] sentinel (128) for items that should bypass priority
/// scheduling entirely and come out in insertion order ahead of everything
/// else.
///
/// Every mutating method takes `&mut self`, so two operations can never run
/// concurrently on the same queue without the borrow checker rejecting the
/// program — this crate does no internal locking and makes no attempt to
/// be `Sync`.
pub struct Queue<T> {
    slab: Slab<T>,
    done: IndexList,
    immediate: IndexList,
    processing: IndexList,
    bins: [IndexList; BINS],
    pc: u8,
    size: usize,
    size_done: usize,
    size_immediate: usize,
    size_q: usize,
    counter_imed: usize,
}

impl<T> Queue<T> {
    /// Construct an empty queue.
    pub fn new() -> Self {
        Self {
            slab: Slab::new(),
            done: IndexList::new(),
            immediate: IndexList::new(),
            processing: IndexList::new(),
            bins: [IndexList::new(); BINS],
            pc: 0,
            size: 0,
            size_done: 0,
            size_immediate: 0,
            size_q: 0,
            counter_imed: 0,
        }
    }

    /// Construct an empty queue with slab storage pre-reserved for `n`
    /// items.
    pub fn with_capacity(n: usize) -> Self {
        Self { slab: Slab::with_capacity(n), ..Self::new() }
    }

    /// Current total item count.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Current value of the rolling priority counter. Exposed for testing
    /// and diagnostics; not meaningful to callers beyond that.
    pub fn counter(&self) -> u8 {
        self.pc
    }

    /// Number of items currently sitting in `bins[i]`. Panics if `i >= 8`.
    pub fn bin_len(&self, i: usize) -> usize {
        self.bins[i].len()
    }

    pub fn done_len(&self) -> usize {
        self.size_done
    }

    pub fn immediate_len(&self) -> usize {
        self.size_immediate
    }

    /// Items currently in `processing` plus all eight `bins`.
    pub fn q_len(&self) -> usize {
        self.size_q
    }

    /// Place a brand-new payload into the queue, returning its handle.
    pub fn insert(&mut self, payload: T, priority: u8) -> ItemId {
        let (abs_priority, urgent) = bits::classify_priority(priority);
        let id = self.slab.insert(payload, abs_priority, urgent);
        self.fresh_enqueue(id.index());
        trace!("insert: abs_priority={abs_priority} urgent={urgent} pc={}", self.pc);
        id
    }

    /// Re-prioritize (or urgent-escalate) an item already known to the
    /// queue. Returns whether the call had any effect: downward
    /// re-prioritization and redundant upward re-prioritization are both
    /// no-ops that return `false`, and a stale/foreign `id` always returns
    /// `false`.
    ///
    /// The stored priority value ([`Self::priority`]) is updated to the new
    /// value even on a no-op call — mirroring the C original, where
    /// `priority_set` always runs before the enqueue logic inspects the old
    /// position. Only queue *position* is preserved by a no-op, not the
    /// value a caller reads back afterward.
    pub fn enqueue(&mut self, id: ItemId, priority: u8) -> bool {
        if !self.slab.is_live(id) {
            return false;
        }
        let idx = id.index();
        let (abs_new, urgent_new) = bits::classify_priority(priority);

        let slots = self.slab.as_slice_mut();
        slots[idx.raw()].abs_priority = abs_new;
        slots[idx.raw()].urgent = urgent_new;
        let location = slots[idx.raw()].location;

        match location {
            Location::Done => false,
            Location::Immediate => {
                if urgent_new {
                    self.escalate_to_done(idx, location);
                    true
                } else {
                    false
                }
            }
            Location::Q => {
                if urgent_new {
                    self.escalate_to_done(idx, location);
                    return true;
                }
                let rel = self.slab.as_slice_mut()[idx.raw()].rel_priority;
                let remaining = rel.wrapping_sub(self.pc);
                if abs_new >= remaining {
                    false
                } else {
                    let bin = self.slab.as_slice_mut()[idx.raw()].bin_index as usize;
                    self.bins[bin].unlink(idx, self.slab.as_slice_mut());
                    self.size_q -= 1;
                    self.size -= 1;
                    self.fresh_enqueue(idx);
                    true
                }
            }
            Location::None => {
                self.fresh_enqueue(idx);
                true
            }
        }
    }

    /// Return the next item per the dequeue schedule, or `None` if empty.
    pub fn dequeue(&mut self) -> Option<(ItemId, T)> {
        if self.size == 0 {
            return None;
        }
        loop {
            self.immediate_drain();
            if self.size_q > 0 {
                if !self.processing.is_empty() {
                    self.processing_drain();
                } else {
                    self.counter_advance();
                }
            }
            if let Some(idx) = self.done.pop_head(self.slab.as_slice_mut()) {
                self.size_done -= 1;
                self.size -= 1;
                let generation = self.slab.generation_of(idx);
                let payload = self.slab.take_and_free(idx);
                return Some((ItemId::new(idx, generation), payload));
            }
            if self.size == 0 {
                return None;
            }
        }
    }

    /// Detach `id` from the queue, returning its payload if it was still
    /// enqueued. Idempotent: removing an already-removed or stale `id` is a
    /// no-op that returns `None`.
    pub fn remove(&mut self, id: ItemId) -> Option<T> {
        if !self.slab.is_live(id) {
            return None;
        }
        let idx = id.index();
        let location = self.slab.as_slice_mut()[idx.raw()].location;
        match location {
            Location::None => None,
            Location::Done => {
                self.done.unlink(idx, self.slab.as_slice_mut());
                self.size_done -= 1;
                self.size -= 1;
                Some(self.slab.take_and_free(idx))
            }
            Location::Immediate => {
                self.immediate.unlink(idx, self.slab.as_slice_mut());
                self.size_immediate -= 1;
                self.size -= 1;
                Some(self.slab.take_and_free(idx))
            }
            Location::Q => {
                let bin = self.slab.as_slice_mut()[idx.raw()].bin_index as usize;
                self.bins[bin].unlink(idx, self.slab.as_slice_mut());
                self.size_q -= 1;
                self.size -= 1;
                Some(self.slab.take_and_free(idx))
            }
        }
    }

    /// 0 for urgent, else the stored absolute priority. `None` if `id` is
    /// stale or foreign.
    pub fn priority(&self, id: ItemId) -> Option<u8> {
        self.slab.get(id).map(|s| s.abs_priority)
    }

    pub fn payload(&self, id: ItemId) -> Option<&T> {
        self.slab.get(id).map(|s| s.payload_ref())
    }

    pub fn payload_mut(&mut self, id: ItemId) -> Option<&mut T> {
        self.slab.get_mut(id).map(|s| s.payload_mut())
    }

    /// Whether `id` currently names an item linked into one of the four
    /// queue regions.
    pub fn is_active(&self, id: ItemId) -> bool {
        self.slab.get(id).is_some_and(|s| s.location != Location::None)
    }

    // ---- internal algorithm -------------------------------------------

    fn link_done(&mut self, idx: SlotIndex) {
        let slots = self.slab.as_slice_mut();
        slots[idx.raw()].location = Location::Done;
        self.done.push_tail(idx, slots);
        self.size_done += 1;
    }

    fn link_immediate(&mut self, idx: SlotIndex) {
        let slots = self.slab.as_slice_mut();
        slots[idx.raw()].location = Location::Immediate;
        self.immediate.push_tail(idx, slots);
        self.size_immediate += 1;
    }

    fn link_bin(&mut self, idx: SlotIndex, bin: usize) {
        let slots = self.slab.as_slice_mut();
        slots[idx.raw()].location = Location::Q;
        slots[idx.raw()].bin_index = bin as u8;
        self.bins[bin].push_tail(idx, slots);
        self.size_q += 1;
    }

    /// Move an item out of `immediate` or a bucket straight into `done`,
    /// without touching `size` (it's a region transfer, not an insertion).
    fn escalate_to_done(&mut self, idx: SlotIndex, location: Location) {
        match location {
            Location::Immediate => {
                self.immediate.unlink(idx, self.slab.as_slice_mut());
                self.size_immediate -= 1;
            }
            Location::Q => {
                let bin = self.slab.as_slice_mut()[idx.raw()].bin_index as usize;
                self.bins[bin].unlink(idx, self.slab.as_slice_mut());
                self.size_q -= 1;
            }
            Location::Done | Location::None => unreachable!("escalate_to_done called on {location:?}"),
        }
        self.link_done(idx);
    }

    /// Place a slot whose `abs_priority`/`urgent` fields are already set
    /// into its correct first-time home (bin, `immediate`, or `done`), and
    /// bump the total size. Used both by `insert` and by the "greater
    /// priority" branch of `enqueue`'s re-prioritization.
    fn fresh_enqueue(&mut self, idx: SlotIndex) {
        let (abs_priority, urgent) = {
            let s = &self.slab.as_slice_mut()[idx.raw()];
            (s.abs_priority, s.urgent)
        };
        if abs_priority > 0 {
            let rel = abs_priority.wrapping_add(self.pc);
            self.slab.as_slice_mut()[idx.raw()].rel_priority = rel;
            let bin = bits::bucket_index(rel, self.pc);
            self.link_bin(idx, bin);
        } else if urgent {
            self.slab.as_slice_mut()[idx.raw()].rel_priority = self.pc;
            self.link_done(idx);
        } else {
            self.slab.as_slice_mut()[idx.raw()].rel_priority = self.pc;
            self.link_immediate(idx);
        }
        self.size += 1;
    }

    /// Lazily drain `immediate` into `done`, per the adaptive heuristic in
    /// `counter_imed`. Amortizes to ~O(log N) moves per item while still
    /// guaranteeing `immediate` empties in bounded time under bursts.
    fn immediate_drain(&mut self) {
        if self.size_immediate == 0 {
            return;
        }
        if self.counter_imed == 0 {
            self.counter_imed = bits::high_bit_index(self.size_immediate as u32) as usize + 1;
            return;
        }
        self.move_one_immediate_to_done();
        if self.size_done < self.size_immediate {
            if self.size_immediate % 2 == 0 {
                self.move_one_immediate_to_done();
                self.counter_imed >>= 1;
            } else {
                self.counter_imed -= 1;
            }
        } else {
            self.counter_imed >>= 2;
        }
    }

    fn move_one_immediate_to_done(&mut self) {
        let idx = self
            .immediate
            .pop_head(self.slab.as_slice_mut())
            .expect("size_immediate > 0 guarantees a node");
        self.size_immediate -= 1;
        self.link_done(idx);
    }

    /// Pop a bounded number of items out of `processing`, routing each
    /// either to `immediate` (if its time has come) or back into a bucket.
    /// Only called when `processing` is known non-empty.
    fn processing_drain(&mut self) {
        let mut limit = bits::high_bit_index(self.size_q as u32) + 1;
        loop {
            let idx = self
                .processing
                .pop_head(self.slab.as_slice_mut())
                .expect("processing non-empty, checked by caller");
            let rel = self.slab.as_slice_mut()[idx.raw()].rel_priority;
            if rel == self.pc {
                self.size_q -= 1;
                self.link_immediate(idx);
            } else {
                let bin = bits::bucket_index(rel, self.pc);
                self.link_bin(idx, bin);
            }
            limit -= 1;
            if limit == 0 || self.processing.is_empty() {
                break;
            }
        }
    }

    /// Advance `pc` to the next value that fires at least one non-empty
    /// bucket, splicing every bucket that fires onto `processing`. Only
    /// called when `processing` is empty but `size_q > 0`.
    fn counter_advance(&mut self) {
        let mut fire_from = 0usize;
        while fire_from < BINS - 1 {
            let bit_clear = (self.pc >> fire_from) & 1 == 0;
            if !self.bins[fire_from].is_empty() && bit_clear {
                break;
            }
            fire_from += 1;
        }

        let (new_pc, transitions) = bits::advance_counter(self.pc, fire_from);
        if new_pc < self.pc {
            debug!("priority counter wrapped: {} -> {new_pc}", self.pc);
        }

        let slots = self.slab.as_slice_mut();
        self.processing.splice_append(&mut self.bins[fire_from], slots);
        for j in (fire_from + 1)..BINS {
            if (transitions >> j) & 1 != 0 {
                self.processing.splice_append(&mut self.bins[j], slots);
            }
        }
        self.pc = new_pc;
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}
