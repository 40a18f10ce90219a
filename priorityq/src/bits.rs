//! Pure bit-manipulation helpers behind the bucket-placement and
//! counter-advance rules.
//!
//! These are a direct translation of `get_high_index32` and the bucket/advance
//! math in the original `priorityq.c`; the exact bit arithmetic is load-bearing
//! (see `queue.rs` module docs) and must not be replaced by a generic
//! comparator.

/// Number of priority buckets. Bucket 7 is reserved for the counter-wrap case.
pub const BINS: usize = 8;

/// The distinguished "urgent" priority. Not a valid `abs_priority` value;
/// callers pass it to `Queue::insert`/`Queue::enqueue` to request bypass of
/// priority scheduling entirely.
pub const URGENT: u8 = 128;

/// Mask covering the 7 low bits of an 8-bit counter/priority (`PQ_CEILING - 1`
/// in the original).
const LOW_MASK: u8 = URGENT - 1; // 0x7F

/// Index of the highest set bit of `n`, or `None` if `n == 0`.
///
/// Mirrors `get_high_index32` in the C original (`31 - __builtin_clz(n)`),
/// specialized to `u8` and made total via `Option` instead of "don't call
/// this with zero".
#[inline]
pub fn highest_set_bit(n: u8) -> Option<u32> {
    if n == 0 {
        None
    } else {
        Some(7 - n.leading_zeros())
    }
}

/// Choose the bucket index for an item with the given `rel_priority`,
/// given the queue's current priority counter `pc`.
///
/// Callers never place a `rel_priority == pc` item into a bucket — see
/// `queue.rs`'s processing drain, which routes those straight to
/// `immediate` instead. `rel_priority` itself may legitimately be zero (an
/// item's relative priority wraps modulo 256, so `abs_priority + pc` can
/// land on exactly 0 while still differing from `pc`); only the XOR/AND
/// operand fed to `highest_set_bit` is guaranteed nonzero, not `rel_priority`
/// in isolation.
#[inline]
pub fn bucket_index(rel_priority: u8, pc: u8) -> usize {
    let nrp = rel_priority.wrapping_sub(1);
    let index = if nrp >= pc {
        // Non-wrapping: the item's relative priority is ahead of the counter
        // in ordinary (non-overflowing) order. The bucket is the highest bit
        // at which `rel_priority` and `pc` first differ.
        highest_set_bit(rel_priority ^ pc)
    } else {
        // Wrapping: rel_priority would have overflowed past 255 when it was
        // computed as `abs_priority + pc`. The bucket is the highest bit of
        // `rel_priority` that still overlaps a set bit of `pc`.
        //
        // The original C computes an intermediate `apc = pc & (pc >> 1)`
        // folded down through further shifts; that value is never actually
        // read before being discarded (see DESIGN.md / SPEC_FULL.md §9's
        // "Open Question" note). It is intentionally not reproduced here.
        highest_set_bit(rel_priority & pc)
    };

    // Safety net, not a real possibility given the callers' invariants:
    // rel_priority != 0 and pc in 0..=255 guarantee at least one of the two
    // operands above is nonzero. Fall back to the wrap-around bucket.
    index.unwrap_or((BINS - 1) as u32) as usize
}

/// Compute the next priority counter value together with the raw
/// bit-transition mask used to decide which bucket indices above
/// `fire_from` also fire.
///
/// `fire_from` is the lowest bucket index whose corresponding bit of `pc` is
/// currently 0 and which is non-empty (or `BINS - 1` if no such bucket
/// exists); the caller (`queue.rs`) determines this by scanning `bins`,
/// since emptiness is a property of the queue's storage, not of `pc` alone.
/// Bucket `fire_from` itself always fires unconditionally.
///
/// Returns `(new_pc, transitions)`. For each `j` in `(fire_from+1)..BINS`,
/// bucket `j` also fires iff bit `j` of `transitions` is set. Bits at
/// position `<= fire_from` are meaningless and must be ignored by the
/// caller (this mirrors the original C, which only ever inspects bits above
/// the position it has already advanced past).
/// Index of the highest set bit of `n`, for the 32-bit region-size counts
/// (`size_q`, `size_immediate`) that bound the processing-drain and
/// immediate-drain work per call. Mirrors `get_high_index32` applied to
/// `uint32_t` in the original; counts of zero are never passed in practice
/// (every call site is guarded by a `> 0` check first), so this returns `0`
/// rather than panicking if it ever is.
#[inline]
pub fn high_bit_index(n: u32) -> u32 {
    if n == 0 {
        0
    } else {
        31 - n.leading_zeros()
    }
}

/// Split a caller-supplied priority (`0..=127`, or the `URGENT` sentinel
/// `128`) into the `(abs_priority, urgent)` pair stored on a slot. Mirrors
/// `priority_set` in the C original. Values above `URGENT` are out of the
/// documented domain; `debug_assert!` catches them in debug builds, while
/// release builds mask to the low 7 bits rather than panic.
#[inline]
pub fn classify_priority(priority: u8) -> (u8, bool) {
    debug_assert!(priority <= URGENT, "priority {priority} exceeds URGENT (128)");
    if priority == URGENT {
        (0, true)
    } else {
        (priority & LOW_MASK, false)
    }
}

#[inline]
pub fn advance_counter(pc: u8, fire_from: usize) -> (u8, u8) {
    debug_assert!(fire_from < BINS);

    let msb = 1u8.checked_shl(fire_from as u32).unwrap_or(0);
    let new_pc = (pc | msb.wrapping_sub(1)).wrapping_add(1);

    // Low 7 bits: a bucket fires on a 0 -> 1 transition only.
    // Bit 7 (the wrap bit): a bucket fires on a transition in either direction.
    let low_fired = LOW_MASK & (!pc & new_pc);
    let top_fired = !LOW_MASK & (pc ^ new_pc);
    let transitions = low_fired | top_fired;

    (new_pc, transitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::const_assert_eq!(BINS, 8);
    static_assertions::const_assert_eq!(URGENT, 128);

    #[test]
    fn highest_set_bit_basic() {
        assert_eq!(highest_set_bit(0), None);
        assert_eq!(highest_set_bit(1), Some(0));
        assert_eq!(highest_set_bit(2), Some(1));
        assert_eq!(highest_set_bit(0x80), Some(7));
        assert_eq!(highest_set_bit(0x7F), Some(6));
    }

    #[test]
    fn bucket_index_non_wrapping() {
        // pc = 0, rel_priority = 1 => nrp = 0 >= pc=0, bucket = highest bit of (1^0) = 0
        assert_eq!(bucket_index(1, 0), 0);
    }

    #[test]
    fn bucket_index_handles_rel_priority_zero() {
        // abs_priority=56, pc=200 => rel_priority = (56+200) mod 256 = 0, and
        // 0 != pc(200), so this item legitimately belongs in a bucket.
        let idx = bucket_index(0, 200);
        assert!(idx < BINS);
    }

    #[test]
    fn bucket_index_exhaustive_is_in_range() {
        for pc in 0u16..256 {
            for rel in 0u16..256 {
                let idx = bucket_index(rel as u8, pc as u8);
                assert!(idx < BINS);
            }
        }
    }

    #[test]
    fn high_bit_index_basic() {
        assert_eq!(high_bit_index(0), 0);
        assert_eq!(high_bit_index(1), 0);
        assert_eq!(high_bit_index(2), 1);
        assert_eq!(high_bit_index(255), 7);
        assert_eq!(high_bit_index(256), 8);
    }

    #[test]
    fn classify_priority_urgent_and_plain() {
        assert_eq!(classify_priority(URGENT), (0, true));
        assert_eq!(classify_priority(0), (0, false));
        assert_eq!(classify_priority(127), (127, false));
    }
}
