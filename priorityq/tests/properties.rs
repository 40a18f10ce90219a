//! Randomized and brute-force properties that don't reduce to a single
//! worked example: size-accounting invariants held after every operation,
//! `is_active` tracking, starvation-freedom under an adversarial urgent
//! flood, and an exhaustive sweep over every (counter, priority) pair the
//! bucket-placement arithmetic can see.

use exo_priorityq::{ItemId, Queue, URGENT};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
enum Op {
    Insert(u8),
    Dequeue,
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..=URGENT).prop_map(Op::Insert),
        Just(Op::Dequeue),
        (0usize..64).prop_map(Op::Remove),
    ]
}

proptest! {
    // P1 + P2: after every operation in a random sequence, the four region
    // sizes reconcile with the aggregate size, and `is_active` agrees with
    // a plain model of "inserted, not yet dequeued or removed".
    #[test]
    fn p1_p2_size_and_active_invariants_hold_after_every_op(
        ops in prop::collection::vec(op_strategy(), 0..300)
    ) {
        let mut q: Queue<u32> = Queue::new();
        let mut ids: Vec<ItemId> = Vec::new();
        let mut active: HashMap<ItemId, bool> = HashMap::new();
        let mut next_payload = 0u32;

        for op in ops {
            match op {
                Op::Insert(priority) => {
                    let id = q.insert(next_payload, priority);
                    next_payload += 1;
                    ids.push(id);
                    active.insert(id, true);
                }
                Op::Dequeue => {
                    if let Some((id, _)) = q.dequeue() {
                        active.insert(id, false);
                    }
                }
                Op::Remove(pick) => {
                    if !ids.is_empty() {
                        let id = ids[pick % ids.len()];
                        if q.remove(id).is_some() {
                            active.insert(id, false);
                        }
                    }
                }
            }

            prop_assert_eq!(q.len(), q.done_len() + q.immediate_len() + q.q_len());
            let bins_total: usize = (0..8).map(|b| q.bin_len(b)).sum();
            prop_assert_eq!(q.q_len(), bins_total);

            for (&id, &expected) in &active {
                prop_assert_eq!(q.is_active(id), expected);
            }
        }
    }
}

// P5: an item enqueued at an arbitrary priority must be delivered within
// 128 dequeues of an adversary that enqueues two urgents for every one
// dequeue it performs. Ported from prove.c's "should not starve an
// immediate/other with urgents" (and the all-priority-levels loop around
// it).
#[test]
fn p5_starvation_freedom_under_adversarial_urgent_flood() {
    for priority in 0..=127u8 {
        let mut q: Queue<i64> = Queue::new();
        q.insert(-1, URGENT);
        q.insert(-2, URGENT);
        let victim = q.insert(-3, priority);

        let mut found = false;
        let mut next = 0i64;
        for _ in 0..128 {
            q.insert(next, URGENT);
            next += 1;
            q.insert(next, URGENT);
            next += 1;
            if let Some((id, _)) = q.dequeue() {
                if id == victim {
                    found = true;
                    break;
                }
            }
        }
        assert!(found, "priority {priority} item starved past 128 adversarial steps");
    }
}

// Same shape, but the flood is made of priority-0 ("immediate") arrivals
// rather than urgents. Ported from prove.c's "should not starve an
// immediate/other with immediates".
#[test]
fn p5_starvation_freedom_under_adversarial_immediate_flood() {
    for priority in 0..=127u8 {
        let mut q: Queue<i64> = Queue::new();
        q.insert(-1, 0);
        q.insert(-2, 0);
        let victim = q.insert(-3, priority);

        let mut found = false;
        let mut next = 0i64;
        for _ in 0..128 {
            q.insert(next, 0);
            next += 1;
            q.insert(next, 0);
            next += 1;
            if let Some((id, _)) = q.dequeue() {
                if id == victim {
                    found = true;
                    break;
                }
            }
        }
        assert!(found, "priority {priority} item starved past 128 adversarial immediate steps");
    }
}

// Same shape again, but this time the adversary doesn't just flood the
// queue with urgents — it also re-enqueues the victim itself at its own
// unchanged priority every round. Since re-enqueuing at an equal priority
// is a no-op on queue position (only a strictly greater priority re-places
// an item), this constant reinsertion can't reset the victim's progress
// toward `done` and it still escapes within the bound. Ported from
// prove.c's "should not starve during constant re-insertions".
#[test]
fn p5_starvation_freedom_under_adversarial_reinsertion() {
    let mut q: Queue<i64> = Queue::new();
    q.insert(-1, URGENT);
    q.insert(-2, URGENT);
    let victim = q.insert(-3, 64);

    let mut found = false;
    let mut next = 0i64;
    for _ in 0..128 {
        q.insert(next, URGENT);
        next += 1;
        q.insert(next, URGENT);
        next += 1;
        q.enqueue(victim, 64);
        if let Some((id, _)) = q.dequeue() {
            if id == victim {
                found = true;
                break;
            }
        }
    }
    assert!(found, "victim starved past 128 adversarial re-insertion steps");
}

// P8: brute-force every (priority_counter, priority) combination the
// bucket-placement arithmetic can see. Primes the counter to each of its
// 256 possible values by cycling a priority-1 item that many times, then
// checks every priority level dequeues correctly from that counter state.
// Ported directly from prove.c's "should brute force every possible path
// of a priority".
#[test]
fn p8_brute_force_counter_and_priority_cross_product() {
    for counter in 0u16..256 {
        for priority in 0u8..128 {
            let mut q: Queue<i32> = Queue::new();
            for _ in 0..counter {
                let id = q.insert(0, 1);
                let dequeued = q.dequeue();
                assert_eq!(dequeued.map(|(got, _)| got), Some(id));
            }
            assert_eq!(q.counter(), counter as u8);
            assert_eq!(q.dequeue(), None);

            let id = q.insert(99, priority);
            assert_eq!(q.dequeue(), Some((id, 99)));
            assert_eq!(q.dequeue(), None);
        }
    }
}
