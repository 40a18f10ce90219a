//! A lazy, starvation-free, bounded-priority scheduling queue.
//!
//! [`Queue<T>`] accepts items tagged with a small integer priority in
//! `0..=127`, plus a distinguished [`URGENT`] tag, and dequeues them in an
//! order that approximates strict priority while guaranteeing that no item
//! starves regardless of arrival pattern — including adversarial workloads
//! of continuous high-priority arrivals. See the `queue` module for the
//! mechanism: a rotating priority counter, a bank of eight buckets, and a
//! pair of lazily-drained staging lists.
//!
//! This is a direct algorithmic port of `craig8196/sfpriorityq`'s
//! `priorityq.c`, restructured around an owned slab of item slots
//! (`Queue<T>` owns a `Vec<Slot<T>>`) and a generational [`ItemId`] handle
//! rather than the original's caller-owned, pointer-linked nodes — a safe
//! Rust API can't soundly hold live pointers into storage the caller still
//! owns. The scheduling algorithm itself — bucket placement, counter
//! advance, the immediate/done drains — is unchanged.
//!
//! ```
//! use exo_priorityq::{Queue, URGENT};
//!
//! let mut q = Queue::new();
//! q.insert("low", 3);
//! let high = q.insert("high", 12);
//! q.enqueue(high, URGENT);
//!
//! assert_eq!(q.dequeue().map(|(_, v)| v), Some("high"));
//! assert_eq!(q.dequeue().map(|(_, v)| v), Some("low"));
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod bits;
mod list;
mod queue;
mod slab;

pub use bits::{highest_set_bit, URGENT};
pub use queue::Queue;
pub use slab::ItemId;
