//! Property-based tests for the software ring buffer.
//! Any interleaving of writes and drains must behave like a bounded FIFO queue.

// Test files legitimately use arithmetic for verification; allow at file level.
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::indexing_slicing)]

use std::collections::VecDeque;

use io_slave::RingBuffer;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Write(Vec<u8>),
    Drain(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::collection::vec(any::<u8>(), 0..40).prop_map(Op::Write),
        (0usize..48).prop_map(Op::Drain),
    ]
}

proptest! {
    /// Accepted bytes come back in order, nothing beyond capacity is taken.
    #[test]
    fn ring_behaves_like_bounded_queue(
        cap in 1usize..64,
        ops in proptest::collection::vec(op(), 1..64),
    ) {
        let mut storage = vec![0u8; cap];
        let mut ring = RingBuffer::new(Some(storage.as_mut_slice()), cap);
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Write(data) => {
                    let taken = ring.write(&data);
                    prop_assert_eq!(taken, data.len().min(cap - model.len()));
                    model.extend(data.iter().take(taken));
                }
                Op::Drain(max) => {
                    let mut out = Vec::new();
                    let moved = ring.drain_into(max, |chunk| out.extend_from_slice(chunk));
                    let expected: Vec<u8> = model.drain(..max.min(model.len())).collect();
                    prop_assert_eq!(moved, expected.len());
                    prop_assert_eq!(out, expected);
                }
            }
            prop_assert_eq!(ring.len(), model.len());
            prop_assert!(ring.len() <= ring.capacity());
            prop_assert_eq!(ring.free(), cap - model.len());
        }
    }

    /// Capacity is clipped to the storage actually supplied.
    #[test]
    fn capacity_never_exceeds_storage(len in 0usize..64, requested in 0usize..128) {
        let mut storage = vec![0u8; len];
        let ring = RingBuffer::new(Some(storage.as_mut_slice()), requested);
        prop_assert_eq!(ring.capacity(), len.min(requested));
    }
}

#[test]
fn full_ring_rejects_the_next_byte() {
    let mut storage = [0u8; 8];
    let mut ring = RingBuffer::new(Some(storage.as_mut_slice()), 8);
    assert_eq!(ring.write(&[1; 8]), 8);
    assert_eq!(ring.write(&[2]), 0);
    assert_eq!(ring.len(), 8);
    assert_eq!(ring.free(), 0);
}

#[test]
fn wrapped_contents_come_out_in_two_chunks() {
    let mut storage = [0u8; 8];
    let mut ring = RingBuffer::new(Some(storage.as_mut_slice()), 8);
    assert_eq!(ring.write(&[0; 6]), 6);
    ring.consume(6);
    assert_eq!(ring.write(&[1, 2, 3, 4, 5]), 5);

    let (first, rest) = ring.chunks();
    assert_eq!(first, &[1, 2]);
    assert_eq!(rest, &[3, 4, 5]);

    let mut out = Vec::new();
    assert_eq!(ring.drain_into(16, |chunk| out.extend_from_slice(chunk)), 5);
    assert_eq!(out, [1, 2, 3, 4, 5]);
    assert!(ring.is_empty());
}

#[test]
fn ring_without_storage_accepts_nothing() {
    let mut ring = RingBuffer::new(None, 32);
    assert!(!ring.has_storage());
    assert_eq!(ring.write(&[1, 2, 3]), 0);
    assert_eq!(ring.capacity(), 0);
}
