//! Property-based tests: both rings are driven by random operation sequences
//! and checked step by step against a `VecDeque` model.
//!
//! Invariants covered:
//! - FIFO order
//! - bounded count (`0 <= len <= capacity`)
//! - a produce fails exactly when the model is full, and hands the item back
//! - cleanup/purge releases exactly the unconsumed elements
//! - resize keeps the oldest elements that fit

use corering::{Config, DescRing, FlagRing, NoSpace, RingError};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Produce(u32),
    Consume,
    Peek,
    Batch(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u32>().prop_map(Op::Produce),
        3 => Just(Op::Consume),
        1 => Just(Op::Peek),
        1 => (0usize..8).prop_map(Op::Batch),
    ]
}

proptest! {
    /// The generic ring behaves like a bounded VecDeque.
    #[test]
    fn prop_core_ring_matches_model(
        capacity in 0usize..10,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let ring = FlagRing::<u32>::new(Config::new(capacity, false)).unwrap();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Produce(v) => match ring.produce(v) {
                    Ok(()) => {
                        prop_assert!(model.len() < capacity);
                        model.push_back(v);
                    }
                    Err(NoSpace(back)) => {
                        prop_assert_eq!(back, v);
                        prop_assert_eq!(model.len(), capacity);
                    }
                },
                Op::Consume => {
                    prop_assert_eq!(ring.consume().ok(), model.pop_front());
                }
                Op::Peek => {
                    prop_assert_eq!(ring.peek_with(|v| *v).ok(), model.front().copied());
                }
                Op::Batch(n) => {
                    let mut out = Vec::new();
                    let got = ring.consume_batched(&mut out, n);
                    let take = n.min(model.len());
                    let expected: Vec<u32> = model.drain(..take).collect();
                    prop_assert_eq!(got, expected.len());
                    prop_assert_eq!(out, expected);
                }
            }
            prop_assert_eq!(ring.is_empty(), model.is_empty());
            prop_assert_eq!(ring.is_full(), model.len() == capacity);
        }

        let mut rest = Vec::new();
        ring.cleanup(|v| rest.push(v));
        prop_assert_eq!(rest, Vec::from(model));
        prop_assert!(ring.is_empty());
    }

    /// The descriptor ring behaves like a bounded VecDeque, with the cached
    /// length of the front element visible through peek_length.
    #[test]
    fn prop_desc_ring_matches_model(
        bits in 0u8..4,
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let rx = DescRing::<Vec<u8>>::new(Config::with_bits(bits, false)).unwrap();
        let capacity = rx.capacity();
        let mut model: VecDeque<Vec<u8>> = VecDeque::new();

        for op in ops {
            match op {
                Op::Produce(v) => {
                    let buf = vec![0u8; (v % 256) as usize];
                    match rx.queue(buf.clone()) {
                        Ok(()) => model.push_back(buf),
                        Err(NoSpace(back)) => {
                            prop_assert_eq!(back, buf);
                            prop_assert_eq!(model.len(), capacity);
                        }
                    }
                }
                Op::Consume => {
                    prop_assert_eq!(rx.dequeue().ok(), model.pop_front());
                }
                Op::Peek => {
                    prop_assert_eq!(rx.peek_length(), model.front().map_or(0, Vec::len));
                }
                Op::Batch(_) => {
                    // purge is the descriptor ring's bulk operation
                    let mut released = Vec::new();
                    prop_assert_eq!(rx.purge_with_in(Default::default(), |p| released.push(p)), model.len());
                    prop_assert_eq!(released, Vec::from(std::mem::take(&mut model)));
                }
            }
            prop_assert_eq!(rx.queue_len(), model.len());
            prop_assert!(rx.queue_len() <= capacity);
            prop_assert_eq!(rx.is_empty(), model.is_empty());
        }
    }

    /// Resizing keeps the oldest elements that fit and destroys the rest.
    #[test]
    fn prop_resize_keeps_oldest(
        capacity in 1usize..12,
        fill in 0usize..12,
        new_size in 0usize..12,
    ) {
        let ring = FlagRing::<usize>::new(Config::new(capacity, false)).unwrap();
        let fill = fill.min(capacity);
        for i in 0..fill {
            ring.produce(i).unwrap();
        }

        let mut destroyed = Vec::new();
        ring.resize(new_size, |v| destroyed.push(v)).unwrap();
        prop_assert_eq!(ring.capacity(), new_size);

        let kept = fill.min(new_size);
        prop_assert_eq!(destroyed, (kept..fill).collect::<Vec<_>>());
        for i in 0..kept {
            prop_assert_eq!(ring.consume(), Ok(i));
        }
        prop_assert_eq!(ring.consume(), Err(RingError::Empty));
    }
}
