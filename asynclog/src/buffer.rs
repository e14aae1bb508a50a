// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{collections::VecDeque, mem};

/// Bounded FIFO of buffered records.
///
/// Appends at the tail, drains from the head. All operations are O(1), including [`AsyncLogBuffer::pop_all`],
/// which is what makes draining cheap enough to do while holding the writer lock. The buffer doesn't synchronize
/// anything itself; the writer keeps it behind its monitor lock.
#[derive(Debug)]
pub struct AsyncLogBuffer<T> {
    queue: VecDeque<T>,
    capacity: usize,
}

impl<T> AsyncLogBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must not be zero");
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Append `item` at the tail.
    ///
    /// Callers check [`AsyncLogBuffer::is_full`] first and count a drop instead of pushing into a full buffer.
    pub fn push_back(&mut self, item: T) {
        debug_assert!(!self.is_full(), "pushed into a full buffer");
        self.queue.push_back(item);
    }

    /// Remove and return the head.
    pub fn pop_front(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    /// Move every buffered item into `out`, leaving the buffer empty.
    ///
    /// When `out` is empty this swaps the two sequences, so the buffer takes over `out`'s allocation and no item is
    /// copied. Passing the same, drained, `out` every time recycles two allocations between the buffer and the
    /// consumer.
    pub fn pop_all(&mut self, out: &mut VecDeque<T>) {
        if out.is_empty() {
            mem::swap(&mut self.queue, out);
        } else {
            out.append(&mut self.queue);
        }
    }

    /// Number of buffered items.
    pub fn size(&self) -> usize {
        self.queue.len()
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The oldest buffered item.
    pub fn front(&self) -> Option<&T> {
        self.queue.front()
    }

    /// The newest buffered item.
    pub fn back(&self) -> Option<&T> {
        self.queue.back()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns true if another push would exceed the capacity.
    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }

    /// Returns true once the buffer is at least 3/4 full, the point at which the background writer is woken early.
    pub fn reached_wake_threshold(&self) -> bool {
        self.queue.len().saturating_mul(4) >= self.capacity.saturating_mul(3)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn fifo_with_peeks() {
        let mut buffer = AsyncLogBuffer::new(4);
        assert_eq!(buffer.front(), None);
        assert_eq!(buffer.back(), None);
        assert_eq!(buffer.pop_front(), None);

        buffer.push_back("a");
        buffer.push_back("b");
        buffer.push_back("c");
        assert_eq!(buffer.size(), 3);
        assert_eq!(buffer.front(), Some(&"a"));
        assert_eq!(buffer.back(), Some(&"c"));

        assert_eq!(buffer.pop_front(), Some("a"));
        assert_eq!(buffer.size(), 2);
        assert_eq!(buffer.front(), Some(&"b"));
        assert_eq!(buffer.pop_front(), Some("b"));
        assert_eq!(buffer.pop_front(), Some("c"));
        assert_eq!(buffer.back(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn pop_all_moves_everything() {
        let mut buffer = AsyncLogBuffer::new(8);
        for i in 0..5 {
            buffer.push_back(i);
        }
        let mut out = VecDeque::new();
        buffer.pop_all(&mut out);
        assert_eq!(buffer.size(), 0);
        assert_eq!(buffer.front(), None);
        assert_eq!(buffer.back(), None);
        assert_eq!(out, [0, 1, 2, 3, 4]);

        // the buffer is usable again and the next drain appends behind undrained output
        buffer.push_back(5);
        buffer.pop_all(&mut out);
        assert_eq!(out, [0, 1, 2, 3, 4, 5]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn pop_all_recycles_allocation() {
        let mut buffer = AsyncLogBuffer::new(64);
        let mut out = VecDeque::with_capacity(64);
        let allocated = out.capacity();
        buffer.push_back(1);
        buffer.pop_all(&mut out);
        out.clear();
        // the buffer now owns the allocation that was handed in
        buffer.push_back(2);
        buffer.pop_all(&mut out);
        assert_eq!(out, [2]);
        assert!(out.capacity() >= allocated);
    }

    #[test]
    fn full_at_capacity() {
        let mut buffer = AsyncLogBuffer::new(2);
        buffer.push_back(());
        assert!(!buffer.is_full());
        buffer.push_back(());
        assert!(buffer.is_full());
        buffer.pop_front();
        assert!(!buffer.is_full());
    }

    #[rstest]
    #[case(4, 2, false)]
    #[case(4, 3, true)]
    #[case(4, 4, true)]
    #[case(2, 1, false)]
    #[case(2, 2, true)]
    #[case(1, 0, false)]
    #[case(1, 1, true)]
    #[case(100, 74, false)]
    #[case(100, 75, true)]
    fn wake_threshold(#[case] capacity: usize, #[case] size: usize, #[case] expected: bool) {
        let mut buffer = AsyncLogBuffer::new(capacity);
        for _ in 0..size {
            buffer.push_back(());
        }
        assert_eq!(buffer.reached_wake_threshold(), expected);
    }

    #[test]
    #[should_panic(expected = "capacity must not be zero")]
    fn zero_capacity_is_rejected() {
        AsyncLogBuffer::<()>::new(0);
    }
}
