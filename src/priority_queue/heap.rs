// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Array-backed binary max-heap over priority slots.
//!
//! The root lives at index zero. The children of `i` live at `2i + 1` and
//! `2i + 2`; the parent of `i` lives at `(i - 1) / 2`. Slots at or beyond
//! `len` hold nothing that can be read.
//!
//! The heap never calls user code. Priorities are cached in the slot when
//! an element is pushed, and elements only move by bitwise copies. That
//! keeps the heap consistent no matter what an element's trait
//! implementations do.

use core::mem::MaybeUninit;

use super::Priority;

/// Storage for one element of a [`PriorityQueue`](super::PriorityQueue).
///
/// You allocate these for the queue, typically as an array. The number of
/// slots is the queue's capacity. If you need a static allocation, see
/// [`StaticPrioritySlots`](super::StaticPrioritySlots).
///
/// ```
/// use triage::priority_queue::{Priority, PrioritySlot};
///
/// let mut slots: [PrioritySlot<Priority>; 10] = [const { PrioritySlot::new() }; 10];
/// # let _ = &mut slots;
/// ```
pub struct PrioritySlot<T> {
    priority: Priority,
    elem: MaybeUninit<T>,
}

impl<T> PrioritySlot<T> {
    /// Allocate an empty slot.
    pub const fn new() -> Self {
        Self {
            priority: Priority::Low,
            elem: MaybeUninit::uninit(),
        }
    }
}

impl<T> Default for PrioritySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(super) struct Heap<T> {
    slots: *mut PrioritySlot<T>,
    capacity: usize,
    len: usize,
}

impl<T> Heap<T> {
    /// A heap with no storage. Every push fails.
    pub(super) const fn empty() -> Self {
        Self {
            slots: core::ptr::null_mut(),
            capacity: 0,
            len: 0,
        }
    }

    /// Manage `capacity` slots starting at `slots`.
    ///
    /// # Safety
    ///
    /// The slots must be valid and exclusively borrowed by this heap
    /// for as long as the heap is used.
    pub(super) const unsafe fn from_raw_parts(slots: *mut PrioritySlot<T>, capacity: usize) -> Self {
        Self {
            slots,
            capacity,
            len: 0,
        }
    }

    #[cfg(test)]
    const fn len(&self) -> usize {
        self.len
    }

    pub(super) const fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Insert `elem`, then sift it toward the root.
    ///
    /// If there's no room, you get `elem` back and nothing changes.
    pub(super) fn push(&mut self, priority: Priority, elem: T) -> Result<(), T> {
        if self.is_full() {
            return Err(elem);
        }

        // Safety: len < capacity, so the slot is in bounds. The slot is
        // logically empty, so there's nothing to drop.
        unsafe {
            self.slots.add(self.len).write(PrioritySlot {
                priority,
                elem: MaybeUninit::new(elem),
            });
        }
        self.len += 1;
        self.sift_up(self.len - 1);

        debug_assert!(self.is_heap());
        Ok(())
    }

    /// Remove the root, the element with the greatest priority.
    pub(super) fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let last = self.len - 1;
        // Safety: the root is in bounds and initialized. Once we read it
        // out, we either shrink the heap to nothing, or move the last
        // element over the root. Either way, no slot below len is read
        // twice.
        let root = unsafe {
            let root = (*self.slots).elem.assume_init_read();
            self.len = last;
            if last > 0 {
                core::ptr::copy_nonoverlapping(self.slots.add(last), self.slots, 1);
            }
            root
        };
        self.sift_down(0);

        debug_assert!(self.is_heap());
        Some(root)
    }

    /// Drop every element. The heap is empty afterwards.
    ///
    /// If an element's drop panics, the remaining elements leak.
    pub(super) fn clear(&mut self) {
        let len = core::mem::replace(&mut self.len, 0);
        for idx in 0..len {
            // Safety: everything below the old len is initialized. We
            // already forgot about them by zeroing len, so each is
            // dropped at most once.
            unsafe { (*self.slots.add(idx)).elem.assume_init_drop() };
        }
    }

    /// Returns `true` if every parent's priority is at least its children's.
    pub(super) fn is_heap(&self) -> bool {
        (1..self.len).all(|idx| self.priority(parent(idx)) >= self.priority(idx))
    }

    /// The priorities held in the heap, in storage order.
    #[cfg(test)]
    fn priorities(&self) -> impl Iterator<Item = Priority> + '_ {
        (0..self.len).map(|idx| self.priority(idx))
    }

    fn priority(&self, idx: usize) -> Priority {
        debug_assert!(idx < self.len);
        // Safety: callers only ask about occupied slots.
        unsafe { (*self.slots.add(idx)).priority }
    }

    fn swap(&mut self, a: usize, b: usize) {
        debug_assert!(a < self.len && b < self.len);
        // Safety: both slots are in bounds. ptr::swap handles a == b.
        unsafe { core::ptr::swap(self.slots.add(a), self.slots.add(b)) };
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let up = parent(idx);
            if self.priority(idx) <= self.priority(up) {
                break;
            }
            self.swap(idx, up);
            idx = up;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;

            let mut greatest = idx;
            if left < self.len && self.priority(left) > self.priority(greatest) {
                greatest = left;
            }
            if right < self.len && self.priority(right) > self.priority(greatest) {
                greatest = right;
            }

            if greatest == idx {
                break;
            }
            self.swap(idx, greatest);
            idx = greatest;
        }
    }
}

const fn parent(idx: usize) -> usize {
    (idx - 1) / 2
}

#[cfg(test)]
mod tests {
    use super::{Heap, Priority, PrioritySlot};
    use proptest::prelude::*;
    use std::vec::Vec;

    use Priority::{High, Low, Medium};

    fn heap_over<T>(slots: &mut [PrioritySlot<T>]) -> Heap<T> {
        // Safety: the slots outlive each test's heap.
        unsafe { Heap::from_raw_parts(slots.as_mut_ptr(), slots.len()) }
    }

    #[test]
    fn highest_priority_first() {
        let mut slots = [const { PrioritySlot::new() }; 10];
        let mut heap = heap_over(&mut slots);

        for (idx, priority) in [Low, High, Medium].into_iter().enumerate() {
            heap.push(priority, (priority, idx)).unwrap();
        }

        assert_eq!(heap.pop(), Some((High, 1)));
        assert_eq!(heap.pop(), Some((Medium, 2)));
        assert_eq!(heap.pop(), Some((Low, 0)));
        assert_eq!(heap.pop(), None);
    }

    fn priority() -> impl Strategy<Value = Priority> {
        prop::sample::select(Priority::ALL.to_vec())
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Push(Priority),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![3 => priority().prop_map(Op::Push), 2 => Just(Op::Pop)]
    }

    proptest! {
        #[test]
        fn heap_property_after_every_push(priorities in prop::collection::vec(priority(), 0..=16)) {
            let mut slots = [const { PrioritySlot::new() }; 16];
            let mut heap = heap_over(&mut slots);

            for priority in priorities.iter().copied() {
                prop_assert!(heap.push(priority, ()).is_ok());
                prop_assert!(heap.is_heap(), "{:?}", heap.priorities().collect::<Vec<_>>());
            }
            prop_assert_eq!(heap.len(), priorities.len());
        }

        #[test]
        fn pop_is_never_below_what_remains(
            capacity in 1..12usize,
            ops in prop::collection::vec(op(), 0..200),
        ) {
            let mut slots: Vec<PrioritySlot<Priority>> =
                (0..capacity).map(|_| PrioritySlot::new()).collect();
            let mut heap = heap_over(&mut slots);
            let mut model: Vec<Priority> = Vec::new();

            for op in ops {
                match op {
                    Op::Push(priority) if model.len() < capacity => {
                        prop_assert_eq!(heap.push(priority, priority), Ok(()));
                        model.push(priority);
                    }
                    Op::Push(priority) => {
                        prop_assert_eq!(heap.push(priority, priority), Err(priority));
                    }
                    Op::Pop => {
                        let expected = model.iter().copied().max();
                        let popped = heap.pop();
                        prop_assert_eq!(popped, expected);
                        if let Some(popped) = popped {
                            let at = model.iter().position(|&p| p == popped).unwrap();
                            model.swap_remove(at);
                            prop_assert!(heap.priorities().all(|remaining| remaining <= popped));
                        }
                    }
                }
                prop_assert!(heap.is_heap());
                prop_assert_eq!(heap.len(), model.len());
            }
        }
    }

    #[test]
    fn full_heap_rejects_without_change() {
        let mut slots = [const { PrioritySlot::new() }; 10];
        let mut heap = heap_over(&mut slots);

        for idx in 0..10 {
            heap.push(Low, idx).unwrap();
        }
        let before: Vec<_> = heap.priorities().collect();

        assert_eq!(heap.push(High, 99), Err(99));
        assert_eq!(heap.len(), 10);
        assert_eq!(heap.priorities().collect::<Vec<_>>(), before);

        assert!(heap.pop().is_some());
        assert!(heap.push(Low, 10).is_ok());
        assert!(heap.is_full());
    }

    #[test]
    fn ties_come_out_in_any_order() {
        let mut slots = [const { PrioritySlot::new() }; 8];
        let mut heap = heap_over(&mut slots);

        for idx in 0..4 {
            heap.push(Medium, idx).unwrap();
        }
        heap.push(High, 100).unwrap();
        for idx in 4..7 {
            heap.push(Medium, idx).unwrap();
        }

        assert_eq!(heap.pop(), Some(100));

        // Only membership is promised among equals.
        let mut rest: Vec<_> = core::iter::from_fn(|| heap.pop()).collect();
        rest.sort_unstable();
        assert_eq!(rest, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn clear_drops_everything() {
        use std::rc::Rc;

        let tracker = Rc::new(());
        let mut slots = [const { PrioritySlot::new() }; 5];
        let mut heap = heap_over(&mut slots);

        for priority in [Low, Medium, High, Medium] {
            heap.push(priority, Rc::clone(&tracker)).unwrap();
        }
        let popped = heap.pop();
        assert_eq!(Rc::strong_count(&tracker), 5);

        heap.clear();
        assert_eq!(heap.len(), 0);
        assert_eq!(Rc::strong_count(&tracker), 2);
        drop(popped);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn empty_heap_has_no_room() {
        let mut heap: Heap<u8> = Heap::empty();
        assert!(heap.is_full());
        assert_eq!(heap.push(High, 7), Err(7));
        assert_eq!(heap.pop(), None);
    }
}
