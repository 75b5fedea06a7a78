// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Interrupt-free critical sections.
//!
//! The posture is at least as conservative as the one ThreadX uses for its
//! own critical sections. Interrupts are always disabled during the
//! [`kernel_enter`](crate::kernel_enter) initialization context.

use core::cell::Cell;

use libthreadx_sys::UINT;

/// A cell that can be manipulated within an interrupt-free critical section.
///
/// Since `T: Copy`, this cell has no drop behavior, so no foreign code runs
/// inside the critical section.
#[repr(transparent)]
pub(crate) struct InterruptFreeCell<T: Copy>(Cell<T>);

// Safety: as long as we can send the data across execution contexts,
// the interrupt-free critical section will protect access to the
// data.
unsafe impl<T: Copy + Send> Sync for InterruptFreeCell<T> {}

impl<T: Copy> InterruptFreeCell<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(Cell::new(value))
    }

    /// Replace the contents of the cell, returning the old value.
    pub(crate) fn replace(&self, val: T) -> T {
        with_disabled(|| self.0.replace(val))
    }
}

unsafe extern "C" {
    fn _tx_thread_interrupt_disable() -> UINT;
    fn _tx_thread_interrupt_restore(prior: UINT);
}

/// Restores the prior interrupt posture on drop, including during an unwind.
struct PriorPosture(UINT);

impl PriorPosture {
    fn disable() -> Self {
        // Safety: This ThreadX implementation detail maximally disables
        // interrupts for the port. It's reentrant, and it's valid in every
        // execution context.
        Self(unsafe { _tx_thread_interrupt_disable() })
    }
}

impl Drop for PriorPosture {
    fn drop(&mut self) {
        // Safety: Restores the posture returned by the matching disable.
        unsafe { _tx_thread_interrupt_restore(self.0) }
    }
}

/// Execute `f` while interrupts are disabled.
///
/// The posture belongs to the calling thread. If `f` suspends the thread,
/// interrupts may be enabled while it's suspended.
pub(crate) fn with_disabled<F: FnOnce() -> R, R>(f: F) -> R {
    let _posture = PriorPosture::disable();
    f()
}
