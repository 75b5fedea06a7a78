// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Passing a pointer through a ThreadX callback argument.
//!
//! A thread entrypoint receives one `ULONG`. With 32 bit pointers, the
//! pointer is the argument. Host ports like Linux have 64 bit pointers, so
//! [`make`] stores the real callback and pointer in a table, and passes the
//! table index instead. Table entries are never removed.

use libthreadx_sys::ULONG;

/// A callback paired with its input.
pub(crate) struct CallbackDispatch<T> {
    callback: unsafe extern "C" fn(_: T),
    input: T,
}

impl CallbackDispatch<ULONG> {
    pub(crate) fn callback(&self) -> unsafe extern "C" fn(_: ULONG) {
        self.callback
    }
    pub(crate) fn input(&self) -> ULONG {
        self.input
    }
}

impl<T> CallbackDispatch<*mut T> {
    /// A callback that ignores its (null) input.
    pub(crate) const fn no_op() -> Self {
        Self {
            callback: {
                extern "C" fn no_op<T>(_: *mut T) {}
                no_op::<T>
            },
            input: core::ptr::null_mut(),
        }
    }

    /// # Safety
    ///
    /// `input` must be valid every time the callback runs.
    pub(crate) unsafe fn direct(callback: unsafe extern "C" fn(_: *mut T), input: *mut T) -> Self {
        Self { callback, input }
    }
}

impl<T> CallbackDispatch<T> {
    pub(crate) fn invoke(self) {
        // Safety: whoever built the dispatch vouched for the input.
        unsafe { (self.callback)(self.input) };
    }
}

/// Make a dispatch that ThreadX can carry, whatever the pointer width.
///
/// # Safety
///
/// `input` must be valid every time the callback runs, and it must be safe
/// to use from another thread.
///
/// With 32 bit pointers, the calling convention must pass addresses and
/// integers the same way.
pub(crate) unsafe fn make(
    callback: unsafe extern "C" fn(*mut ()),
    input: *mut (),
) -> CallbackDispatch<ULONG> {
    #[cfg(target_pointer_width = "32")]
    {
        const _: () = assert!(size_of::<ULONG>() == size_of::<*mut ()>());
        const _: () = assert!(align_of::<ULONG>() == align_of::<*mut ()>());
        CallbackDispatch {
            // Safety: the caller vouches for the calling convention.
            callback: unsafe {
                core::mem::transmute::<unsafe extern "C" fn(*mut ()), unsafe extern "C" fn(ULONG)>(
                    callback,
                )
            },
            input: input as ULONG,
        }
    }

    // A dispatch outlives the thread that used it. Once a thread is
    // deleted, nothing looks up its entry again.
    #[cfg(all(target_pointer_width = "64", any(unix, windows)))]
    {
        extern crate std;
        use std::sync::RwLock;
        use std::vec::Vec;

        struct HostDispatch(RwLock<Vec<CallbackDispatch<*mut ()>>>);
        // Safety: the table is behind a lock. The caller vouches that each
        // input may cross threads.
        unsafe impl Sync for HostDispatch {}

        static LOOKUP_TABLE: HostDispatch = HostDispatch(RwLock::new(Vec::new()));

        // The table only grows, so each index is unique.
        let index = {
            let mut table = LOOKUP_TABLE
                .0
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            // Safety: the caller vouches for the input.
            table.push(unsafe { CallbackDispatch::direct(callback, input) });
            table.len() - 1
        };

        extern "C" fn through_table_with_index(index: ULONG) {
            {
                let table = LOOKUP_TABLE
                    .0
                    .read()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                let dispatch = &table[index as usize];
                CallbackDispatch {
                    callback: dispatch.callback,
                    input: dispatch.input,
                }
            }
            .invoke();
        }

        CallbackDispatch {
            callback: through_table_with_index,
            input: match index.try_into() {
                Ok(index) => index,
                Err(_) => abort!("Too many threads for the callback table"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::undocumented_unsafe_blocks)]

    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::vec::Vec;

    unsafe extern "C" fn bump(counter: *mut ()) {
        let counter: &AtomicUsize = unsafe { &*(counter.cast()) };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn dispatch_reaches_the_input() {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let input = core::ptr::from_ref(&COUNTER) as *mut ();
        let dispatch = unsafe { super::make(bump, input) };

        dispatch.invoke();
        assert_eq!(COUNTER.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn every_dispatch_keeps_its_own_input() {
        static COUNTERS: [AtomicUsize; 8] = [const { AtomicUsize::new(0) }; 8];

        let mut dispatches = Vec::new();
        for (idx, counter) in COUNTERS.iter().enumerate() {
            let input = core::ptr::from_ref(counter) as *mut ();
            for _ in 0..=idx {
                dispatches.push(unsafe { super::make(bump, input) });
            }
        }

        for dispatch in dispatches {
            dispatch.invoke();
        }

        for (idx, counter) in COUNTERS.iter().enumerate() {
            assert_eq!(counter.load(Ordering::Relaxed), idx + 1);
        }
    }
}
