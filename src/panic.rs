// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Keeping panics out of ThreadX.
//!
//! Thread entrypoints and the initialization callback are called from C.
//! An unwind must stop before it reaches the kernel. Each entry from the
//! kernel picks what happens instead: the thread ends, or the process does.

use core::panic::UnwindSafe;

#[cfg(not(any(panic = "abort", panic = "unwind")))]
compile_error!("Unknown panic option!");

#[cfg(panic = "unwind")]
extern crate std;

/// Stop the process without unwinding.
///
/// With `panic = "abort"`, this is an ordinary panic.
macro_rules! abort {
    ($($arg:tt)*) => {{
        #[cfg(panic = "unwind")]
        {
            extern crate std;
            std::eprintln!($($arg)*);
            std::eprintln!("Aborting the Triage program");
            std::process::abort();
        }
        #[cfg(panic = "abort")]
        {
            panic!($($arg)*);
        }
    }};
}

/// [`abort!`] unless `cond` holds. The message defaults to the condition.
macro_rules! aborting_assert {
    ($cond:expr $(,)?) => {
        aborting_assert!($cond, ::core::stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            abort!($($arg)+);
        }
    };
}

/// Run `work`. If it unwinds, run `recover` on the same stack.
///
/// Without unwinding, there's nothing to recover from.
fn contain<W, R>(work: W, recover: R)
where
    W: FnOnce() + UnwindSafe,
    R: FnOnce(),
{
    #[cfg(panic = "unwind")]
    {
        if std::panic::catch_unwind(work).is_err() {
            recover();
        }
    }

    #[cfg(panic = "abort")]
    {
        work();
        drop(recover);
    }
}

/// The initialization callback can't be resumed. A panic there ends the
/// process.
pub(crate) fn catch_unwind_init<W: FnOnce() + UnwindSafe>(work: W) {
    abort_on_panic(work);
}

/// A panicking thread terminates itself.
///
/// The kernel releases any queue lock the thread held when it terminates.
/// Other threads keep running.
pub(crate) fn catch_unwind_thread<W: FnOnce() + UnwindSafe>(work: W) {
    contain(work, || crate::thread::terminate());
}

/// For work that can't be left half-done.
pub(crate) fn abort_on_panic<W: FnOnce() + UnwindSafe>(work: W) {
    contain(work, || abort!("Panic while the kernel couldn't recover"));
}
