// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Threads that produce and consume.
//!
//! A [`Thread`] runs its entrypoint once, at the priority given in
//! [`ThreadOptions`]. Threads are what block on a
//! [`PriorityQueue`](crate::priority_queue::PriorityQueue), so every queue
//! user lives in one.
//!
//! The entrypoint is any `FnOnce() + Send`. It's moved onto the front of
//! the stack you provide, so size your stacks with the captures in mind.
//! [`StaticStack`] reserves a stack in global memory.
//!
//! # Examples
//!
//! A consumer with a globally-allocated context and stack.
//!
//! ```no_run
//! use triage::thread::{ThreadContext, Thread, StaticStack};
//! use core::pin::Pin;
//!
//! static CONSUMER: ThreadContext = Thread::context();
//! static STACK: StaticStack<2048> = StaticStack::new();
//!
//! fn consume() { /* ... */ }
//!
//! # (|| -> Result<(), triage::thread::CreateError> {
//! # let stack = (|| -> Option<&'static mut [u8]> {
//! let stack = STACK.take()?;
//! # Some(stack) })().unwrap();
//! Thread::create(
//!     Pin::static_ref(&CONSUMER),
//!     stack,
//!     &Default::default(),
//!     consume,
//! )?;
//! # Ok(()) })().unwrap();
//! ```
//!
//! A thread created through [`AppDefine`] may borrow anything that was
//! live before entering the kernel.
//!
//! ```
//! use triage::thread::{StaticStack, Thread};
//! use core::pin::pin;
//!
//! static STACK: StaticStack<2048> = StaticStack::new();
//!
//! fn main() {
//!     let mut seen = Vec::new();
//!     let thread = pin!(Thread::context());
//!
//!     triage::kernel_enter(|app_define| {
//!         app_define.create_thread(
//!             thread.into_ref(),
//!             STACK.take().unwrap(),
//!             &Default::default(),
//!             || {
//!                 seen.push(5u32);
//! #               std::process::exit(0);
//!             },
//!         ).unwrap();
//!     });
//! }
//! ```

pub use stack::{Stack, StaticStack};

use crate::{ControlBlock, marker::InvariantLifetime};

use super::AppDefine;
use crate::tx_sys::TX_THREAD;
use core::{ffi::CStr, num::NonZero, pin::Pin};

error_enum! {
    /// An error when creating a thread.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum CreateError {
        /// The thread is already created.
        AlreadyCreated = crate::tx_sys::TX_THREAD_ERROR,

        // TX_PTR_ERROR can't happen. The entrypoint is always our
        // trampoline, and the stack is a reference we exclusively borrow.

        /// The stack can't hold the entrypoint plus the kernel's minimum.
        StackTooSmall = crate::tx_sys::TX_SIZE_ERROR,

        // TX_PRIORITY_ERROR and TX_START_ERROR are ruled out by types.

        /// The preemption threshold is less important than the priority.
        InvalidPreemptionThreshold = crate::tx_sys::TX_THRESH_ERROR,

        /// Invalid caller.
        ///
        /// Threads are created during initialization or from another thread.
        Caller = crate::tx_sys::TX_CALLER_ERROR,
    }
}

error_enum! {
    /// An error when terminating a thread.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum TerminateError {
        /// Invalid caller.
        ///
        /// Only a thread can terminate a thread.
        Caller = crate::tx_sys::TX_CALLER_ERROR,
    }
}

error_enum! {
    /// An error when aborting a thread's wait.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum WaitAbortError {
        /// The thread isn't blocked on a kernel object, and it isn't sleeping.
        NotWaiting = crate::tx_sys::TX_WAIT_ABORT_ERROR,
    }
}

error_enum! {
    /// An incomplete or invalid sleep.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum SleepError {
        /// Another thread woke us early with [`Thread::wait_abort`].
        WaitAborted = crate::tx_sys::TX_WAIT_ABORTED,

        /// Invalid caller.
        ///
        /// Only a thread can sleep.
        Caller = crate::tx_sys::TX_CALLER_ERROR,
    }
}

/// A thread priority level.
///
/// Zero is the most important level. The least important level is
/// [TX_MAX_PRIORITIES](libthreadx_sys::TX_MAX_PRIORITIES) - 1.
///
/// Don't confuse this with a queue element's
/// [`Priority`](crate::priority_queue::Priority). Thread priorities decide
/// who runs; element priorities decide what's received first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct ThreadPriority(u32);

impl ThreadPriority {
    /// Returns `None` if the priority is out of range.
    #[inline]
    pub const fn new(priority: u32) -> Option<Self> {
        if Self::is_valid(priority) {
            // Safety: just checked.
            Some(unsafe { Self::new_unchecked(priority) })
        } else {
            None
        }
    }

    /// Define a thread priority without checking the range.
    ///
    /// # Safety
    ///
    /// An out-of-range priority is undefined behavior once it reaches the
    /// kernel. Prefer [`new`](Self::new) or [`make_priority`].
    #[inline]
    pub const unsafe fn new_unchecked(priority: u32) -> Self {
        Self(priority)
    }

    /// Returns `true` if `priority` is below `TX_MAX_PRIORITIES`.
    ///
    /// The constant comes from the bindings, and it must agree with the
    /// kernel you link.
    #[inline]
    pub const fn is_valid(priority: u32) -> bool {
        priority < crate::tx_sys::TX_MAX_PRIORITIES
    }

    /// The least important priority.
    #[inline]
    pub const fn lowest_priority() -> Self {
        Self(crate::tx_sys::TX_MAX_PRIORITIES - 1)
    }

    /// The raw priority.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for ThreadPriority {
    #[inline]
    fn default() -> Self {
        Self::lowest_priority()
    }
}

/// Make a thread priority, panicking if it's out of range.
///
/// In a `const`, the panic becomes a compile error.
///
/// ```
/// use triage::thread::{ThreadPriority, make_priority};
///
/// const LED_TASK: ThreadPriority = make_priority(5);
/// const UI_TASK: ThreadPriority = make_priority(10);
/// ```
/// ```compile_fail
/// # use triage::thread::{ThreadPriority, make_priority};
/// const INVALID: ThreadPriority = make_priority(9999);
/// ```
///
/// # Panics
///
/// ```should_panic
/// use triage::thread::make_priority;
/// make_priority(9999);
/// ```
#[inline]
pub const fn make_priority(priority: u32) -> ThreadPriority {
    assert!(ThreadPriority::is_valid(priority));
    // Safety: asserted above.
    unsafe { ThreadPriority::new_unchecked(priority) }
}

/// A thread's time slice.
///
/// `None` disables time slicing. Otherwise, it's the most ticks the thread
/// runs before yielding to a peer at the same priority.
pub type ThreadTimeSlice = Option<NonZero<u32>>;

/// A handle to a kernel thread.
///
/// Every created thread starts immediately. Use [`identify`] to get the
/// calling thread's handle.
///
/// # FFI
///
/// `Thread` is transparently a `TX_THREAD`.
#[repr(transparent)]
pub struct Thread(ControlBlock<TX_THREAD>);

impl Thread {
    /// Terminate the thread.
    ///
    /// If the thread terminates itself, this doesn't return. See
    /// [`thread::terminate`][terminate].
    #[inline]
    pub fn terminate(&self) -> Result<(), TerminateError> {
        // Safety: resource created and pinned per GSG-002.
        let result = unsafe { crate::tx_sys::tx_thread_terminate(self.0.get()) };
        TerminateError::try_from_result(result)?;
        Ok(())
    }

    /// Wake the thread from a blocking call.
    ///
    /// A thread blocked on a queue observes
    /// [`WaitAborted`](crate::priority_queue::ReceiveError::WaitAborted).
    /// A sleeping thread observes [`SleepError::WaitAborted`].
    #[inline]
    pub fn wait_abort(&self) -> Result<(), WaitAbortError> {
        // Safety: resource created and pinned per GSG-002.
        let result = unsafe { crate::tx_sys::tx_thread_wait_abort(self.0.get()) };
        WaitAbortError::try_from_result(result)?;
        Ok(())
    }
}

/// Configuration for a thread.
///
/// ```
/// use triage::thread::{ThreadPriority, ThreadOptions};
///
/// let opts = ThreadOptions::default();
///
/// assert!(opts.name.is_none());
/// assert_eq!(opts.priority, ThreadPriority::lowest_priority());
/// assert_eq!(opts.preemption_threshold, ThreadPriority::lowest_priority());
/// assert!(opts.time_slice.is_none());
/// ```
#[derive(Default)]
#[non_exhaustive]
pub struct ThreadOptions<'a> {
    /// An optional name.
    pub name: Option<&'a CStr>,
    /// The thread's priority.
    pub priority: ThreadPriority,
    /// Only threads more important than this can preempt the thread.
    ///
    /// It can't be less important than [`priority`](Self::priority).
    /// If it is, creation fails with [`CreateError::InvalidPreemptionThreshold`].
    pub preemption_threshold: ThreadPriority,
    /// Time slicing is ignored when the threshold differs from the priority.
    pub time_slice: ThreadTimeSlice,
}

impl ThreadOptions<'_> {
    /// Run at one priority, without time slicing.
    ///
    /// ```
    /// use triage::thread::{ThreadOptions, make_priority};
    ///
    /// let opts = ThreadOptions::single_priority(make_priority(5));
    /// assert_eq!(opts.priority, opts.preemption_threshold);
    /// assert!(opts.time_slice.is_none());
    /// ```
    #[inline]
    pub fn single_priority(priority: ThreadPriority) -> Self {
        Self {
            priority,
            preemption_threshold: priority,
            ..Default::default()
        }
    }
}

/// The first thing a new thread runs.
extern "C" fn entry_trampoline<F: FnOnce() + Send>(entry_start: *mut ()) {
    // Safety: entry_start points at the F that create_unchecked moved onto
    // the stack. Threads are never reset, so it's read (and dropped) once.
    crate::panic::catch_unwind_thread(|| unsafe { core::ptr::read(entry_start.cast::<F>())() });
}

/// Owns a thread and anything its entrypoint borrows.
///
/// # FFI
///
/// The context is transparently a [`Thread`].
#[repr(transparent)]
pub struct ThreadContext<'ctx>(Thread, InvariantLifetime<'ctx>);

impl Thread {
    /// Allocate a thread. Pin it, then [`create`](Self::create) it.
    pub const fn context<'ctx>() -> ThreadContext<'ctx> {
        ThreadContext(Thread(ControlBlock::new()), InvariantLifetime::mark())
    }

    /// Create and start a thread.
    ///
    /// The entrypoint is moved onto `stack`. See the
    /// [module documentation](crate::thread).
    ///
    /// The entrypoint can't borrow locals. Use
    /// [`AppDefine::create_thread`](crate::AppDefine::create_thread) for that.
    ///
    /// ```compile_fail
    /// use triage::thread::{StaticStack, Thread};
    ///
    /// static STACK: StaticStack<512> = StaticStack::new();
    ///
    /// let x = 5;
    /// let thread = core::pin::pin!(Thread::context());
    /// Thread::create(thread.into_ref(), STACK.take().unwrap(), &Default::default(), || {
    ///     let _nope = &x;
    /// })
    /// .unwrap();
    /// ```
    #[inline]
    pub fn create<'t, 'ctx, F>(
        context: Pin<&'t ThreadContext<'ctx>>,
        stack: &'static mut [u8],
        options: &'_ ThreadOptions<'ctx>,
        entrypoint: F,
    ) -> Result<&'t Thread, CreateError>
    where
        F: FnOnce() + Send + 'static,
    {
        // Safety: the stack is static and exclusively borrowed. The
        // entrypoint is static.
        unsafe {
            let stack_size = stack.len();
            let stack_start = stack.as_mut_ptr();
            Self::create_unchecked(context, stack_start, stack_size, options, entrypoint)
        }
    }

    /// # Safety
    ///
    /// Anything the entrypoint borrows must stay valid while the thread
    /// runs. The stack must be exclusively borrowed by the thread, and it
    /// must stay valid while the thread runs.
    unsafe fn create_unchecked<'your_choice, 't, 'ctx, F>(
        context: Pin<&'t ThreadContext<'ctx>>,
        buffer_start: *mut u8,
        buffer_size: usize,
        options: &'_ ThreadOptions<'ctx>,
        entrypoint: F,
    ) -> Result<&'t Thread, CreateError>
    where
        F: FnOnce() + Send + 'your_choice,
    {
        // Safety: the entrypoint now lives at the front of the stack, so it
        // lives as long as the stack. The caller vouches for its borrows.
        // The kernel calls the trampoline once, on another thread, which
        // is why F is Send.
        unsafe {
            let stack::StackLayout {
                stack_start,
                stack_len,
                entry_start,
            } = stack::figure_stack_layout(buffer_start, buffer_size, entrypoint)?;

            let dispatch = crate::callback_dispatch::make(entry_trampoline::<F>, entry_start);

            let result = crate::tx_sys::tx_thread_create(
                context.0.0.get(),
                crate::threadx_string(options.name),
                Some(dispatch.callback()),
                dispatch.input(),
                stack_start.cast::<core::ffi::c_void>(),
                stack_len
                    .try_into()
                    .map_err(|_| CreateError::StackTooSmall)?,
                options.priority.get(),
                options.preemption_threshold.get(),
                options
                    .time_slice
                    .map_or(crate::tx_sys::TX_NO_TIME_SLICE, NonZero::get),
                crate::tx_sys::TX_AUTO_START,
            );

            CreateError::try_from_result(result)?;

            Ok(&context.get_ref().0)
        }
    }
}

impl<'pke> AppDefine<'_, 'pke> {
    /// Create a thread that borrows local state.
    ///
    /// The state must be allocated before [`kernel_enter`](crate::kernel_enter).
    /// This is how a producer and a consumer share a queue that lives on
    /// `main`'s stack.
    #[inline]
    pub fn create_thread<'t, 'ctx, F>(
        &self,
        context: Pin<&'t ThreadContext<'ctx>>,
        stack: &'static mut [u8],
        options: &'_ ThreadOptions<'ctx>,
        entrypoint: F,
    ) -> Result<&'t Thread, CreateError>
    where
        F: FnOnce() + Send + 'pke,
        't: 'pke,
        'ctx: 'pke,
        'ctx: 't,
    {
        // Safety: the stack is static and exclusively borrowed. Borrows
        // made before kernel_enter outlive every thread.
        unsafe {
            let stack_size = stack.len();
            let stack_start = stack.as_mut_ptr();
            Thread::create_unchecked(context, stack_start, stack_size, options, entrypoint)
        }
    }
}

impl Drop for ThreadContext<'_> {
    fn drop(&mut self) {
        // Safety: resource is pinned and created per GSG-002, or never created
        // per GSG-003. Checking lifecycle per GSG-003.
        //
        // A thread must stop before its borrows expire. See GSG-002.
        unsafe {
            aborting_assert!(
                self.0.terminate().is_ok(),
                "Attempt to drop resource in the initialization context"
            );

            let result = crate::tx_sys::tx_thread_delete(self.0.0.get());
            aborting_assert!(
                result == crate::tx_sys::TX_SUCCESS || result == crate::tx_sys::TX_THREAD_ERROR,
                "Attempt to drop resource in the initialization context"
            );
        };
    }
}

/// Sleep the calling thread for `ticks`.
#[inline]
pub fn sleep(ticks: u32) -> Result<(), SleepError> {
    // Safety: no memory is shared with the kernel.
    let result = unsafe { crate::tx_sys::tx_thread_sleep(ticks) };
    SleepError::try_from_result(result)?;
    Ok(())
}

/// Yield to other ready threads at the same priority.
///
/// Outside of a thread, this does nothing.
#[inline]
pub fn relinquish() {
    // Safety: no memory is shared with the kernel.
    unsafe { crate::tx_sys::tx_thread_relinquish() }
}

/// Run `f` with the calling thread's handle.
///
/// From an ISR, that's the thread the ISR interrupted.
///
/// # Panics
///
/// Panics if no thread is running. See [`try_identify`].
pub fn identify<F: FnOnce(&Thread) -> T, T>(f: F) -> T {
    if let Some(value) = try_identify(f) {
        value
    } else {
        panic!()
    }
}

/// Like [`identify`], but returns `None` instead of panicking.
pub fn try_identify<F: FnOnce(&Thread) -> T, T>(f: F) -> Option<T> {
    // Safety: the running thread's control block outlives this call. If
    // another thread deletes it while `f` is suspended, this thread was
    // terminated first and never resumes. A Thread is transparently a
    // TX_THREAD.
    unsafe {
        let thread: *mut Thread = crate::tx_sys::tx_thread_identify().cast();
        (!thread.is_null()).then(|| f(&*thread))
    }
}

/// Terminate the calling thread.
///
/// # Panics
///
/// Panics outside of a thread.
#[inline]
pub fn terminate() -> ! {
    // Safety: self-termination never returns.
    unsafe {
        match identify(Thread::terminate) {
            Ok(()) => triage_unreachable!(),
            Err(TerminateError::Caller) => panic!(),
        }
    }
}

/// Thread stacks, and where the entrypoint goes in them.
mod stack {
    use super::CreateError;

    /// Memory for a thread's stack.
    ///
    /// It's a `[u8; N]` with the alignment a thread needs.
    #[repr(align(4))]
    pub struct Stack<const N: usize>([u8; N]);

    impl<const N: usize> Default for Stack<N> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<const N: usize> Stack<N> {
        /// A zeroed stack.
        pub const fn new() -> Self {
            Self([0; N])
        }

        /// The stack, ready for [`create`](super::Thread::create).
        #[inline]
        pub fn as_mut_slice(&mut self) -> &mut [u8] {
            self.0.as_mut_slice()
        }
    }

    /// A [`Stack`] in a `static`.
    ///
    /// [`take`](Self::take) hands out the `&'static mut [u8]` once.
    /// `N` can't be smaller than the kernel's minimum stack.
    pub struct StaticStack<const N: usize>(crate::StaticCell<Stack<N>>);

    impl<const N: usize> Default for StaticStack<N> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<const N: usize> StaticStack<N> {
        const BIG_ENOUGH: () = assert!(crate::tx_sys::TX_MINIMUM_STACK as usize <= N);

        /// Reserve `N` bytes.
        pub const fn new() -> Self {
            #[allow(clippy::let_unit_value)] // Force evaluation to catch compile-time errors.
            {
                let _ = Self::BIG_ENOUGH;
            }
            Self(crate::StaticCell::new(Stack::new()))
        }

        /// Take the stack, if nobody has.
        pub fn take(&'static self) -> Option<&'static mut [u8]> {
            self.0.take().map(Stack::as_mut_slice)
        }
    }

    /// A stack with the entrypoint moved into its low end.
    pub(crate) struct StackLayout {
        /// The entrypoint.
        pub(crate) entry_start: *mut (),
        /// The first byte after the entrypoint. ThreadX aligns it.
        pub(crate) stack_start: *mut u8,
        /// Bytes left for the thread, from `stack_start`.
        pub(crate) stack_len: usize,
    }

    /// Move `entrypoint` to the first address in the buffer that's aligned
    /// for it. The thread gets everything after it.
    ///
    /// Fails if what's left is smaller than the kernel's minimum stack.
    /// On failure, `entrypoint` is dropped and the buffer is untouched.
    pub(crate) fn figure_stack_layout<F: FnOnce() + Send>(
        buffer_start: *mut u8,
        buffer_size: usize,
        entrypoint: F,
    ) -> Result<StackLayout, CreateError> {
        let padding = buffer_start.align_offset(align_of::<F>());
        let used = padding
            .checked_add(size_of::<F>())
            .ok_or(CreateError::StackTooSmall)?;
        let stack_len = buffer_size
            .checked_sub(used)
            .filter(|&len| len > crate::tx_sys::TX_MINIMUM_STACK as usize)
            .ok_or(CreateError::StackTooSmall)?;

        // Safety: padding + size_of::<F>() is within the buffer, checked
        // above. The slot is aligned for F, and it holds nothing to drop.
        unsafe {
            let entry: *mut F = buffer_start.add(padding).cast();
            entry.write(entrypoint);
            Ok(StackLayout {
                entry_start: entry.cast(),
                stack_start: buffer_start.add(used),
                stack_len,
            })
        }
    }

    #[cfg(test)]
    mod tests {
        #![allow(clippy::undocumented_unsafe_blocks)]
        use super::{Stack, StackLayout, figure_stack_layout};
        use crate::tx_sys::TX_MINIMUM_STACK;

        const MIN: usize = TX_MINIMUM_STACK as usize;

        #[test]
        fn entrypoint_lands_at_the_front() {
            let captures = [7u32; 16];
            let entrypoint = move || {
                std::hint::black_box(captures);
            };
            let entry_size = size_of_val(&entrypoint);

            let mut stack: Stack<{ MIN + 256 }> = Stack::new();
            let start = stack.as_mut_slice().as_mut_ptr();
            let StackLayout {
                entry_start,
                stack_start,
                stack_len,
            } = figure_stack_layout(start, MIN + 256, entrypoint).unwrap();

            assert_eq!(entry_start, start.cast());
            assert_eq!(stack_start, start.wrapping_add(entry_size));
            assert_eq!(stack_len, MIN + 256 - entry_size);

            let moved: &[u32; 16] = unsafe { &*entry_start.cast() };
            assert_eq!(moved, &[7; 16]);
        }

        #[test]
        fn over_aligned_entrypoint_skips_ahead() {
            #[repr(C, align(64))]
            struct Wide([u8; 3]);

            const SIZE: usize = MIN + 512;
            let mut stack: Stack<{ SIZE + 1 }> = Stack::new();
            // Start one byte in, so the buffer can't be 64-byte aligned.
            let start = stack.as_mut_slice().as_mut_ptr().wrapping_add(1);
            assert_ne!(start as usize % 64, 0);

            let wide = Wide([0; 3]);
            let entrypoint = move || {
                std::hint::black_box(&wide);
            };
            let layout = figure_stack_layout(start, SIZE, entrypoint).unwrap();

            assert_eq!(layout.entry_start as usize % 64, 0);
            let padding = layout.entry_start as usize - start as usize;
            assert!(padding > 0 && padding < 64);
            assert_eq!(layout.stack_start as usize, layout.entry_start as usize + 64);
            assert_eq!(layout.stack_len, SIZE - padding - 64);
        }

        #[test]
        fn entrypoint_must_leave_room() {
            let captures = [0u8; 64];
            let entrypoint = move || {
                std::hint::black_box(captures);
            };

            let mut stack: Stack<{ MIN + 64 }> = Stack::new();
            let start = stack.as_mut_slice().as_mut_ptr();
            assert!(figure_stack_layout(start, MIN + 64, entrypoint).is_err());

            let mut stack: Stack<{ MIN + 65 }> = Stack::new();
            let start = stack.as_mut_slice().as_mut_ptr();
            assert_eq!(
                figure_stack_layout(start, MIN + 65, entrypoint)
                    .unwrap()
                    .stack_len,
                MIN + 1
            );
        }
    }
}
