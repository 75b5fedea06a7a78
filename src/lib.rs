// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Triage is a bounded, concurrent priority queue for ThreadX.
//!
//! A [`PriorityQueue`](priority_queue::PriorityQueue) holds a fixed number of
//! elements, each tagged with a [`Priority`](priority_queue::Priority). Threads
//! send elements in any order, and receivers always take the most urgent
//! element first. Receivers can block until there's work. Senders never wait
//! for room; a full queue hands the element back.
//!
//! The package also carries the ThreadX services you need to use the queue:
//! entering the kernel, and creating and managing threads.
//!
//! # Getting started
//!
//! A Triage application starts with a call to [`kernel_enter`].
//! Supply the entrypoint with a callback that creates the system's resources.
//! Create at least one thread, or your system won't do anything.
//!
//! The application below creates a queue and two threads. The producer
//! classifies work by urgency. The consumer serves it, most urgent first.
//! Both threads receive the queue handle from the initialization callback;
//! nothing looks the queue up by name.
//!
//! ```
//! use triage::{
//!     priority_queue::{Priority, PriorityQueue, PrioritySlot},
//!     thread::{self, StaticStack, Thread, ThreadOptions, make_priority},
//! };
//! use core::pin::pin;
//!
//! static PRODUCER_STACK: StaticStack<4096> = StaticStack::new();
//! static CONSUMER_STACK: StaticStack<4096> = StaticStack::new();
//!
//! fn producer(queue: &PriorityQueue<Priority>) {
//!     for priority in [Priority::Low, Priority::High, Priority::Medium] {
//!         // Drop the element if there's no room.
//!         let _ = queue.try_send(priority);
//!     }
//! }
//!
//! fn consumer(queue: &PriorityQueue<Priority>) {
//!     loop {
//!         let priority = queue.receive().unwrap();
//!         // Serve it...
//! #       if priority == Priority::Low { std::process::exit(0); }
//!     }
//! }
//!
//! fn main() {
//!     let mut slots = [const { PrioritySlot::new() }; 10];
//!     let queue = pin!(PriorityQueue::context());
//!     let producer_thread = pin!(Thread::context());
//!     let consumer_thread = pin!(Thread::context());
//!
//!     triage::kernel_enter(|app_define| {
//!         let queue = PriorityQueue::create(queue.into_ref(), &mut slots, &Default::default()).unwrap();
//!
//!         // The producer runs first, so the consumer sees all three.
//!         app_define.create_thread(
//!             producer_thread.into_ref(),
//!             PRODUCER_STACK.take().unwrap(),
//!             &ThreadOptions::single_priority(make_priority(10)),
//!             move || producer(queue),
//!         ).unwrap();
//!
//!         app_define.create_thread(
//!             consumer_thread.into_ref(),
//!             CONSUMER_STACK.take().unwrap(),
//!             &ThreadOptions::single_priority(make_priority(20)),
//!             move || consumer(queue),
//!         ).unwrap();
//!     })
//! }
//! ```
//!
//! # Design
//!
//! Triage follows the design of safe ThreadX bindings. Kernel objects live in
//! _contexts_ that you allocate, pin, and then _create_. This section
//! summarizes the patterns you'll see in the package.
//!
//! ## Resource creation
//!
//! You allocate OS resources with a call to `context`:
//!
//! - a [`PriorityQueueContext`](priority_queue::PriorityQueueContext) for a priority queue,
//! - a [`ThreadContext`](thread::ThreadContext) for a thread.
//!
//! The context tracks any references that the resource borrows, like a
//! queue's slots or a name. It also provides access to the _created_
//! resource.
//!
//! In order to create and use the resource, you first need to [pin](core::pin) its context.
//! Once pinned, call your resource's `create` function. On success, `create`
//! provides a handle to the resource. Share the handle with the threads that
//! need it.
//!
//! Contexts can live on the stack before [`kernel_enter`], as shown above, or
//! in `static`s. When a context is allocated in a `static`, anything it
//! borrows must be `'static` too. Use the `Static*` storage types, like
//!
//! - [`StaticPrioritySlots`](priority_queue::StaticPrioritySlots)
//! - [`StaticStack`](thread::StaticStack)
//!
//! to `take` that storage exactly once.
//!
//! ```
//! use triage::{
//!     priority_queue::{Priority, PriorityQueue, PriorityQueueContext, StaticPrioritySlots},
//!     thread::{StaticStack, Thread, ThreadContext},
//! };
//! use core::pin::Pin;
//!
//! static SLOTS: StaticPrioritySlots<Priority, 10> = StaticPrioritySlots::new();
//! static QUEUE: PriorityQueueContext<Priority> = PriorityQueue::context();
//! static STACK: StaticStack<4096> = StaticStack::new();
//! static THREAD: ThreadContext = Thread::context();
//!
//! fn main() {
//!     triage::kernel_enter(|_| {
//!         let queue = PriorityQueue::create(
//!             Pin::static_ref(&QUEUE),
//!             SLOTS.take().unwrap(),
//!             &Default::default(),
//!         ).unwrap();
//!
//!         Thread::create(
//!             Pin::static_ref(&THREAD),
//!             STACK.take().unwrap(),
//!             &Default::default(),
//!             move || {
//!                 queue.send(Priority::Medium).unwrap();
//!                 assert_eq!(queue.receive(), Ok(Priority::Medium));
//! #               std::process::exit(0);
//!             },
//!         ).unwrap();
//!     });
//! }
//! ```
//!
//! ## Method naming conventions
//!
//! Actions on a resource could block indefinitely, never block, or block
//! for a while. When the method name is
//!
//! - simply the _action_, then the call **blocks indefinitely**.
//!   For example, [`PriorityQueue::receive`](priority_queue::PriorityQueue::receive)
//!   blocks until there's an element.
//! - the _action_ prefixed with `try_*`, then the call is **non-blocking**.
//!   For example, [`PriorityQueue::try_receive`](priority_queue::PriorityQueue::try_receive)
//!   returns immediately if the queue is empty.
//! - the _action_ suffixed with `*_with_wait`, then the call **blocks for the given [`WaitOption`]**.
//!
//! Only a thread can perform an action that blocks. From the initialization
//! context, use the non-blocking methods.
//!
//! ## Timeouts are OK
//!
//! A timeout is not an error; it's exactly what you asked for. Triage signals
//! a timeout through the `Ok(...)` variant of a `Result`. When receiving,
//! `Ok(None)` means the wait expired. When sending, `Ok(Some(elem))` means the
//! wait expired, and you get your element back. A full queue is different: it's
//! an error, and the send hands back the element in the error.
//!
//! # Porting
//!
//! You must provide a `tx_initialize_low_level` routine for your port. This
//! routine must globally disable interrupts, and it should set up your
//! system's periodic timer. ThreadX typically provides this routine when
//! targeting host ports, like Linux.
//!
//! Triage does not provide any life-before-`main` support for MCU ports.

/*
General Safety Guidance
=======================

Every kernel resource in this package is managed the same way. The general
safety guidance (GSG) documents the considerations that apply across the
package. The labels appear in the safety comments throughout the code.

GSG-000: Contexts track borrowed lifetimes
------------------------------------------

A context object uses an invariant lifetime to track the borrows provided to
a resource's `create` method. This invariant lifetime, along with the drop check,
ensures that the context cannot outlive any of its borrows.

A name, represented as a CStr, is borrowed by the kernel. If the context could
outlive the name, a query for resource information could return a dangling
pointer. The priority queue also borrows its slots. If the context outlived the
slots, sending and receiving would touch dangling memory.

If a safety comment links you here, make sure that any borrows are tagged with the
appropriate lifetime.

GSG-001: Contexts are pinned in order to be useful
--------------------------------------------------

"Creation" registers a resource with ThreadX. ThreadX control blocks point to
other control blocks of the same type; they're nodes in the kernel's linked
lists. If a context could move after creation, the kernel would follow a
pointer to memory that no longer holds the control block.

Contexts are !Unpin, since they include at least one ControlBlock<T>. A
priority queue context holds two control blocks, a mutex and a semaphore;
both are pinned by pinning the context.

If a safety comment links you here, make sure that the context is pinned in its `create`
method, and in all methods that are non-allocating.

GSG-002: Resource handles must be created and pinned
----------------------------------------------------

A "resource handle" is a reference to a resource owned by a context. For
example, a `&PriorityQueue<T>` is the handle exposed by a
`PriorityQueueContext<'_, T>`.

If a user can access the handle, then the resource must have been created,
and it must have a stable location in memory. Given that, ThreadX never
returns "object not created" errors from service calls made through the
handle. For a priority queue, "created" means both the mutex and the
semaphore are created.

If a safety comment links you here, make sure that the contexts only release
resource handles after they determine the resource is created.

GSG-003: Context lifecycle occurs in one execution context
----------------------------------------------------------

An "execution context" is either initialization, thread, ISR, or timer.

A context object is created in one execution context, and it's dropped in that
same context. All contexts are !Send, so they can't move between threads, or
from a thread to an ISR. ThreadX won't delete a resource from an ISR; if that
were attempted, the delete would fail and the control block would remain in the
kernel's list.

The remaining case is a resource that's created and then dropped within the
initialization context. ThreadX refuses that delete with a caller error. We
catch that at runtime, in the context's drop, and abort.

A user is free to allocate a context and never call create. In this case, the
drop observes a "resource not created" error. That error is ignored; the
resource never entered a kernel list.
*/

#![no_std]
#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    let_underscore_drop,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_numeric_casts,
    unsafe_op_in_unsafe_fn,
    unreachable_pub,
    unused_qualifications,
    clippy::cast_possible_truncation,
    clippy::map_unwrap_or,
    clippy::manual_assert,
    clippy::missing_safety_doc,
    clippy::ref_as_ptr,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    clippy::single_match_else,
    clippy::undocumented_unsafe_blocks,
    clippy::used_underscore_binding
)]
#![allow(
    missing_debug_implementations,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod tx_sys {
    pub(crate) use ::libthreadx_sys::error_checked::*;
    pub(crate) use ::libthreadx_sys::*;
}

/// Defines an enumeration that represents a ThreadX result value.
///
/// The enum uses a `u32` representation. It includes a `try_from_result`
/// method that converts the raw ThreadX result into an enum variant.
macro_rules! error_enum {
    (
        $(#[$enum_meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident = $constant:path
            ),* $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[repr(u32)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant = $constant,
            )*
        }

        impl $name {
            /// # Panics
            ///
            /// Panics if the result code cannot be converted into one of the
            /// enum variants.
            const fn try_from_result(result: u32) -> Result<(), Self> {
                match result {
                    $crate::tx_sys::TX_SUCCESS => Ok(()),
                    $(
                    $constant => Err(Self::$variant),
                    )*
                    _ => unreachable!(),
                }
            }
        }
    };
}

/// Claim that the execution path is unreachable.
///
/// This always requires an `unsafe` block, since the "panic
/// if taken" guarantee may not exist for a given build.
macro_rules! triage_unreachable {
    ($($arg:tt)*) => {{
        #[allow(unreachable_code)]
        {
            #[cfg(debug_assertions)]
            { ::core::unreachable!($($arg)*); }
            ::core::hint::unreachable_unchecked();
        }
    }};
}

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
mod panic;
mod app_define;
mod callback_dispatch;
mod interrupt_control;

use core::{cell::UnsafeCell, marker::PhantomPinned, mem::MaybeUninit};

pub use app_define::{AppDefine, is_initializing, kernel_enter};

pub mod priority_queue;
pub mod thread;

/// Get the relative time, in timer ticks, from the periodic timer.
///
/// The relative time increments every time the periodic timer interrupt activates.
/// The frequency depends on your port's periodic timer configuration.
#[inline]
pub fn get_time() -> u32 {
    // Safety: Call does not modify any global state. It simply
    // reads a u32 managed by the OS. Read occurs within a critical
    // section implemented by the operating system.
    unsafe { tx_sys::tx_time_get() }
}

/// How many ticks to wait for an operation.
///
/// This wraps a `u32` that describes the system ticks to wait
/// for an operation to produce a result. For convenience,
/// use [`no_wait()`](Self::no_wait) to signal a non-blocking
/// operation. Or, use [`wait_forever()`](Self::wait_forever)
/// to signal a blocking operation.
///
/// Ticks `1` through `(!0 - 1)`, inclusive, are a finite wait.
///
/// ```
/// use triage::WaitOption;
///
/// assert!(WaitOption(0).is_no_wait());
/// assert_eq!(WaitOption::wait_forever(), WaitOption(!0));
/// assert_eq!(u32::from(WaitOption(25)), 25);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct WaitOption(pub u32);

impl WaitOption {
    /// Do not wait for the operation to complete.
    pub const fn no_wait() -> Self {
        Self(libthreadx_sys::TX_NO_WAIT)
    }

    /// Returns `true` if constructed via [`no_wait()`](Self::no_wait).
    pub const fn is_no_wait(self) -> bool {
        self.0 == libthreadx_sys::TX_NO_WAIT
    }

    /// Wait forever for the operation to complete.
    ///
    /// Another thread can still abort the wait with
    /// [`Thread::wait_abort`](thread::Thread::wait_abort).
    pub const fn wait_forever() -> Self {
        Self(libthreadx_sys::TX_WAIT_FOREVER)
    }
}

impl From<WaitOption> for u32 {
    fn from(value: WaitOption) -> Self {
        value.0
    }
}

mod marker {
    use core::{cell::Cell, marker::PhantomData};

    /// A zero-sized type that's neither `Send` nor `Sync`.
    ///
    /// This type is valid to construct in a const context.
    pub(crate) struct NotSendOrSync(PhantomData<*mut ()>);
    impl NotSendOrSync {
        pub(crate) const fn mark() -> Self {
            Self(PhantomData)
        }
    }

    /// A zero-sized type that forces `'wat` to be lifetime invariant.
    ///
    /// This type is still Send and Sync. If you need to block those
    /// implementations, seek another marker type.
    pub(crate) struct InvariantLifetime<'wat> {
        invariant_lifetime: PhantomData<Cell<&'wat ()>>,
        _not_send_or_sync: NotSendOrSync,
    }
    impl InvariantLifetime<'_> {
        pub(crate) const fn mark() -> Self {
            Self {
                _not_send_or_sync: NotSendOrSync::mark(),
                invariant_lifetime: PhantomData,
            }
        }
    }
    // Safety: this type isn't responsible for blocking Send.
    unsafe impl Send for InvariantLifetime<'_> {}
    // Safety: this type isn't responsible for blocking Sync.
    unsafe impl Sync for InvariantLifetime<'_> {}
}

/// A kernel object's control block.
///
/// Send and Sync are added per control block type, below.
#[repr(transparent)]
struct ControlBlock<T> {
    _not_send_or_sync: marker::NotSendOrSync,
    /// Normally only handed to ThreadX as a pointer.
    control_block: UnsafeCell<T>,
    /// ThreadX links control blocks together. They can't move.
    _pin: PhantomPinned,
}

impl<T> ControlBlock<T> {
    /// Returns a control block with a zero bit pattern.
    const fn new() -> Self {
        Self {
            _not_send_or_sync: marker::NotSendOrSync::mark(),
            // Safety: A zero bitpattern is OK for all types T used throughout
            // this package. The control block is a C structure composed of
            // primitives and pointers, all which can be zero.
            control_block: UnsafeCell::new(unsafe { MaybeUninit::zeroed().assume_init() }),
            _pin: PhantomPinned,
        }
    }

    /// Get the pointer to the control block.
    const fn get(&self) -> *mut T {
        self.control_block.get()
    }
}

//
// On Sync safety of ControlBlock<T>
// ---------------------------------
//
// ThreadX takes critical sections when it manipulates these objects, so
// they're safe to share. We never (safely) observe or modify the
// internals of a control block.
//
// 'create' functions may modify the control block outside of a critical
// section. But creation also fails if the object is already registered,
// and that evaluation occurs in a critical section. Creation fails from
// an interrupt, too. This relies on the error-checked ThreadX API, which
// is the only API this package calls.
//
// Control blocks are never Send. See GSG-003.
//

// Safety: see above.
unsafe impl Sync for ControlBlock<libthreadx_sys::TX_MUTEX> {}

// Safety: see above.
unsafe impl Sync for ControlBlock<libthreadx_sys::TX_SEMAPHORE> {}

// Safety: see above.
unsafe impl Sync for ControlBlock<libthreadx_sys::TX_THREAD> {}

/// Generalizes how we query for a control block's (creation) ID.
trait Identified {
    const CREATION_ID: tx_sys::ULONG;
    fn creation_id(&self) -> tx_sys::ULONG;
}

macro_rules! impl_identified {
    ($ControlBlock:ty, $CREATION_ID:path) => {
        impl Identified for $ControlBlock {
            const CREATION_ID: $crate::tx_sys::ULONG = $CREATION_ID;
            fn creation_id(&self) -> crate::tx_sys::ULONG {
                <$ControlBlock>::id(self)
            }
        }
    };
}

impl_identified!(libthreadx_sys::TX_MUTEX, libthreadx_sys::TX_MUTEX_ID);
impl_identified!(
    libthreadx_sys::TX_SEMAPHORE,
    libthreadx_sys::TX_SEMAPHORE_ID
);
impl_identified!(libthreadx_sys::TX_THREAD, libthreadx_sys::TX_THREAD_ID);

impl<CB: Identified> ControlBlock<CB> {
    /// Returns `true` if this control block has been created.
    fn is_created(&self) -> bool {
        // Safety: all control blocks start with a zero bit pattern, which is
        // valid for the creation ID.
        unsafe { (*self.get()).creation_id() == CB::CREATION_ID }
    }
}

/// Storage that can be taken once.
struct StaticCell<T> {
    data: UnsafeCell<T>,
    taken: interrupt_control::InterruptFreeCell<bool>,
}

// Safety: We guard access to the data with a runtime flag. The
// flag guarantees that only one execution context can access
// the managed data.
unsafe impl<T: Send> Sync for StaticCell<T> {}

impl<T> StaticCell<T> {
    const fn new(value: T) -> Self {
        Self {
            data: UnsafeCell::new(value),
            taken: interrupt_control::InterruptFreeCell::new(false),
        }
    }

    /// Take a mutable reference to this cell's data.
    ///
    /// Returns `Some(...)` for the first call, then `None` on
    /// any subsequent call.
    fn take(&'static self) -> Option<&'static mut T> {
        // Safety: The flag replacement happens in a critical section.
        // Only the first caller sees `false`, so there's only ever one
        // mutable reference.
        unsafe { (!self.taken.replace(true)).then(|| &mut *self.data.get()) }
    }
}

fn threadx_string(name: Option<&core::ffi::CStr>) -> *mut core::ffi::c_char {
    name.map_or(core::ptr::null_mut(), |name| name.as_ptr().cast_mut())
}

/// Convert a ThreadX resource name into something nice.
///
/// It's OK if `name` is null.
///
/// # Safety
///
/// `name` must point to a nul-terminated string. You must make sure
/// the lifetime is correct.
unsafe fn from_threadx_string<'c>(name: *mut core::ffi::c_char) -> ResourceName<'c> {
    // Safety: `name` is not NULL. Caller swears that `name` points to a nul-terminated
    // string.
    ResourceName((!name.is_null()).then(|| unsafe { core::ffi::CStr::from_ptr(name) }))
}

/// The name assigned to an operating system resource.
///
/// Use [`as_c_str`](Self::as_c_str) to access the underlying string.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceName<'r>(Option<&'r core::ffi::CStr>);

impl<'r> ResourceName<'r> {
    /// Returns the underlying string, if it exists.
    #[inline]
    pub const fn as_c_str(self) -> Option<&'r core::ffi::CStr> {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ResourceName<'_> {
    fn format(&self, fmt: defmt::Formatter<'_>) {
        defmt::write!(
            fmt,
            "{=[u8]:a}",
            self.0.map(core::ffi::CStr::to_bytes).unwrap_or(b"")
        );
    }
}

impl core::fmt::Display for ResourceName<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.map_or(Ok(()), |c_str| {
            core::fmt::Display::fmt(&c_str.to_bytes().escape_ascii(), f)
        })
    }
}

impl core::fmt::Debug for ResourceName<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.0, f)
    }
}
