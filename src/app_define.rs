// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Entering the kernel.

use core::{
    cell::UnsafeCell,
    mem::ManuallyDrop,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::interrupt_control;

/// A handle to the [`kernel_enter`] initialization context.
///
/// Holding an `AppDefine` reference means you're in the initialization
/// context. No thread runs, and interrupts are disabled, until you give it
/// up. Only non-blocking queue calls work here, like
/// [`try_send`](crate::priority_queue::PriorityQueue::try_send).
///
/// `'pke` is the "pre-kernel enter" lifetime: anything allocated before the
/// call to [`kernel_enter`]. `kernel_enter` never returns, so those values
/// stay live for the rest of the program, and threads may borrow them. `'ad`
/// is the lifetime of references made during initialization.
///
/// # Example
///
/// A queue of string slices, all borrowed from `main`.
///
/// ```
/// use triage::{
///     AppDefine,
///     priority_queue::{Prioritized, Priority, PriorityQueue, PrioritySlot},
///     thread::{StaticStack, Thread},
/// };
/// use core::pin::pin;
///
/// static STACK: StaticStack<4096> = StaticStack::new();
///
/// #[derive(Debug)]
/// struct Note<'a>(Priority, &'a str);
/// impl Prioritized for Note<'_> {
///     fn priority(&self) -> Priority { self.0 }
/// }
///
/// fn main() {
///     let greeting = String::from("hello");
///     let farewell = String::from("goodbye");
///
///     let mut slots = [const { PrioritySlot::new() }; 4];
///     let queue = pin!(PriorityQueue::context());
///     let thread = pin!(Thread::context());
///
///     triage::kernel_enter(|app_define: &AppDefine| {
///         let queue = PriorityQueue::create(queue.into_ref(), &mut slots, &Default::default()).unwrap();
///         assert!(queue.try_send(Note(Priority::Low, &farewell)).unwrap().is_none());
///         assert!(queue.try_send(Note(Priority::High, &greeting)).unwrap().is_none());
///
///         app_define.create_thread(
///             thread.into_ref(),
///             STACK.take().unwrap(),
///             &Default::default(),
///             move || {
///                 assert_eq!(queue.receive().unwrap().1, "hello");
///                 assert_eq!(queue.receive().unwrap().1, "goodbye");
/// #               std::process::exit(0);
///             },
///         ).unwrap();
///     });
/// }
/// ```
pub struct AppDefine<'ad, 'pke: 'ad> {
    _env: crate::marker::InvariantLifetime<'pke>,
    _ad: crate::marker::InvariantLifetime<'ad>,
    _not_send_or_sync: crate::marker::NotSendOrSync,
}

impl AppDefine<'_, '_> {
    const fn new() -> Self {
        AppDefine {
            _env: crate::marker::InvariantLifetime::mark(),
            _ad: crate::marker::InvariantLifetime::mark(),
            _not_send_or_sync: crate::marker::NotSendOrSync::mark(),
        }
    }
}

/// Enter the kernel, creating the system's first resources in `app_define`.
///
/// Threads start sometime after `app_define` returns, so creation order
/// doesn't matter. Create at least one thread; otherwise, the kernel has
/// nothing to schedule.
///
/// Calls made inside `app_define` must not block. If a routine runs both
/// here and in threads, check [`is_initializing`].
///
/// See [`AppDefine`] for `'pke` and `'ad`.
///
/// # Example
///
/// Static resources, created during initialization.
///
/// ```
/// use triage::{
///     priority_queue::{Priority, PriorityQueue, PriorityQueueContext, StaticPrioritySlots},
///     thread::{StaticStack, Thread, ThreadContext},
/// };
/// use core::pin::Pin;
///
/// static SLOTS: StaticPrioritySlots<Priority, 8> = StaticPrioritySlots::new();
/// static QUEUE: PriorityQueueContext<Priority> = PriorityQueue::context();
/// static STACK: StaticStack<4096> = StaticStack::new();
/// static THREAD: ThreadContext = Thread::context();
/// # fn serve(queue: &PriorityQueue<Priority>) {
/// #     assert_eq!(queue.receive(), Ok(Priority::Medium));
/// #     std::process::exit(0);
/// # }
///
/// fn main() {
///     triage::kernel_enter(|_| {
///         let queue = PriorityQueue::create(
///             Pin::static_ref(&QUEUE),
///             SLOTS.take().unwrap(),
///             &Default::default(),
///         ).unwrap();
///         queue.try_send(Priority::Medium).unwrap();
///
///         Thread::create(
///             Pin::static_ref(&THREAD),
///             STACK.take().unwrap(),
///             &Default::default(),
///             move || serve(queue),
///         ).unwrap();
///     });
/// }
/// ```
///
/// # Only enter the kernel once
///
/// What happens on a second entry depends on your port. The global state
/// used here survives a reentrant call, but nothing stops you from making
/// one.
pub fn kernel_enter<'pke, F>(app_define: F) -> !
where
    F: for<'ad> FnOnce(&'ad AppDefine<'ad, 'pke>) + 'pke,
{
    use crate::callback_dispatch::CallbackDispatch;

    // tx_kernel_enter never returns, so this frame is never popped. The
    // trampoline reads (and drops) the callable instead.
    let mut app_define = ManuallyDrop::new(app_define);

    /// Holds the dispatch for tx_application_define.
    struct AppDefineCallback(UnsafeCell<CallbackDispatch<*mut ()>>);

    static APP_DEFINE_CALLBACK: AppDefineCallback =
        AppDefineCallback(UnsafeCell::new(CallbackDispatch::no_op()));

    // Safety: only touched with interrupts disabled, before the scheduler
    // starts. tx_kernel_enter doesn't reenter this function.
    unsafe impl Sync for AppDefineCallback {}

    // Safety: see the Sync impl. The callable stays live on this frame, and
    // the trampoline knows its exact type.
    unsafe {
        interrupt_control::with_disabled(|| {
            APP_DEFINE_CALLBACK.0.get().write(CallbackDispatch::direct(
                app_define_trampoline::<F>,
                core::ptr::from_mut::<F>(&mut *app_define).cast::<()>(),
            ));
        });
    }

    extern "C" fn app_define_trampoline<'pke, F>(app_define: *mut ())
    where
        F: for<'ad> FnOnce(&'ad AppDefine<'ad, 'pke>) + 'pke,
    {
        // Safety: the pointer is the *mut F written above, still live on
        // kernel_enter's frame. tx_application_define swaps in a no-op
        // before dispatching, so this runs at most once.
        crate::panic::catch_unwind_init(|| unsafe {
            core::ptr::read(app_define.cast::<F>())(&AppDefine::new());
        });
    }

    // Safety: the one definition of this strong symbol.
    #[unsafe(no_mangle)]
    extern "C" fn tx_application_define(_: *mut core::ffi::c_void) {
        IN_APP_DEFINE.store(true, Ordering::SeqCst);

        // Safety: interrupts are disabled here, so nothing races the swap.
        // A direct C call to tx_kernel_enter sees the no-op sentinel.
        let dispatch = unsafe {
            APP_DEFINE_CALLBACK
                .0
                .get()
                .replace(CallbackDispatch::no_op())
        };

        dispatch.invoke();

        IN_APP_DEFINE.store(false, Ordering::SeqCst);
    }

    // Safety: tx_application_define tolerates repeated calls.
    unsafe { crate::tx_sys::tx_kernel_enter() }
}

static IN_APP_DEFINE: AtomicBool = AtomicBool::new(false);

/// Returns `true` inside the [`kernel_enter`] callback.
///
/// Code shared between initialization and threads uses this to pick a
/// non-blocking call.
///
/// ```
/// use triage::thread::{StaticStack, Thread};
/// use core::pin::pin;
///
/// static STACK: StaticStack<4096> = StaticStack::new();
///
/// fn main() {
///     assert!(!triage::is_initializing());
///
///     let thread = pin!(Thread::context());
///     triage::kernel_enter(|_| {
///         assert!(triage::is_initializing());
///
///         Thread::create(
///             thread.into_ref(),
///             STACK.take().unwrap(),
///             &Default::default(),
///             || {
///                 assert!(!triage::is_initializing());
/// #               std::process::exit(0);
///             },
///         ).unwrap();
///     });
/// }
/// ```
#[inline]
pub fn is_initializing() -> bool {
    IN_APP_DEFINE.load(Ordering::Relaxed)
}
