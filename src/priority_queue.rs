// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Bounded priority queue services
//!
//! A [`PriorityQueue`] holds up to `N` elements and always hands out the most
//! urgent one first. Urgency is one of three [`Priority`] levels, read from
//! each element through [`Prioritized`]. Elements sharing a priority come out
//! in no particular order; the queue is not FIFO within a level.
//!
//! Any number of threads can send to and receive from the same queue. A
//! receiver can block until an element exists. A sender never waits for
//! room. If the queue is full, the send fails right away and you get your
//! element back. What to do with it (drop it, retry later) is up to you.
//!
//! The queue is built from a ThreadX mutex, guarding the heap, and a ThreadX
//! counting semaphore, counting the elements a receiver may claim. Both are
//! registered with the kernel when you [`create`](PriorityQueue::create)
//! the queue.
//!
//! # Examples
//!
//! A static queue paired with static storage.
//!
//! ```no_run
//! use triage::priority_queue::{
//!     Priority, PriorityQueue, PriorityQueueContext, StaticPrioritySlots,
//! };
//! use core::pin::Pin;
//!
//! static SLOTS: StaticPrioritySlots<Priority, 10> = StaticPrioritySlots::new();
//! static QUEUE: PriorityQueueContext<Priority> = PriorityQueue::context();
//!
//! # (|| -> Option<()> {
//! let slots = SLOTS.take()?;
//! # let queue = (|slots| -> Result<&PriorityQueue<Priority>, triage::priority_queue::CreateError> {
//! let queue = PriorityQueue::create(Pin::static_ref(&QUEUE), slots, &Default::default())?;
//! # Ok(queue) })(slots).unwrap();
//!
//! match queue.try_send(Priority::High) {
//!     // Sent!
//!     Ok(None) => {}
//!     // Someone else held the queue. Try again later?
//!     Ok(Some(_retry)) => {}
//!     // The queue is full, or we called from an interrupt.
//!     Err((_err, _dropped)) => {}
//! }
//! # Some(()) })().unwrap();
//! ```
//!
//! A queue with storage on the stack. Creation happens in the initialization
//! context, so the sends can't block.
//!
//! ```
//! use triage::priority_queue::{Priority, PriorityQueue, PrioritySlot};
//! use triage::thread::{StaticStack, Thread};
//! use core::pin::pin;
//!
//! static STACK: StaticStack<4096> = StaticStack::new();
//!
//! fn main() {
//!     let mut slots = [const { PrioritySlot::<Priority>::new() }; 10];
//!     let queue = pin!(PriorityQueue::context());
//!     let thread = pin!(Thread::context());
//!
//!     triage::kernel_enter(|app_define| {
//!         let queue = PriorityQueue::create(queue.into_ref(), &mut slots, &Default::default()).unwrap();
//!         for priority in [Priority::Low, Priority::High, Priority::Medium] {
//!             assert!(matches!(queue.try_send(priority), Ok(None)));
//!         }
//!
//!         app_define.create_thread(
//!             thread.into_ref(),
//!             STACK.take().unwrap(),
//!             &Default::default(),
//!             move || {
//!                 assert_eq!(queue.receive(), Ok(Priority::High));
//!                 assert_eq!(queue.receive(), Ok(Priority::Medium));
//!                 assert_eq!(queue.receive(), Ok(Priority::Low));
//!                 assert_eq!(queue.try_receive(), Ok(None));
//! #               std::process::exit(0);
//!             },
//!         ).unwrap();
//!     });
//! }
//! ```

mod heap;

pub use heap::PrioritySlot;

use core::{
    cell::UnsafeCell,
    ffi::CStr,
    pin::Pin,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    marker::InvariantLifetime,
    tx_sys::{TX_MUTEX, TX_SEMAPHORE},
    ControlBlock, WaitOption,
};
use heap::Heap;

/// How urgent an element is.
///
/// `Low < Medium < High`. A queue serves the greatest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Priority {
    /// Served last.
    #[default]
    Low,
    /// Served before [`Low`](Self::Low).
    Medium,
    /// Served first.
    High,
}

impl Priority {
    /// Every priority, least urgent first.
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];
}

/// An element with a priority.
///
/// The queue asks once, when the element is sent. Your answer shouldn't
/// change while the element is in the queue, though the queue won't notice
/// if it does.
///
/// ```
/// use triage::priority_queue::{Priority, Prioritized};
///
/// struct Alarm {
///     priority: Priority,
///     code: u16,
/// }
///
/// impl Prioritized for Alarm {
///     fn priority(&self) -> Priority {
///         self.priority
///     }
/// }
/// ```
pub trait Prioritized {
    /// Returns the element's priority.
    fn priority(&self) -> Priority;
}

impl Prioritized for Priority {
    #[inline]
    fn priority(&self) -> Priority {
        *self
    }
}

/// A payload tagged with its priority.
impl<T> Prioritized for (Priority, T) {
    #[inline]
    fn priority(&self) -> Priority {
        self.0
    }
}

/// An error when creating a priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum CreateError {
    /// The queue is already created.
    AlreadyCreated,
    /// Invalid caller.
    ///
    /// You can only create a queue during initialization or from a thread.
    Caller,
    /// There are no slots.
    InvalidSize,
}

impl CreateError {
    const fn try_from_mutex_result(result: u32) -> Result<(), Self> {
        match result {
            crate::tx_sys::TX_SUCCESS => Ok(()),
            crate::tx_sys::TX_MUTEX_ERROR => Err(Self::AlreadyCreated),
            crate::tx_sys::TX_CALLER_ERROR => Err(Self::Caller),
            _ => unreachable!(),
        }
    }

    const fn try_from_semaphore_result(result: u32) -> Result<(), Self> {
        match result {
            crate::tx_sys::TX_SUCCESS => Ok(()),
            crate::tx_sys::TX_SEMAPHORE_ERROR => Err(Self::AlreadyCreated),
            crate::tx_sys::TX_CALLER_ERROR => Err(Self::Caller),
            _ => unreachable!(),
        }
    }
}

error_enum! {
    /// Errors shared by the queue's mutex and semaphore waits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum WaitError {
        WaitAborted = crate::tx_sys::TX_WAIT_ABORTED,
        InvalidWait = crate::tx_sys::TX_WAIT_ERROR,
        Caller = crate::tx_sys::TX_CALLER_ERROR,
    }
}

/// An error when sending to a priority queue.
///
/// A timeout is not an error; see [`send_with_wait`](PriorityQueue::send_with_wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum SendError {
    /// The queue holds as many elements as it has slots.
    ///
    /// The queue doesn't wait for room. You observe this no matter
    /// the wait option.
    Full,
    /// Another thread aborted the wait for the queue.
    WaitAborted,
    /// The wait option is invalid for the execution context.
    ///
    /// Only threads can wait.
    InvalidWait,
    /// Invalid caller.
    ///
    /// The queue can't be used from an interrupt.
    Caller,
}

impl From<WaitError> for SendError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::WaitAborted => Self::WaitAborted,
            WaitError::InvalidWait => Self::InvalidWait,
            WaitError::Caller => Self::Caller,
        }
    }
}

/// An error when receiving from a priority queue.
///
/// A timeout is not an error; see [`receive_with_wait`](PriorityQueue::receive_with_wait).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum ReceiveError {
    /// Another thread aborted the wait.
    ///
    /// The queue is unchanged.
    WaitAborted,
    /// The wait option is invalid for the execution context.
    ///
    /// Only threads can wait.
    InvalidWait,
    /// Invalid caller.
    ///
    /// The queue can't be used from an interrupt.
    Caller,
}

impl From<WaitError> for ReceiveError {
    fn from(err: WaitError) -> Self {
        match err {
            WaitError::WaitAborted => Self::WaitAborted,
            WaitError::InvalidWait => Self::InvalidWait,
            WaitError::Caller => Self::Caller,
        }
    }
}

/// Priority inheritance for the queue's lock.
///
/// With inheritance, a low-priority thread holding the queue temporarily
/// runs at the priority of the most important thread waiting for it.
/// The default is "no inherit."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum PriorityInheritance {
    /// The lock does not support priority inheritance.
    #[default]
    NoInherit = crate::tx_sys::TX_NO_INHERIT,
    /// The lock supports priority inheritance.
    Inherit = crate::tx_sys::TX_INHERIT,
}

impl From<bool> for PriorityInheritance {
    #[inline]
    fn from(inherit: bool) -> Self {
        if inherit {
            Self::Inherit
        } else {
            Self::NoInherit
        }
    }
}

/// Runtime options for a priority queue.
///
/// Supply these values to [`create`](PriorityQueue::create).
#[derive(Default)]
#[non_exhaustive]
pub struct PriorityQueueOptions<'a> {
    /// An (optional) name for the queue.
    ///
    /// The name is shared by the queue's mutex and semaphore.
    pub name: Option<&'a CStr>,
    /// The priority inheritance behavior of the queue's lock.
    pub inheritance: PriorityInheritance,
}

/// The heap, readable only while the queue's mutex is held.
struct HeapCell<T>(UnsafeCell<Heap<T>>);

// Safety: The queue's mutex serializes every access after creation.
// Before creation, only the creating call touches the heap. Elements
// move between threads, so they need to be Send.
unsafe impl<T: Send> Sync for HeapCell<T> {}

/// A fixed-capacity queue that serves the highest priority first.
///
/// See [the module documentation](crate::priority_queue) for more information.
///
/// Use [`send`](Self::send) and its variants to insert. Use
/// [`receive`](Self::receive) and its variants to extract the most urgent
/// element.
pub struct PriorityQueue<T> {
    /// Guards the heap.
    mutex: ControlBlock<TX_MUTEX>,
    /// Counts elements that a receiver may still claim.
    ///
    /// Created last. If it's created, so is everything else.
    available: ControlBlock<TX_SEMAPHORE>,
    heap: HeapCell<T>,
    capacity: AtomicUsize,
}

/// Manages a priority queue and its borrowed storage.
///
/// Use the [`PriorityQueue`] returned by [`create`](PriorityQueue::create)
/// to interact with the queue.
///
/// When dropped, the context drops any elements still in the queue.
pub struct PriorityQueueContext<'ctx, T>(PriorityQueue<T>, InvariantLifetime<'ctx>);

impl<T> Drop for PriorityQueueContext<'_, T> {
    fn drop(&mut self) {
        let queue = &self.0;

        // Safety: Created and pinned per GSG-002, or not created per GSG-003.
        // Checking lifecycle conditions per GSG-003. The semaphore is created
        // after the mutex, and deleted before it.
        unsafe {
            if queue.is_created() {
                aborting_assert!(
                    queue.info().waiting_receivers == 0,
                    "Attempt to drop a priority queue with waiting threads"
                );
            }

            let result = crate::tx_sys::tx_semaphore_delete(queue.available.get());
            aborting_assert!(
                result == crate::tx_sys::TX_SUCCESS || result == crate::tx_sys::TX_SEMAPHORE_ERROR,
                "Attempt to drop resource in the initialization context"
            );

            let result = crate::tx_sys::tx_mutex_delete(queue.mutex.get());
            aborting_assert!(
                result == crate::tx_sys::TX_SUCCESS || result == crate::tx_sys::TX_MUTEX_ERROR,
                "Attempt to drop resource in the initialization context"
            );
        }

        // Nothing else can reach the heap now. If an element's drop panics,
        // abort instead of leaking the rest.
        let heap = self.0.heap.0.get_mut();
        crate::panic::abort_on_panic(core::panic::AssertUnwindSafe(|| heap.clear()));
    }
}

impl<T> PriorityQueue<T> {
    /// Allocate a priority queue.
    ///
    /// This does not create the queue, nor does it register the queue's
    /// resources with the operating system. You'll need to use
    /// [`create`](Self::create) for that.
    pub const fn context<'ctx>() -> PriorityQueueContext<'ctx, T> {
        PriorityQueueContext(
            PriorityQueue {
                mutex: ControlBlock::new(),
                available: ControlBlock::new(),
                heap: HeapCell(UnsafeCell::new(Heap::empty())),
                capacity: AtomicUsize::new(0),
            },
            InvariantLifetime::mark(),
        )
    }

    /// Create a priority queue.
    ///
    /// The queue's capacity is the number of `slots`. The queue starts empty.
    ///
    /// If the queue's semaphore can't be created, the already-created
    /// mutex is deleted before the error returns. You never receive a
    /// partially-created queue.
    ///
    /// The slots must outlive the context. Otherwise, the queue would hold
    /// dangling storage.
    ///
    /// ```compile_fail
    /// use triage::priority_queue::{Priority, PriorityQueue, PrioritySlot};
    ///
    /// let queue = core::pin::pin!(PriorityQueue::context());
    /// let mut slots = [const { PrioritySlot::<Priority>::new() }; 5];
    /// PriorityQueue::create(queue.as_ref(), &mut slots, &Default::default()).unwrap();
    /// ```
    pub fn create<'ctx, 'q>(
        context: Pin<&'q PriorityQueueContext<'ctx, T>>,
        slots: &'ctx mut [PrioritySlot<T>],
        opts: &PriorityQueueOptions<'ctx>,
    ) -> Result<&'q Self, CreateError> {
        // Safety: by taking a mutable reference to the slots, we take
        // an exclusive borrow of that memory. The lifetime of the slots
        // must outlive the context, thanks to the lifetime setup.
        unsafe {
            let slots_len = slots.len();
            let slots_ptr = slots.as_mut_ptr();
            Self::create_unchecked(context, slots_ptr, slots_len, opts)
        }
    }

    /// # Safety
    ///
    /// The caller must ensure that the slots live as long as the context,
    /// and that they're exclusively borrowed by the context.
    unsafe fn create_unchecked<'ctx, 'q>(
        context: Pin<&'q PriorityQueueContext<'ctx, T>>,
        slots_ptr: *mut PrioritySlot<T>,
        slots_len: usize,
        opts: &PriorityQueueOptions<'ctx>,
    ) -> Result<&'q Self, CreateError> {
        if slots_len == 0 {
            return Err(CreateError::InvalidSize);
        }

        // Safety: Context pinned per GSG-001. Context tracking the lifetime
        // of the borrowed name per GSG-000.
        //
        // Only one caller can create the mutex. That caller is the only one
        // who touches the heap until the semaphore is created. Before then,
        // the queue isn't created, so there are no handles.
        unsafe {
            let queue = &context.get_ref().0;
            let name = crate::threadx_string(opts.name);

            let result = crate::tx_sys::tx_mutex_create(queue.mutex.get(), name, opts.inheritance as _);
            CreateError::try_from_mutex_result(result)?;

            *queue.heap.0.get() = Heap::from_raw_parts(slots_ptr, slots_len);
            queue.capacity.store(slots_len, Ordering::Release);

            let result = crate::tx_sys::tx_semaphore_create(queue.available.get(), name, 0);
            if let Err(err) = CreateError::try_from_semaphore_result(result) {
                *queue.heap.0.get() = Heap::empty();
                queue.capacity.store(0, Ordering::Release);

                let result = crate::tx_sys::tx_mutex_delete(queue.mutex.get());
                aborting_assert!(
                    result == crate::tx_sys::TX_SUCCESS,
                    "Attempt to drop resource in the initialization context"
                );
                return Err(err);
            }

            Ok(queue)
        }
    }

    fn is_created(&self) -> bool {
        self.available.is_created()
    }

    /// Returns how many elements the queue can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Query the queue.
    ///
    /// The result is a snapshot. Other threads may change the queue before
    /// you look at it.
    pub fn info(&self) -> PriorityQueueInfo<'_> {
        // Safety: resource created and pinned per GSG-002. The name's
        // lifetime is tied to the queue handle. None of the pointers are
        // held across the call.
        unsafe {
            let mut info = PriorityQueueInfo::default();
            let mut name: *mut core::ffi::c_char = core::ptr::null_mut();

            let result = crate::tx_sys::tx_semaphore_info_get(
                self.available.get(),
                &mut name,
                &mut info.available,
                core::ptr::null_mut(),
                &mut info.waiting_receivers,
                core::ptr::null_mut(),
            );

            debug_assert_eq!(result, crate::tx_sys::TX_SUCCESS);
            info.name = crate::from_threadx_string(name);
            info
        }
    }

    /// Lock the heap, waiting up to `wait_option`.
    fn lock_with_wait(&self, wait_option: WaitOption) -> Result<Option<Locked<'_, T>>, WaitError> {
        // Safety: resource pinned and created per GSG-002. We only form
        // a guard once we hold the lock.
        let result = unsafe { crate::tx_sys::tx_mutex_get(self.mutex.get(), wait_option.into()) };
        if result == crate::tx_sys::TX_NOT_AVAILABLE {
            return Ok(None);
        }

        WaitError::try_from_result(result)?;
        Ok(Some(Locked { queue: self }))
    }

    /// Claim one element, waiting up to `wait_option` for one to exist.
    ///
    /// Returns `false` on timeout.
    fn reserve(&self, wait_option: WaitOption) -> Result<bool, WaitError> {
        // Safety: resource pinned and created per GSG-002.
        let result =
            unsafe { crate::tx_sys::tx_semaphore_get(self.available.get(), wait_option.into()) };
        if result == crate::tx_sys::TX_NO_INSTANCE {
            return Ok(false);
        }

        WaitError::try_from_result(result)?;
        Ok(true)
    }

    /// Publish one element, or return an unused claim.
    fn release(&self) {
        // Safety: resource created and pinned per GSG-002. The count never
        // exceeds the capacity, so it can't overflow.
        let result = unsafe { crate::tx_sys::tx_semaphore_put(self.available.get()) };
        debug_assert_eq!(result, crate::tx_sys::TX_SUCCESS);
    }

    /// Receive the most urgent element, waiting up to `wait_option` for one.
    ///
    /// If the wait expires, the result is `Ok(None)`. Otherwise, if there is
    /// no error, you're provided the element in `Ok(Some(...))`. If several
    /// elements share the greatest priority, you get one of them; which one
    /// is unspecified.
    ///
    /// The wait covers the time until an element exists. Once one exists, it's
    /// reserved for you, and the call waits as long as it takes to take it out
    /// of the heap. If that second wait is aborted, or if you asked not to
    /// wait and another thread holds the queue, the reservation is returned
    /// before the call returns. The element stays in the queue for the next
    /// receiver.
    ///
    /// If you're willing to wait forever, use [`receive`](Self::receive). If
    /// you want to return immediately, use [`try_receive`](Self::try_receive).
    pub fn receive_with_wait(&self, wait_option: WaitOption) -> Result<Option<T>, ReceiveError> {
        if !self.reserve(wait_option)? {
            return Ok(None);
        }

        let access = if wait_option.is_no_wait() {
            WaitOption::no_wait()
        } else {
            WaitOption::wait_forever()
        };

        let mut locked = match self.lock_with_wait(access) {
            Ok(Some(locked)) => locked,
            Ok(None) => {
                self.release();
                return Ok(None);
            }
            Err(err) => {
                self.release();
                return Err(err.into());
            }
        };

        let elem = locked.heap().pop();
        debug_assert!(elem.is_some(), "Reserved an element that isn't in the heap");
        Ok(elem)
    }

    /// Receive the most urgent element, blocking until one exists.
    ///
    /// This method can only be used in a thread execution context.
    #[inline]
    pub fn receive(&self) -> Result<T, ReceiveError> {
        // Safety: Since we're waiting forever, we'll never time out. If we
        // never time out, we never produce a None.
        unsafe {
            let elem = self.receive_with_wait(WaitOption::wait_forever())?;
            Ok(elem.unwrap_unchecked())
        }
    }

    /// Try to receive the most urgent element.
    ///
    /// If the queue is empty, or another thread is using it, the result is
    /// `Ok(None)`. Since it never blocks, this can be called from the
    /// initialization context. It can't be called from an interrupt.
    #[inline]
    pub fn try_receive(&self) -> Result<Option<T>, ReceiveError> {
        // Safety: See inline comments. Exhaustive match checks current / future errors.
        unsafe {
            match self.receive_with_wait(WaitOption::no_wait()) {
                Ok(elem) => Ok(elem),
                Err(ReceiveError::Caller) => Err(ReceiveError::Caller),
                // "No wait" is valid in every context that passes the caller check.
                Err(ReceiveError::InvalidWait) => triage_unreachable!(),
                // Since we never wait, there is no wait that can be aborted.
                Err(ReceiveError::WaitAborted) => triage_unreachable!(),
            }
        }
    }
}

impl<T: Prioritized> PriorityQueue<T> {
    /// Send an element, waiting up to `wait_option` for access to the queue.
    ///
    /// The result is one of
    ///
    /// - `Ok(None)`: the element is in the queue, and a waiting receiver
    ///   (if any) was released.
    /// - `Ok(Some(elem))`: the wait expired before the queue was available.
    ///   Nothing changed; here's your element.
    /// - `Err((SendError::Full, elem))`: the queue is full. Nothing changed;
    ///   here's your element. This is checked once you have access to the
    ///   queue, and it never waits for room.
    /// - `Err((err, elem))`: some other error.
    ///
    /// If you're willing to wait forever for access, use [`send`](Self::send).
    /// If you want to return immediately, use [`try_send`](Self::try_send).
    pub fn send_with_wait(
        &self,
        elem: T,
        wait_option: WaitOption,
    ) -> Result<Option<T>, (SendError, T)> {
        let priority = elem.priority();

        let mut locked = match self.lock_with_wait(wait_option) {
            Ok(Some(locked)) => locked,
            Ok(None) => return Ok(Some(elem)),
            Err(err) => return Err((err.into(), elem)),
        };

        if let Err(elem) = locked.heap().push(priority, elem) {
            return Err((SendError::Full, elem));
        }

        drop(locked);
        self.release();
        Ok(None)
    }

    /// Send an element, waiting as long as it takes to access the queue.
    ///
    /// This method can only be used from thread execution contexts. It still
    /// fails right away if the queue is full.
    ///
    /// If an error occurs, the error path returns `elem` to you.
    #[inline]
    pub fn send(&self, elem: T) -> Result<(), (SendError, T)> {
        // Safety: Since we're waiting forever, we'll never time out. If we
        // never time out, we'll never return Some(elem).
        unsafe {
            match self.send_with_wait(elem, WaitOption::wait_forever())? {
                None => Ok(()),
                Some(_) => triage_unreachable!(),
            }
        }
    }

    /// Try to send an element without waiting.
    ///
    /// If another thread is using the queue, the result is `Ok(Some(elem))`.
    /// See [`send_with_wait`](Self::send_with_wait) for the rest.
    ///
    /// Since it never blocks, this can be called from the initialization
    /// context. It can't be called from an interrupt.
    #[inline]
    pub fn try_send(&self, elem: T) -> Result<Option<T>, (SendError, T)> {
        self.send_with_wait(elem, WaitOption::no_wait())
    }
}

/// Holds the queue's mutex. Unlocks on drop.
struct Locked<'q, T> {
    queue: &'q PriorityQueue<T>,
}

impl<T> Locked<'_, T> {
    fn heap(&mut self) -> &mut Heap<T> {
        // Safety: we hold the mutex, and the heap never calls user code, so
        // this thread can't re-enter the queue while the reference lives.
        unsafe { &mut *self.queue.heap.0.get() }
    }
}

impl<T> Drop for Locked<'_, T> {
    fn drop(&mut self) {
        // Safety: resource created and pinned per GSG-002. We locked the
        // mutex on this thread when we made the guard.
        let result = unsafe { crate::tx_sys::tx_mutex_put(self.queue.mutex.get()) };
        debug_assert_eq!(result, crate::tx_sys::TX_SUCCESS);
    }
}

/// A snapshot of the queue's state.
#[derive(Default)]
#[non_exhaustive]
pub struct PriorityQueueInfo<'a> {
    /// The queue's name, set during creation.
    pub name: crate::ResourceName<'a>,
    /// How many elements a receiver can claim without waiting.
    ///
    /// Between operations, this is the number of elements in the queue.
    pub available: u32,
    /// How many threads are blocked waiting for an element.
    pub waiting_receivers: u32,
}

/// Statically allocated `N` slots for a priority queue.
///
/// `N` is the queue's capacity. Use [`take`](Self::take) to acquire the
/// storage, then hand it to [`create`](PriorityQueue::create).
///
/// ```no_run
/// use triage::priority_queue::{Priority, StaticPrioritySlots};
///
/// static SLOTS: StaticPrioritySlots<Priority, 10> = StaticPrioritySlots::new();
///
/// assert!(SLOTS.take().is_some());
/// assert!(SLOTS.take().is_none());
/// ```
///
/// There's no such thing as a queue without room.
///
/// ```compile_fail
/// use triage::priority_queue::{Priority, StaticPrioritySlots};
///
/// static SLOTS: StaticPrioritySlots<Priority, 0> = StaticPrioritySlots::new();
/// ```
pub struct StaticPrioritySlots<T, const N: usize>(crate::StaticCell<[PrioritySlot<T>; N]>);

impl<T, const N: usize> StaticPrioritySlots<T, N> {
    const NOT_EMPTY: () = assert!(N > 0);

    /// Allocate the static slots.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)] // Force evaluation to catch compile-time errors.
        {
            let _ = Self::NOT_EMPTY;
        }
        Self(crate::StaticCell::new([const { PrioritySlot::new() }; N]))
    }

    /// Take the slots, if they haven't been taken already.
    pub fn take(&'static self) -> Option<&'static mut [PrioritySlot<T>]> {
        self.0.take().map(|slots| slots.as_mut_slice())
    }
}

impl<T, const N: usize> Default for StaticPrioritySlots<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
