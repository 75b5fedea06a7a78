// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

#![allow(clippy::assertions_on_constants)]

// Assume nothing is Send.
trait AssumeNotSend {
    const IS_SEND: bool = false;
}
impl<T /* : !Send */> AssumeNotSend for T {}

// Then, check if something is Send. Importantly,
// CheckSend is AssumeNotSend.
struct CheckSend<T>(std::marker::PhantomData<T>);

// This conveniently shadows the `IS_SEND` constant
// introduced by the AssumeNotSend blanket.
impl<T: Send> CheckSend<T> {
    const IS_SEND: bool = true;
}

macro_rules! check_send {
    ($t:ty) => {
        CheckSend::<$t>::IS_SEND
    };
}

// Likewise for Sync.
trait AssumeNotSync {
    const IS_SYNC: bool = false;
}
impl<T /* : !Sync */> AssumeNotSync for T {}

struct CheckSync<T>(std::marker::PhantomData<T>);

impl<T: Sync> CheckSync<T> {
    const IS_SYNC: bool = true;
}

macro_rules! check_sync {
    ($t:ty) => {
        CheckSync::<$t>::IS_SYNC
    };
}

#[test]
fn contexts_not_send() {
    // Sanity check the types above.
    assert!(check_send!(u32)); // A u32 is trivially Send
    assert!(!check_send!(*mut u32)); // But a raw pointer? Not Send.

    // None of the context blocks should be send.
    assert!(!check_send!(triage::priority_queue::PriorityQueueContext<u32>));
    assert!(!check_send!(triage::thread::ThreadContext));
}

#[test]
fn queues_shared_only_for_send_elements() {
    assert!(check_sync!(triage::priority_queue::PriorityQueue<u32>));
    assert!(!check_sync!(
        triage::priority_queue::PriorityQueue<std::rc::Rc<u32>>
    ));
}
