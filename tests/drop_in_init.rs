// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! If a resource is dropped in the initialization context, the program aborts.
//!
//! The test runs with no additional command-line arguments. The program will
//! re-run itself with an argument that specifies a function name. That run
//! is expected to abort.

use std::collections::HashMap;
use std::env::args;
use std::pin::pin;
use std::process::Command;

fn priority_queue() {
    use triage::priority_queue::{Priority, PriorityQueue, PrioritySlot};

    triage::kernel_enter(|_| {
        let mut slots = [const { PrioritySlot::<Priority>::new() }; 10];
        let queue = pin!(PriorityQueue::context());
        let queue = PriorityQueue::create(queue.into_ref(), &mut slots, &Default::default()).unwrap();
        assert!(matches!(queue.try_send(Priority::Medium), Ok(None)));
    });
}

fn thread() {
    use triage::thread::{StaticStack, Thread};

    triage::kernel_enter(|_| {
        static STACK: StaticStack<4096> = StaticStack::new();
        let thread = pin!(Thread::context());
        Thread::create(
            thread.into_ref(),
            STACK.take().unwrap(),
            &Default::default(),
            || (),
        )
        .unwrap();
    });
}

fn main() {
    macro_rules! test_case {
        ($ident:ident) => {
            (stringify!($ident), $ident as fn())
        };
    }

    let name_to_test: HashMap<_, fn()> = [test_case!(priority_queue), test_case!(thread)]
        .into_iter()
        .collect();

    let mut args = args();
    let myself = args.next().unwrap();

    if let Some(test_name) = args.next() {
        (name_to_test.get(test_name.as_str()).unwrap())()
    } else {
        for test_name in name_to_test.keys() {
            let test_result = Command::new(&myself).arg(test_name).output().unwrap();
            assert!(!test_result.status.success(), "{test_name}");

            let stderr = String::from_utf8(test_result.stderr).unwrap();
            assert!(
                stderr.contains("Attempt to drop resource in the initialization context"),
                "{test_name}"
            );
            assert!(
                stderr.contains("Aborting the Triage program"),
                "{test_name}"
            );
        }
    }
}
