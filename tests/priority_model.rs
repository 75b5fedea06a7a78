// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Random sends and receives, checked against a simple model of the queue.

use std::pin::pin;

use proptest::{
    prelude::*,
    test_runner::{Config, TestCaseResult, TestRunner},
};
use triage::{
    priority_queue::{Priority, PriorityQueue, PrioritySlot, SendError},
    thread::{StaticStack, Thread},
};

const CAPACITY: usize = 8;

static STACK: StaticStack<16384> = StaticStack::new();

#[derive(Debug, Clone, Copy)]
enum Op {
    Send(Priority),
    Receive,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    let priority = prop::sample::select(Priority::ALL.to_vec());
    // Lean toward sends, so the queue spends time both full and empty.
    let op = prop_oneof![3 => priority.prop_map(Op::Send), 2 => Just(Op::Receive)];
    prop::collection::vec(op, 0..300)
}

fn run(queue: &PriorityQueue<(Priority, u32)>, ops: &[Op]) -> TestCaseResult {
    // A failed case can leave elements behind while shrinking.
    while let Ok(Some(_)) = queue.try_receive() {}

    let mut model: Vec<(Priority, u32)> = Vec::new();
    let mut next_id = 0;

    for op in ops {
        match *op {
            Op::Send(priority) => {
                let elem = (priority, next_id);
                next_id += 1;

                let result = queue.try_send(elem);
                if model.len() == CAPACITY {
                    prop_assert_eq!(result, Err((SendError::Full, elem)));
                } else {
                    prop_assert_eq!(result, Ok(None));
                    model.push(elem);
                }
            }
            Op::Receive => {
                let result = queue.try_receive();
                let greatest = model.iter().map(|(priority, _)| *priority).max();
                prop_assert_eq!(result.map(|elem| elem.map(|(priority, _)| priority)), Ok(greatest));

                if let Ok(Some(elem)) = result {
                    let idx = model.iter().position(|held| *held == elem);
                    prop_assert!(idx.is_some(), "{elem:?} was never sent");
                    if let Some(idx) = idx {
                        model.swap_remove(idx);
                    }
                }
            }
        }

        prop_assert_eq!(queue.info().available as usize, model.len());
    }

    // Drain what's left.
    model.sort_by(|a, b| b.0.cmp(&a.0));
    let mut drained = Vec::new();
    while let Ok(Some(elem)) = queue.try_receive() {
        drained.push(elem);
    }
    let priorities: Vec<_> = drained.iter().map(|(priority, _)| *priority).collect();
    let expected: Vec<_> = model.iter().map(|(priority, _)| *priority).collect();
    prop_assert_eq!(priorities, expected);
    Ok(())
}

#[test]
fn main() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("{info}");
        std::process::exit(1);
    }));

    let mut slots = [const { PrioritySlot::new() }; CAPACITY];
    let queue = pin!(PriorityQueue::context());
    let thread = pin!(Thread::context());

    triage::kernel_enter(|app_define| {
        let queue = PriorityQueue::create(queue.into_ref(), &mut slots, &Default::default()).unwrap();
        app_define
            .create_thread(
                thread.into_ref(),
                STACK.take().unwrap(),
                &Default::default(),
                move || {
                    let mut runner = TestRunner::new(Config {
                        cases: 128,
                        failure_persistence: None,
                        ..Config::default()
                    });
                    if let Err(err) = runner.run(&ops(), |ops| run(queue, &ops)) {
                        panic!("{err}");
                    }
                    std::process::exit(0);
                },
            )
            .unwrap();
    });
}
