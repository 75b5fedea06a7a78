// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! The most urgent element always comes out first, no matter the order
//! of insertion.

use std::pin::pin;

use triage::{
    priority_queue::{Prioritized, Priority, PriorityQueue, PrioritySlot},
    thread::{StaticStack, Thread},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Job {
    priority: Priority,
    id: u32,
}

impl Prioritized for Job {
    fn priority(&self) -> Priority {
        self.priority
    }
}

const fn job(priority: Priority, id: u32) -> Job {
    Job { priority, id }
}

static STACK: StaticStack<4096> = StaticStack::new();

#[test]
fn main() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("{info}");
        std::process::exit(1);
    }));

    let mut slots = [const { PrioritySlot::new() }; 10];
    let queue = pin!(PriorityQueue::context());
    let thread = pin!(Thread::context());

    triage::kernel_enter(|app_define| {
        let queue = PriorityQueue::create(queue.into_ref(), &mut slots, &Default::default()).unwrap();
        assert_eq!(queue.capacity(), 10);

        // Sending works before the kernel runs.
        for (priority, id) in [(Priority::Low, 0), (Priority::High, 1), (Priority::Medium, 2)] {
            assert_eq!(queue.try_send(job(priority, id)), Ok(None));
        }
        assert_eq!(queue.info().available, 3);

        // So does receiving.
        assert_eq!(queue.try_receive(), Ok(Some(job(Priority::High, 1))));
        assert_eq!(queue.info().available, 2);

        app_define
            .create_thread(
                thread.into_ref(),
                STACK.take().unwrap(),
                &Default::default(),
                move || {
                    assert_eq!(queue.receive(), Ok(job(Priority::Medium, 2)));
                    assert_eq!(queue.receive(), Ok(job(Priority::Low, 0)));
                    assert_eq!(queue.try_receive(), Ok(None));

                    // Every permutation of three priorities, with repeats.
                    let inserts = [
                        Priority::Medium,
                        Priority::Low,
                        Priority::High,
                        Priority::Low,
                        Priority::High,
                        Priority::Medium,
                        Priority::Low,
                    ];
                    for (id, priority) in inserts.into_iter().enumerate() {
                        queue.send(job(priority, id as u32)).unwrap();
                    }
                    assert_eq!(queue.info().available, inserts.len() as u32);

                    let mut received = Vec::new();
                    while let Some(job) = queue.try_receive().unwrap() {
                        received.push(job);
                    }
                    let priorities: Vec<_> = received.iter().map(|job| job.priority).collect();
                    assert_eq!(
                        priorities,
                        [
                            Priority::High,
                            Priority::High,
                            Priority::Medium,
                            Priority::Medium,
                            Priority::Low,
                            Priority::Low,
                            Priority::Low,
                        ]
                    );

                    // Ties come out in some order, but they all come out.
                    let mut ids: Vec<_> = received.iter().map(|job| job.id).collect();
                    ids.sort();
                    assert_eq!(ids, [0, 1, 2, 3, 4, 5, 6]);

                    assert_eq!(queue.info().available, 0);
                    std::process::exit(0);
                },
            )
            .unwrap();
    });
}
