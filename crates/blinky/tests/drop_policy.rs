// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! A full LED queue drops events by default. With retries, the UI waits for
//! the LED task to make room.

use std::{
    pin::pin,
    sync::atomic::{AtomicU8, Ordering},
};

use triage::{
    priority_queue::{Priority, PriorityQueue, PrioritySlot},
    thread::{StaticStack, Thread, ThreadOptions, make_priority},
};
use triage_blinky::{BlinkConfig, FullPolicy, LedEvent, Posted, Ui, UiMessage, UiStats};

static PRODUCER_STACK: StaticStack<4096> = StaticStack::new();
static CONSUMER_STACK: StaticStack<4096> = StaticStack::new();

/// What the consumer took out. Zero means nothing yet.
static TAKEN: AtomicU8 = AtomicU8::new(0);

fn retrying(attempts: u32, backoff_ticks: u32) -> BlinkConfig {
    let mut config = BlinkConfig::default();
    config.full_policy = FullPolicy::Retry {
        attempts,
        backoff_ticks,
    };
    config
}

#[test]
fn main() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("{info}");
        std::process::exit(1);
    }));

    let mut slots = [const { PrioritySlot::new() }; 2];
    let queue = pin!(PriorityQueue::context());
    let producer = pin!(Thread::context());
    let consumer = pin!(Thread::context());

    triage::kernel_enter(|app_define| {
        let queue = PriorityQueue::create(queue.into_ref(), &mut slots, &Default::default()).unwrap();

        let mut ui = Ui::new(queue, &BlinkConfig::default());
        assert_eq!(ui.post(UiMessage::Long), Posted::Sent);
        assert_eq!(ui.post(UiMessage::Long), Posted::Sent);
        assert_eq!(ui.post(UiMessage::Pulse), Posted::Dropped);
        assert_eq!(ui.stats(), UiStats { sent: 2, dropped: 1 });
        assert_eq!(queue.info().available, 2);

        // Lower priority than the producer. It only runs once the producer
        // backs off.
        app_define
            .create_thread(
                consumer.into_ref(),
                CONSUMER_STACK.take().unwrap(),
                &ThreadOptions::single_priority(make_priority(20)),
                move || {
                    let event: LedEvent = queue.receive().unwrap();
                    TAKEN.store(event.priority as u8 + 1, Ordering::SeqCst);
                },
            )
            .unwrap();

        app_define
            .create_thread(
                producer.into_ref(),
                PRODUCER_STACK.take().unwrap(),
                &ThreadOptions::single_priority(make_priority(10)),
                move || {
                    let mut ui = Ui::new(queue, &retrying(3, 2));
                    assert_eq!(ui.post(UiMessage::Pulse), Posted::Sent);
                    assert_eq!(TAKEN.load(Ordering::SeqCst), Priority::Low as u8 + 1);

                    // Nobody makes room this time.
                    let mut ui = Ui::new(queue, &retrying(2, 1));
                    let start = triage::get_time();
                    assert_eq!(ui.post(UiMessage::Short), Posted::Dropped);
                    assert!(triage::get_time() - start >= 2);

                    assert_eq!(queue.info().available, 2);
                    assert_eq!(
                        queue.try_receive().unwrap(),
                        Some(LedEvent {
                            priority: Priority::High
                        })
                    );
                    assert_eq!(
                        queue.try_receive().unwrap(),
                        Some(LedEvent {
                            priority: Priority::Low
                        })
                    );
                    assert_eq!(queue.try_receive().unwrap(), None);
                    std::process::exit(0);
                },
            )
            .unwrap();
    });
}
