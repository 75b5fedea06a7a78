// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! An LED-blink event dispatcher built on a Triage priority queue.
//!
//! A [`Ui`] turns button presses into [`UiMessage`]s, and each message into
//! an [`LedEvent`] with a priority. The events go through one
//! [`PriorityQueue`]. An [`LedTask`] serves them, most urgent first, by
//! holding one of three LEDs on for a while.
//!
//! | Press | Message | Priority | LED |
//! |---|---|---|---|
//! | 200 ms or more | `Pulse` | `High` | blue |
//! | 1000 ms or more | `Short` | `Medium` | green |
//! | 2000 ms or more | `Long` | `Low` | red |
//!
//! Nothing is global. Whoever creates the queue hands it to the UI and to
//! [`spawn_led_task`].
//!
//! ```no_run
//! use triage::{
//!     priority_queue::{PriorityQueue, PriorityQueueContext, StaticPrioritySlots},
//!     thread::{StaticStack, Thread, ThreadContext, ThreadOptions, make_priority},
//! };
//! use triage_blinky::{BlinkConfig, LedEvent, LedTask, Leds, Ui};
//! use core::pin::Pin;
//! # struct Pin0;
//! # impl embedded_hal::digital::ErrorType for Pin0 { type Error = core::convert::Infallible; }
//! # impl embedded_hal::digital::OutputPin for Pin0 {
//! #     fn set_low(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! #     fn set_high(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # fn board_leds() -> Leds<Pin0> { Leds { red: Pin0, green: Pin0, blue: Pin0 } }
//!
//! static SLOTS: StaticPrioritySlots<LedEvent, 10> = StaticPrioritySlots::new();
//! static QUEUE: PriorityQueueContext<LedEvent> = PriorityQueue::context();
//! static LED_STACK: StaticStack<4096> = StaticStack::new();
//! static LED_THREAD: ThreadContext = Thread::context();
//!
//! fn main() {
//!     triage::kernel_enter(|app_define| {
//!         let config = BlinkConfig::default();
//!         let queue = PriorityQueue::create(
//!             Pin::static_ref(&QUEUE),
//!             SLOTS.take().unwrap(),
//!             &Default::default(),
//!         ).unwrap();
//!
//!         triage_blinky::spawn_led_task(
//!             app_define,
//!             Pin::static_ref(&LED_THREAD),
//!             LED_STACK.take().unwrap(),
//!             &ThreadOptions::single_priority(make_priority(5)),
//!             LedTask::new(board_leds(), &config),
//!             queue,
//!         ).unwrap();
//!
//!         // Hand the same queue to the UI.
//!         let mut ui = Ui::new(queue, &config);
//!         ui.press(1500);
//!     });
//! }
//! ```

#![no_std]
#![warn(missing_docs)]

#[macro_use]
mod log;

mod config;
mod led;
mod ui;

pub use config::{BlinkConfig, TICKS_PER_SECOND, ms_to_ticks};
pub use led::{Color, LedEvent, LedTask, Leds, ServeError};
pub use ui::{FullPolicy, Posted, PressThresholds, Ui, UiMessage, UiStats};

use core::pin::Pin;

use embedded_hal::digital::OutputPin;
use triage::{
    AppDefine,
    priority_queue::PriorityQueue,
    thread::{CreateError, Thread, ThreadContext, ThreadOptions},
};

/// Create the thread that runs `task` against `queue`.
///
/// The thread never returns. `queue` and the pins only need to outlive
/// the call to [`kernel_enter`](triage::kernel_enter).
pub fn spawn_led_task<'t, 'ctx, 'pke, P>(
    app_define: &AppDefine<'_, 'pke>,
    context: Pin<&'t ThreadContext<'ctx>>,
    stack: &'static mut [u8],
    options: &ThreadOptions<'ctx>,
    task: LedTask<P>,
    queue: &'pke PriorityQueue<LedEvent>,
) -> Result<&'t Thread, CreateError>
where
    P: OutputPin + Send + 'pke,
    't: 'pke,
    'ctx: 'pke,
    'ctx: 't,
{
    app_define.create_thread(context, stack, options, move || {
        task.run(queue);
    })
}
