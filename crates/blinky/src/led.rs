// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! The consumer side: blinking LEDs, most urgent event first.

use embedded_hal::digital::OutputPin;
use triage::{
    priority_queue::{Prioritized, Priority, PriorityQueue, ReceiveError},
    thread,
};

use crate::{BlinkConfig, UiMessage};

/// A request to blink the LED for `priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LedEvent {
    /// Picks the LED, and how soon it blinks.
    pub priority: Priority,
}

impl Prioritized for LedEvent {
    fn priority(&self) -> Priority {
        self.priority
    }
}

impl From<UiMessage> for LedEvent {
    fn from(msg: UiMessage) -> Self {
        Self {
            priority: msg.priority(),
        }
    }
}

/// One of the board's LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Color {
    /// [`Leds::red`].
    Red,
    /// [`Leds::green`].
    Green,
    /// [`Leds::blue`].
    Blue,
}

impl Color {
    /// The LED that shows events of `priority`.
    ///
    /// ```
    /// use triage::priority_queue::Priority;
    /// use triage_blinky::Color;
    ///
    /// assert_eq!(Color::for_priority(Priority::Low), Color::Red);
    /// assert_eq!(Color::for_priority(Priority::Medium), Color::Green);
    /// assert_eq!(Color::for_priority(Priority::High), Color::Blue);
    /// ```
    pub const fn for_priority(priority: Priority) -> Self {
        match priority {
            Priority::Low => Self::Red,
            Priority::Medium => Self::Green,
            Priority::High => Self::Blue,
        }
    }
}

/// The three LED pins.
pub struct Leds<P> {
    /// Shows [`Low`](Priority::Low) events.
    pub red: P,
    /// Shows [`Medium`](Priority::Medium) events.
    pub green: P,
    /// Shows [`High`](Priority::High) events.
    pub blue: P,
}

impl<P> Leds<P> {
    fn pin(&mut self, color: Color) -> &mut P {
        match color {
            Color::Red => &mut self.red,
            Color::Green => &mut self.green,
            Color::Blue => &mut self.blue,
        }
    }
}

/// An error while serving one LED event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServeError<E> {
    /// A pin couldn't be driven.
    ///
    /// The LED may be left on.
    Pin(E),
    /// Nothing was received.
    Receive(ReceiveError),
}

/// The LED consumer.
pub struct LedTask<P> {
    leds: Leds<P>,
    on_ticks: u32,
}

impl<P: OutputPin> LedTask<P> {
    /// Drive `leds`, holding each one on for the configured
    /// [`on_ticks`](BlinkConfig::on_ticks).
    pub fn new(leds: Leds<P>, config: &BlinkConfig) -> Self {
        Self {
            leds,
            on_ticks: config.on_ticks,
        }
    }

    /// Wait for the most urgent event, then blink its LED once.
    ///
    /// The LED stays on for the configured ticks. If the sleep is aborted,
    /// the LED turns off early. Returns the LED that blinked.
    pub fn serve_one(
        &mut self,
        queue: &PriorityQueue<LedEvent>,
    ) -> Result<Color, ServeError<P::Error>> {
        let event = queue.receive().map_err(ServeError::Receive)?;
        let color = Color::for_priority(event.priority);
        let pin = self.leds.pin(color);

        pin.set_high().map_err(ServeError::Pin)?;
        info!("LED {} ON", color);

        if thread::sleep(self.on_ticks).is_err() {
            debug!("LED {} on time cut short", color);
        }

        pin.set_low().map_err(ServeError::Pin)?;
        info!("LED {} OFF", color);

        Ok(color)
    }

    /// Serve events forever.
    pub fn run(mut self, queue: &PriorityQueue<LedEvent>) -> ! {
        info!("LED task started");
        loop {
            if self.serve_one(queue).is_err() {
                warn!("LED task failed to serve an event");
            }
        }
    }

    /// Give back the pins.
    pub fn into_leds(self) -> Leds<P> {
        self.leds
    }
}
