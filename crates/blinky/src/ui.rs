// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! The producer side: turning button presses into LED events.

use triage::{
    priority_queue::{PriorityQueue, SendError},
    thread,
};

use crate::{BlinkConfig, LedEvent};

/// What the user did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiMessage {
    /// A quick tap. The most urgent.
    Pulse,
    /// A short hold.
    Short,
    /// A long hold. The least urgent.
    Long,
}

impl UiMessage {
    /// How urgently the LED task should react.
    ///
    /// ```
    /// use triage::priority_queue::Priority;
    /// use triage_blinky::UiMessage;
    ///
    /// assert_eq!(UiMessage::Pulse.priority(), Priority::High);
    /// assert_eq!(UiMessage::Short.priority(), Priority::Medium);
    /// assert_eq!(UiMessage::Long.priority(), Priority::Low);
    /// ```
    pub const fn priority(self) -> triage::priority_queue::Priority {
        use triage::priority_queue::Priority;
        match self {
            Self::Pulse => Priority::High,
            Self::Short => Priority::Medium,
            Self::Long => Priority::Low,
        }
    }
}

/// Minimum hold times, in milliseconds, for each [`UiMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PressThresholds {
    /// Anything shorter is contact bounce.
    pub pulse_ms: u32,
    /// Held at least this long, but shorter than `long_ms`, is a
    /// [`Short`](UiMessage::Short) press.
    pub short_ms: u32,
    /// Held at least this long is a [`Long`](UiMessage::Long) press.
    pub long_ms: u32,
}

impl Default for PressThresholds {
    fn default() -> Self {
        Self {
            pulse_ms: 200,
            short_ms: 1000,
            long_ms: 2000,
        }
    }
}

impl PressThresholds {
    /// Classify a press that was held for `held_ms`.
    ///
    /// Returns `None` for bounce.
    pub const fn classify(&self, held_ms: u32) -> Option<UiMessage> {
        if held_ms >= self.long_ms {
            Some(UiMessage::Long)
        } else if held_ms >= self.short_ms {
            Some(UiMessage::Short)
        } else if held_ms >= self.pulse_ms {
            Some(UiMessage::Pulse)
        } else {
            None
        }
    }
}

/// What to do when an event can't be sent right away.
///
/// This covers a full queue, and a queue that another thread is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FullPolicy {
    /// Drop the event.
    #[default]
    Drop,
    /// Try again, up to `attempts` more times, sleeping `backoff_ticks`
    /// between tries.
    ///
    /// In the initialization context, there's no sleep between tries.
    Retry {
        /// Tries after the first.
        attempts: u32,
        /// Zero yields to other ready threads instead of sleeping.
        backoff_ticks: u32,
    },
}

/// The result of [`Ui::post`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Posted {
    /// The LED task will see it.
    Sent,
    /// The event is gone.
    Dropped,
}

/// Counts of everything [`Ui::post`] handled.
///
/// The counters wrap around once they pass `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UiStats {
    /// Events that made it into the queue.
    pub sent: u32,
    /// Events lost to a full or busy queue.
    pub dropped: u32,
}

impl UiStats {
    fn record_sent(&mut self) {
        self.sent = self.sent.wrapping_add(1);
    }

    fn record_dropped(&mut self) {
        self.dropped = self.dropped.wrapping_add(1);
    }
}

/// The UI producer.
///
/// The UI never waits on the queue. It sends with no wait, and it applies
/// its [`FullPolicy`] when that doesn't work out.
pub struct Ui<'q> {
    queue: &'q PriorityQueue<LedEvent>,
    thresholds: PressThresholds,
    policy: FullPolicy,
    stats: UiStats,
}

impl<'q> Ui<'q> {
    /// Produce into `queue`.
    pub fn new(queue: &'q PriorityQueue<LedEvent>, config: &BlinkConfig) -> Self {
        Self {
            queue,
            thresholds: config.thresholds,
            policy: config.full_policy,
            stats: UiStats::default(),
        }
    }

    /// Handle a button press held for `held_ms`.
    ///
    /// Returns `None` if the press was bounce, and nothing was posted.
    pub fn press(&mut self, held_ms: u32) -> Option<Posted> {
        let msg = self.thresholds.classify(held_ms);
        if msg.is_none() {
            debug!("Ignoring a {=u32} ms press", held_ms);
        }
        msg.map(|msg| self.post(msg))
    }

    /// Send the LED event for `msg`.
    pub fn post(&mut self, msg: UiMessage) -> Posted {
        let mut event = LedEvent::from(msg);
        let mut retries = match self.policy {
            FullPolicy::Drop => 0,
            FullPolicy::Retry { attempts, .. } => attempts,
        };

        loop {
            event = match self.queue.try_send(event) {
                Ok(None) => {
                    self.stats.record_sent();
                    debug!("Sent {}", msg);
                    return Posted::Sent;
                }
                Ok(Some(busy)) => busy,
                Err((SendError::Full, full)) => full,
                Err((_, _)) => break,
            };

            if retries == 0 {
                break;
            }
            retries -= 1;
            self.backoff();
        }

        self.stats.record_dropped();
        warn!("Dropped {}", msg);
        Posted::Dropped
    }

    /// What's been sent and dropped so far.
    pub fn stats(&self) -> UiStats {
        self.stats
    }

    fn backoff(&self) {
        let FullPolicy::Retry { backoff_ticks, .. } = self.policy else {
            return;
        };

        if triage::is_initializing() {
            return;
        }

        if backoff_ticks == 0 {
            thread::relinquish();
        } else if thread::sleep(backoff_ticks).is_err() {
            debug!("Backoff cut short");
        }
    }
}
