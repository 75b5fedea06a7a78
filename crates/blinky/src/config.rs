// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

use crate::ui::{FullPolicy, PressThresholds};

/// The kernel's tick rate assumed by the defaults.
///
/// This is the ThreadX default, `TX_TIMER_TICKS_PER_SECOND`.
pub const TICKS_PER_SECOND: u32 = 100;

/// Convert milliseconds to ticks at [`TICKS_PER_SECOND`], rounding up.
///
/// ```
/// use triage_blinky::ms_to_ticks;
///
/// assert_eq!(ms_to_ticks(5000), 500);
/// assert_eq!(ms_to_ticks(1), 1);
/// assert_eq!(ms_to_ticks(0), 0);
/// ```
pub const fn ms_to_ticks(ms: u32) -> u32 {
    ms.saturating_mul(TICKS_PER_SECOND).div_ceil(1000)
}

/// How the demo behaves.
///
/// ```
/// use triage_blinky::{BlinkConfig, FullPolicy, ms_to_ticks};
///
/// let config = BlinkConfig::default();
/// assert_eq!(config.on_ticks, ms_to_ticks(5000));
/// assert_eq!(config.thresholds.pulse_ms, 200);
/// assert_eq!(config.thresholds.short_ms, 1000);
/// assert_eq!(config.thresholds.long_ms, 2000);
/// assert_eq!(config.full_policy, FullPolicy::Drop);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct BlinkConfig {
    /// How long an LED stays lit for one event.
    pub on_ticks: u32,
    /// How button presses become UI messages.
    pub thresholds: PressThresholds,
    /// What the UI does when the LED queue is full.
    pub full_policy: FullPolicy,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            on_ticks: ms_to_ticks(5000),
            thresholds: PressThresholds::default(),
            full_policy: FullPolicy::Drop,
        }
    }
}
