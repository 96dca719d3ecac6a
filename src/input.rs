//! Switch and light sensor interpretation.
//!
//! [`InputMonitor::observe`] is called once per tick with the live readings and
//! returns what the loop should do with the LED, the display power and the
//! debug overlay. It keeps two pieces of state: when the current press started
//! and whether debug mode has latched.

use crate::config::LoopConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Raw readings taken at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputReading {
    /// Whether the switch is held down.
    pub switch_pressed: bool,
    /// Light sensor level.
    pub light_level: u16,
}

/// Desired power state of the LED and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Lid open or switch pressed: display on, LED off.
    Awake,
    /// Dark and untouched: display off, LED on.
    Dormant,
}

/// What the loop should do after one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDecision {
    /// LED and display power.
    pub power: PowerState,
    /// The switch has been held past the debug threshold this tick.
    pub debug_held: bool,
    /// Debug mode latched on at this tick.
    pub debug_latched_now: bool,
}

/// Tracks switch presses across ticks.
#[derive(Debug, Clone)]
pub struct InputMonitor {
    switch_press_started_at: Option<Instant>,
    debug_mode: bool,
    debug_switch_press: Duration,
    light_sensor_threshold: u16,
}

impl InputMonitor {
    /// Creates a monitor with no press in progress and debug mode off.
    #[must_use]
    pub fn new(settings: &LoopConfig) -> Self {
        Self {
            switch_press_started_at: None,
            debug_mode: false,
            debug_switch_press: settings.debug_switch_press,
            light_sensor_threshold: settings.light_sensor_threshold,
        }
    }

    /// Whether debug mode has latched. It never resets.
    #[must_use]
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Start of the current press, `None` while released.
    #[must_use]
    pub fn switch_press_started_at(&self) -> Option<Instant> {
        self.switch_press_started_at
    }

    /// Updates press tracking with `reading` taken at `now`.
    ///
    /// The first pressed tick only records the start; the threshold is checked
    /// from the second pressed tick on. Releasing clears the start immediately.
    pub fn observe(&mut self, reading: InputReading, now: Instant) -> InputDecision {
        let mut debug_held = false;
        let mut debug_latched_now = false;

        if reading.switch_pressed {
            match self.switch_press_started_at {
                None => self.switch_press_started_at = Some(now),
                Some(started) => {
                    if now.saturating_duration_since(started) >= self.debug_switch_press {
                        debug_held = true;
                        if !self.debug_mode {
                            self.debug_mode = true;
                            debug_latched_now = true;
                        }
                    }
                }
            }
        } else {
            self.switch_press_started_at = None;
        }

        InputDecision {
            power: power_state(reading, self.light_sensor_threshold),
            debug_held,
            debug_latched_now,
        }
    }
}

/// Power rule: awake when the light reaches `threshold` or the switch is held.
#[must_use]
pub fn power_state(reading: InputReading, threshold: u16) -> PowerState {
    if reading.light_level >= threshold || reading.switch_pressed {
        PowerState::Awake
    } else {
        PowerState::Dormant
    }
}
