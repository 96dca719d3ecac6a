//! The device's main loop.
//!
//! Every tick first decides whether a fetch is due and, if so, runs it and
//! applies its outcome to the timers and the display. Then it reads the switch
//! and light sensor and drives the LED and display power. Inputs are handled on
//! every tick, whether or not a fetch ran.
//!
//! The loop owns all of its state; nothing here is shared or locked.

use crate::config::{LoopConfig, UserConfig};
use crate::display::{DisplayController, DisplayDriver};
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::hardware::{Led, LightSensor, Switch};
use crate::input::{InputMonitor, InputReading, PowerState};
use crate::logging;
use crate::schedule::LoopTimers;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Text shown while the device cannot reach the Internet.
pub const NO_INTERNET_TEXT: &str = "No Internet connection.";

/// Text shown while the switch is held past the debug threshold.
pub const DEBUG_MODE_TEXT: &str = "DEBUG MODE";

/// Hardware the loop drives.
pub struct Peripherals {
    /// Momentary switch.
    pub switch: Box<dyn Switch>,
    /// Lid light sensor.
    pub light_sensor: Box<dyn LightSensor>,
    /// Indicator LED.
    pub led: Box<dyn Led>,
    /// Display panel.
    pub display: Box<dyn DisplayDriver>,
}

/// Fetch/display control loop.
pub struct ControlLoop {
    config: UserConfig,
    settings: LoopConfig,
    fetcher: Fetcher,
    timers: LoopTimers,
    input: InputMonitor,
    switch: Box<dyn Switch>,
    light_sensor: Box<dyn LightSensor>,
    led: Box<dyn Led>,
    display: DisplayController<Box<dyn DisplayDriver>>,
}

impl ControlLoop {
    /// Creates the loop. The first tick fetches immediately.
    #[must_use]
    pub fn new(
        config: UserConfig,
        settings: LoopConfig,
        fetcher: Fetcher,
        peripherals: Peripherals,
    ) -> Self {
        Self {
            input: InputMonitor::new(&settings),
            config,
            settings,
            fetcher,
            timers: LoopTimers::new(),
            switch: peripherals.switch,
            light_sensor: peripherals.light_sensor,
            led: peripherals.led,
            display: DisplayController::new(peripherals.display),
        }
    }

    /// Runs forever, pausing `tick` between iterations.
    pub async fn run(mut self) {
        info!(
            fetch_delay_secs = self.settings.fetch_delay.as_secs(),
            tick_ms = self.settings.tick.as_millis(),
            "Entering control loop"
        );
        loop {
            self.tick(Instant::now()).await;
            tokio::time::sleep(self.settings.tick).await;
        }
    }

    /// Runs one iteration at `now`. Returns the fetch outcome if a fetch ran.
    #[instrument(name = "ControlLoop::tick", skip_all)]
    pub async fn tick(&mut self, now: Instant) -> Option<FetchOutcome> {
        let outcome = if self.timers.fetch_due(now, self.settings.fetch_delay) {
            let outcome = self.fetcher.fetch(&self.config).await;
            debug!(outcome = %outcome, "Fetch attempt finished");
            self.timers.record(&outcome, now, &self.settings);
            self.apply(&outcome);
            Some(outcome)
        } else {
            None
        };

        self.handle_inputs(now);

        outcome
    }

    fn apply(&mut self, outcome: &FetchOutcome) {
        match outcome {
            // Outcomes that set the display text are not mirrored, so a repeated
            // outcome never redraws.
            FetchOutcome::Success(text) => {
                info!(
                    "Fetch successful. Waiting {}s before fetching again.",
                    self.settings.fetch_delay.as_secs()
                );
                self.display.update_text(text);
            }
            FetchOutcome::NoInternet => {
                warn!(
                    "No Internet connection during fetch. Sleeping {}s before cycling.",
                    self.settings.no_internet_delay.as_secs()
                );
                self.display.update_text(NO_INTERNET_TEXT);
            }
            FetchOutcome::NoMatchingMessage => {
                self.report("No message found from whitelisted senders.");
                self.report(&format!(
                    "Sleeping {}s before cycling.",
                    self.settings.fetch_delay.as_secs()
                ));
            }
            FetchOutcome::UnknownFailure(detail) => {
                let message = format!("An unknown error occurred: {detail}. Cycling.");
                error!("{message}");
                self.mirror(&message);
            }
        }
    }

    fn handle_inputs(&mut self, now: Instant) {
        let reading = InputReading {
            switch_pressed: self.switch.is_pressed(),
            light_level: self.light_sensor.level(),
        };
        let decision = self.input.observe(reading, now);

        if decision.debug_latched_now {
            info!("Debug mode enabled.");
        }
        if decision.debug_held {
            self.display.update_text(DEBUG_MODE_TEXT);
        }

        match decision.power {
            PowerState::Awake => {
                self.led.disable();
                self.display.turn_on();
            }
            PowerState::Dormant => {
                self.led.enable();
                self.display.turn_off();
            }
        }
    }

    fn report(&mut self, message: &str) {
        info!("{message}");
        self.mirror(message);
    }

    /// In debug mode, loop log lines that do not set the display text are also
    /// shown on it.
    fn mirror(&mut self, message: &str) {
        if self.input.debug_mode() {
            self.display.update_text(&logging::stamp(message));
        }
    }

    /// Whether debug mode has latched.
    #[must_use]
    pub fn debug_mode(&self) -> bool {
        self.input.debug_mode()
    }

    /// Current fetch timers.
    #[must_use]
    pub fn timers(&self) -> &LoopTimers {
        &self.timers
    }

    /// Text currently on the display.
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.display.text()
    }

    /// Whether the display is powered.
    #[must_use]
    pub fn display_is_on(&self) -> bool {
        self.display.is_on()
    }
}
