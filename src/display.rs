//! Display driver seam and the controller that deduplicates redraws.

use crate::error::{Error, Result};
use std::io::Write;
use tracing::debug;

/// Driver of the physical display.
///
/// Rendering (fonts, layout, panel protocol) is the driver's concern.
pub trait DisplayDriver {
    /// Renders `text`, replacing whatever was shown.
    fn draw_text(&mut self, text: &str);
    /// Powers the panel on.
    fn turn_on(&mut self);
    /// Powers the panel off.
    fn turn_off(&mut self);
}

impl<T: DisplayDriver + ?Sized> DisplayDriver for Box<T> {
    fn draw_text(&mut self, text: &str) {
        (**self).draw_text(text);
    }

    fn turn_on(&mut self) {
        (**self).turn_on();
    }

    fn turn_off(&mut self) {
        (**self).turn_off();
    }
}

/// Tracks what the display shows and forwards only actual changes to the driver.
///
/// Text starts empty and the power state unknown, so the first power call always
/// reaches the driver.
#[derive(Debug)]
pub struct DisplayController<D> {
    driver: D,
    text: String,
    powered: Option<bool>,
}

impl<D: DisplayDriver> DisplayController<D> {
    /// Wraps an initialized driver.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            text: String::new(),
            powered: None,
        }
    }

    /// Returns the text currently shown.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns whether the panel is powered.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.powered.unwrap_or(false)
    }

    /// Shows `text` unless it is already shown. Returns whether a redraw happened.
    pub fn update_text(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        debug!(len = text.len(), "Redrawing display");
        text.clone_into(&mut self.text);
        self.driver.draw_text(text);
        true
    }

    /// Powers the panel on.
    pub fn turn_on(&mut self) {
        if self.powered != Some(true) {
            self.powered = Some(true);
            self.driver.turn_on();
        }
    }

    /// Powers the panel off.
    pub fn turn_off(&mut self) {
        if self.powered != Some(false) {
            self.powered = Some(false);
            self.driver.turn_off();
        }
    }

    /// Returns the wrapped driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }
}

/// Display stand-in that echoes text and power changes to a terminal.
///
/// Used on hosts without a panel attached, and as the default when no panel
/// driver is configured.
#[derive(Debug)]
pub struct TerminalDisplay<W: Write> {
    out: W,
}

impl TerminalDisplay<std::io::Stdout> {
    /// Opens the display on standard output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DisplayInit`] if standard output is not writable.
    pub fn stdout() -> Result<Self> {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    /// Opens the display on `out`, writing a banner to check it is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DisplayInit`] if the banner cannot be written.
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "[display] ready")
            .and_then(|()| out.flush())
            .map_err(|e| Error::DisplayInit {
                message: e.to_string(),
            })?;
        Ok(Self { out })
    }

    fn emit(&mut self, line: &str) {
        // A terminal that went away is not worth stopping the device for.
        let _ = writeln!(self.out, "{line}").and_then(|()| self.out.flush());
    }
}

impl<W: Write> DisplayDriver for TerminalDisplay<W> {
    fn draw_text(&mut self, text: &str) {
        self.emit("[display] ----------------");
        for line in text.lines() {
            self.emit(&format!("[display] {line}"));
        }
        self.emit("[display] ----------------");
    }

    fn turn_on(&mut self) {
        self.emit("[display] power on");
    }

    fn turn_off(&mut self) {
        self.emit("[display] power off");
    }
}
