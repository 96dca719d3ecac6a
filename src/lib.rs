//! # companion-cube
//!
//! Controller for an unattended mail-to-display device.
//!
//! The device polls an IMAP inbox for unread messages from whitelisted senders,
//! shows the first attachment of the first match on its display, and powers the
//! display and an indicator LED according to a lid light sensor and a momentary
//! switch. Holding the switch long enough turns on debug mode, which mirrors log
//! lines onto the display.
//!
//! ## Structure
//!
//! - [`startup::prepare`] checks connectivity and loads the [`UserConfig`]
//! - [`Fetcher`] runs one fetch attempt and folds every failure into a [`FetchOutcome`]
//! - [`ControlLoop`] ticks forever: maybe fetch, then read inputs and drive outputs
//! - [`hardware`] and [`display`] define the peripheral seams; [`sim`] has
//!   in-memory versions of all of them
//!
//! ## Driving the loop by hand
//!
//! ```
//! use companion_cube::sim::{self, RecordingDisplay, SimLed, SimLightSensor, SimMailbox, SimProbe, SimSwitch};
//! use companion_cube::{ControlLoop, FetchOutcome, Fetcher, LoopConfig, Peripherals, UserConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> companion_cube::Result<()> {
//! let config = UserConfig::parse(
//!     r#"
//!     whitelist = ["friend@example.com"]
//!     username = "cube@example.com"
//!     password = "app-password"
//!     imap-url = "imaps://imap.example.com"
//!     "#,
//!     "inline",
//! )?;
//!
//! let mailbox = SimMailbox::new();
//! mailbox.deliver(sim::message(1, "friend@example.com", &[("note.txt", "Hello")]));
//!
//! let mut control = ControlLoop::new(
//!     config,
//!     LoopConfig::default(),
//!     Fetcher::new(SimProbe::new(true), mailbox),
//!     Peripherals {
//!         switch: Box::new(SimSwitch::new()),
//!         light_sensor: Box::new(SimLightSensor::new(0)),
//!         led: Box::new(SimLed::new()),
//!         display: Box::new(RecordingDisplay::new()),
//!     },
//! );
//!
//! let outcome = control.tick(tokio::time::Instant::now()).await;
//! assert_eq!(outcome, Some(FetchOutcome::Success("Hello".into())));
//! assert_eq!(control.display_text(), "Hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every [`Error`] is either fatal or not, see [`Error::severity`]. Fatal errors
//! only occur during startup and end the process; an external supervisor is
//! expected to restart it. Errors during a fetch attempt never leave the
//! [`Fetcher`].
//!
//! ## Observability
//!
//! All logging goes through `tracing`. The binary installs [`logging::init`],
//! which writes every event to an append-only file as
//! `[MM-DD-YYYY HH:MM:SS]   message` and echoes it to the console.
//!
//! ### Span Naming Convention
//!
//! - `ControlLoop::tick` - One loop iteration
//! - `Fetcher::fetch` - One fetch attempt
//! - `ImapTransport::open` - Connect, login and select
//! - `selector::select_message` - Unread scan
//! - `session::authenticate` - IMAP authentication
//! - `connection::establish_tls` - TLS connection
//! - `startup::prepare` - Startup checks

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod config;
pub mod connectivity;
pub mod control;
pub mod display;
pub mod error;
pub mod fetcher;
pub mod hardware;
pub mod input;
pub mod logging;
pub mod mail;
pub mod schedule;
pub mod selector;
pub mod sim;
pub mod startup;

// Re-exports for ergonomic API
pub use config::{ImapUrl, LoopConfig, TimeoutConfig, UserConfig, UserConfigBuilder};
pub use connectivity::{ConnectivityProbe, TcpProbe};
pub use control::{ControlLoop, Peripherals};
pub use display::{DisplayController, DisplayDriver, TerminalDisplay};
pub use email_address::EmailAddress;
pub use error::{Error, ErrorCategory, Result, Severity};
pub use fetcher::{FetchOutcome, Fetcher};
pub use mail::{ImapTransport, MailSession, MailTransport, Message};
pub use schedule::LoopTimers;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _ = UserConfig::builder();
        let _ = LoopConfig::default();
        let _ = TimeoutConfig::default();
        let _ = ImapTransport::default();
        let _ = TcpProbe::default();
    }
}
