//! In-memory peripherals and mailbox.
//!
//! Every type here is a cheap handle over shared state: clone it, hand one copy to
//! the control loop and keep the other to drive inputs or inspect what the loop
//! did.
//!
//! ```
//! use companion_cube::hardware::Switch;
//! use companion_cube::sim::SimSwitch;
//!
//! let handle = SimSwitch::new();
//! let mut device = handle.clone();
//! handle.press();
//! assert!(device.is_pressed());
//! ```

use crate::connectivity::ConnectivityProbe;
use crate::config::UserConfig;
use crate::display::DisplayDriver;
use crate::error::{Error, Result};
use crate::hardware::{Led, LightSensor, Switch};
use crate::mail::{Attachment, MailSession, MailTransport, Message, MessageId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Switch whose state is set by hand.
#[derive(Debug, Clone, Default)]
pub struct SimSwitch {
    pressed: Arc<AtomicBool>,
}

impl SimSwitch {
    /// Creates a released switch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds the switch down.
    pub fn press(&self) {
        self.pressed.store(true, Ordering::SeqCst);
    }

    /// Lets go of the switch.
    pub fn release(&self) {
        self.pressed.store(false, Ordering::SeqCst);
    }
}

impl Switch for SimSwitch {
    fn is_pressed(&mut self) -> bool {
        self.pressed.load(Ordering::SeqCst)
    }
}

/// Light sensor reporting a level set by hand.
#[derive(Debug, Clone, Default)]
pub struct SimLightSensor {
    level: Arc<AtomicU16>,
}

impl SimLightSensor {
    /// Creates a sensor reading `level`.
    #[must_use]
    pub fn new(level: u16) -> Self {
        Self {
            level: Arc::new(AtomicU16::new(level)),
        }
    }

    /// Changes the reported level.
    pub fn set_level(&self, level: u16) {
        self.level.store(level, Ordering::SeqCst);
    }
}

impl LightSensor for SimLightSensor {
    fn level(&mut self) -> u16 {
        self.level.load(Ordering::SeqCst)
    }
}

/// LED that remembers its last state.
#[derive(Debug, Clone, Default)]
pub struct SimLed {
    state: Arc<Mutex<Option<bool>>>,
}

impl SimLed {
    /// Creates an LED that was never driven.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last driven state, `None` if never driven.
    #[must_use]
    pub fn is_enabled(&self) -> Option<bool> {
        *lock(&self.state)
    }
}

impl Led for SimLed {
    fn enable(&mut self) {
        *lock(&self.state) = Some(true);
    }

    fn disable(&mut self) {
        *lock(&self.state) = Some(false);
    }
}

#[derive(Debug, Default)]
struct DisplayLog {
    draws: Vec<String>,
    power: Vec<bool>,
}

/// Display driver recording every call it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay {
    log: Arc<Mutex<DisplayLog>>,
}

impl RecordingDisplay {
    /// Creates a display with an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every text drawn, in order.
    #[must_use]
    pub fn draws(&self) -> Vec<String> {
        lock(&self.log).draws.clone()
    }

    /// Returns the most recently drawn text.
    #[must_use]
    pub fn last_text(&self) -> Option<String> {
        lock(&self.log).draws.last().cloned()
    }

    /// Returns every power change, `true` for on.
    #[must_use]
    pub fn power_changes(&self) -> Vec<bool> {
        lock(&self.log).power.clone()
    }

    /// Returns whether the panel is currently powered.
    #[must_use]
    pub fn is_on(&self) -> bool {
        lock(&self.log).power.last().copied().unwrap_or(false)
    }
}

impl DisplayDriver for RecordingDisplay {
    fn draw_text(&mut self, text: &str) {
        lock(&self.log).draws.push(text.to_string());
    }

    fn turn_on(&mut self) {
        lock(&self.log).power.push(true);
    }

    fn turn_off(&mut self) {
        lock(&self.log).power.push(false);
    }
}

/// Connectivity probe with a switchable answer.
#[derive(Debug, Clone)]
pub struct SimProbe {
    online: Arc<AtomicBool>,
    checks: Arc<AtomicUsize>,
}

impl SimProbe {
    /// Creates a probe answering `online`.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
            checks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Changes the answer.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns how many times the probe was asked.
    #[must_use]
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for SimProbe {
    async fn is_online(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.online.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct MailboxState {
    messages: Vec<(Message, bool)>,
    opens: usize,
    closes: usize,
    fail_open: Option<String>,
    fail_read: Option<String>,
}

/// Mailbox holding messages in memory.
///
/// Each open session lists the unread messages at its first read, like an IMAP
/// `SEARCH UNSEEN`, then yields them in delivery order.
#[derive(Debug, Clone, Default)]
pub struct SimMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl SimMailbox {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unread message.
    pub fn deliver(&self, message: Message) {
        lock(&self.state).messages.push((message, false));
    }

    /// Makes the next `open` fail with a transport error.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        lock(&self.state).fail_open = Some(reason.into());
    }

    /// Makes the next message read fail with a transport error.
    pub fn fail_next_read(&self, reason: impl Into<String>) {
        lock(&self.state).fail_read = Some(reason.into());
    }

    /// Returns how many sessions were opened.
    #[must_use]
    pub fn opens(&self) -> usize {
        lock(&self.state).opens
    }

    /// Returns how many sessions were closed.
    #[must_use]
    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }

    /// Returns the ids of messages flagged as seen, in delivery order.
    #[must_use]
    pub fn seen(&self) -> Vec<MessageId> {
        lock(&self.state)
            .messages
            .iter()
            .filter(|(_, seen)| *seen)
            .map(|(m, _)| m.id)
            .collect()
    }

    /// Returns how many messages are still unread.
    #[must_use]
    pub fn unread(&self) -> usize {
        lock(&self.state)
            .messages
            .iter()
            .filter(|(_, seen)| !*seen)
            .count()
    }
}

#[async_trait]
impl MailTransport for SimMailbox {
    async fn open(&self, _config: &UserConfig) -> Result<Box<dyn MailSession>> {
        let mut state = lock(&self.state);
        if let Some(message) = state.fail_open.take() {
            return Err(Error::Transport { message });
        }
        state.opens += 1;
        Ok(Box::new(SimSession {
            state: Arc::clone(&self.state),
            pending: None,
        }))
    }
}

struct SimSession {
    state: Arc<Mutex<MailboxState>>,
    pending: Option<Vec<Message>>,
}

#[async_trait]
impl MailSession for SimSession {
    async fn next_unread(&mut self) -> Result<Option<Message>> {
        let mut state = lock(&self.state);
        if let Some(message) = state.fail_read.take() {
            return Err(Error::Transport { message });
        }
        let pending = self.pending.get_or_insert_with(|| {
            state
                .messages
                .iter()
                .rev()
                .filter(|(_, seen)| !*seen)
                .map(|(m, _)| m.clone())
                .collect()
        });
        Ok(pending.pop())
    }

    async fn mark_seen(&mut self, id: MessageId) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(entry) = state.messages.iter_mut().find(|(m, _)| m.id == id) {
            entry.1 = true;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        lock(&self.state).closes += 1;
        Ok(())
    }
}

/// Builds a message from `sender` with text attachments given as `(filename, content)`.
#[must_use]
pub fn message(uid: u32, sender: &str, attachments: &[(&str, &str)]) -> Message {
    Message {
        id: MessageId(uid),
        sender: Some(sender.to_string()),
        attachments: attachments
            .iter()
            .map(|(name, content)| Attachment::new(*name, *content))
            .collect(),
    }
}
