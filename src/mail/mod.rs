//! Mail transport seam.
//!
//! The fetcher talks to the mailbox only through [`MailTransport`] and
//! [`MailSession`]. [`ImapTransport`] is the production implementation;
//! [`crate::sim::SimMailbox`] is an in-memory one for tests.
//!
//! A session is opened for one fetch attempt and closed before the attempt
//! returns. It yields unread messages lazily, one at a time, in whatever order the
//! server reports them.

mod connection;
mod imap;
mod parser;
mod session;

pub use imap::ImapTransport;

use crate::config::UserConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;

/// Server-assigned message identifier (the IMAP UID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u32);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An unread message, as far as the device cares about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Identifier used to mark the message as seen.
    pub id: MessageId,
    /// Sender address from the `From` header, if there is one.
    pub sender: Option<String>,
    /// Attachments in document order.
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Returns the first attachment, if any.
    #[must_use]
    pub fn first_attachment(&self) -> Option<&Attachment> {
        self.attachments.first()
    }
}

/// A message attachment with its transfer encoding already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name given by the sender (empty if none).
    pub filename: String,
    /// Decoded content bytes.
    pub content: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from a name and its content.
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Reads the content as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentNotText`] if the content is not valid UTF-8.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.content.clone()).map_err(|source| Error::AttachmentNotText {
            filename: self.filename.clone(),
            source,
        })
    }
}

/// Opens mailbox sessions.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Connects and authenticates with the configured credentials, ready to list
    /// unread messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or rejects the login.
    async fn open(&self, config: &UserConfig) -> Result<Box<dyn MailSession>>;
}

/// One open mailbox session.
#[async_trait]
pub trait MailSession: Send {
    /// Returns the next unread message, or `None` once the unread set is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to deliver the message.
    async fn next_unread(&mut self) -> Result<Option<Message>>;

    /// Flags a message as seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the flag change.
    async fn mark_seen(&mut self, id: MessageId) -> Result<()>;

    /// Logs out and releases the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout fails; the connection is released regardless.
    async fn close(&mut self) -> Result<()>;
}
