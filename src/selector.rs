//! Choosing which unread message supplies the display content.
//!
//! The scan walks the session's unread messages in the order the server yields
//! them and flags every visited message as seen, match or not. The first message
//! accepted by the [`MessageMatcher`] wins; ordering by date is deliberately not
//! attempted.
//!
//! ```
//! use companion_cube::selector::{MessageMatcher, WhitelistMatcher};
//! use companion_cube::{sim, UserConfig};
//!
//! let config = UserConfig::builder()
//!     .username("cube@example.com")
//!     .password("secret")
//!     .imap_url("imap.example.com")
//!     .whitelist(["friend@example.com"])
//!     .build()
//!     .unwrap();
//!
//! let matcher = WhitelistMatcher::new(&config);
//! assert!(matcher.matches(&sim::message(1, "friend@example.com", &[("a.txt", "hi")])));
//! assert!(!matcher.matches(&sim::message(2, "friend@example.com", &[])));
//! ```

use crate::config::UserConfig;
use crate::error::{Error, Result};
use crate::mail::{MailSession, Message};
use tracing::{debug, instrument};

/// Decides whether a message is the one to display.
pub trait MessageMatcher: Send + Sync {
    /// Returns whether `message` is acceptable.
    fn matches(&self, message: &Message) -> bool;

    /// Returns a human-readable description, used in logs.
    fn description(&self) -> &str;
}

/// Accepts messages from a whitelisted sender that carry at least one attachment.
#[derive(Debug, Clone, Copy)]
pub struct WhitelistMatcher<'a> {
    config: &'a UserConfig,
}

impl<'a> WhitelistMatcher<'a> {
    /// Creates a matcher over the configured whitelist.
    #[must_use]
    pub fn new(config: &'a UserConfig) -> Self {
        Self { config }
    }
}

impl MessageMatcher for WhitelistMatcher<'_> {
    fn matches(&self, message: &Message) -> bool {
        let whitelisted = message
            .sender
            .as_deref()
            .is_some_and(|sender| self.config.is_whitelisted(sender));

        whitelisted && !message.attachments.is_empty()
    }

    fn description(&self) -> &str {
        "whitelisted sender with attachment"
    }
}

/// Scans unread messages for the first one accepted by `matcher`.
///
/// Every message pulled from the session is marked seen before it is examined.
///
/// # Errors
///
/// Returns the session's error if reading or flagging a message fails.
#[instrument(
    name = "selector::select_message",
    skip_all,
    fields(matcher = %matcher.description())
)]
pub async fn select_message(
    session: &mut dyn MailSession,
    matcher: &dyn MessageMatcher,
) -> Result<Option<Message>> {
    let mut scanned = 0_usize;

    while let Some(message) = session.next_unread().await? {
        scanned += 1;
        session.mark_seen(message.id).await?;

        if matcher.matches(&message) {
            debug!(
                uid = %message.id,
                sender = sender_label(&message),
                scanned,
                "Selected message"
            );
            return Ok(Some(message));
        }

        debug!(
            uid = %message.id,
            sender = sender_label(&message),
            attachment_count = message.attachments.len(),
            "Skipping message"
        );
    }

    debug!(scanned, "No matching message");
    Ok(None)
}

fn sender_label(message: &Message) -> &str {
    message.sender.as_deref().unwrap_or("<none>")
}

/// Returns the text of the message's first attachment.
///
/// # Errors
///
/// - [`Error::MissingAttachment`] if the message has no attachment
/// - [`Error::AttachmentNotText`] if the attachment is not UTF-8 text
pub fn extract_content(message: &Message) -> Result<String> {
    message
        .first_attachment()
        .ok_or(Error::MissingAttachment { uid: message.id.0 })?
        .text()
}
