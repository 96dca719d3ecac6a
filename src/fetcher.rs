//! One fetch attempt: connectivity check, mailbox scan, attachment extraction.
//!
//! [`Fetcher::fetch`] never fails. Every error inside an attempt is folded into a
//! [`FetchOutcome`] so the control loop only has to pick a backoff.

use crate::config::UserConfig;
use crate::connectivity::ConnectivityProbe;
use crate::error::Result;
use crate::mail::{MailSession, MailTransport};
use crate::selector::{self, WhitelistMatcher};
use std::fmt;
use tracing::{debug, instrument, warn};

/// Result of a single fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A whitelisted message was found; holds its first attachment's text.
    Success(String),
    /// The connectivity probe failed; no session was opened.
    NoInternet,
    /// The inbox held no unread whitelisted message with an attachment.
    NoMatchingMessage,
    /// Anything else went wrong; holds the error description.
    UnknownFailure(String),
}

impl FetchOutcome {
    /// Short name used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FetchOutcome::Success(_) => "success",
            FetchOutcome::NoInternet => "no_internet",
            FetchOutcome::NoMatchingMessage => "no_matching_message",
            FetchOutcome::UnknownFailure(_) => "unknown_failure",
        }
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Runs fetch attempts against a mail transport.
pub struct Fetcher {
    probe: Box<dyn ConnectivityProbe>,
    transport: Box<dyn MailTransport>,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Creates a fetcher from a connectivity probe and a mail transport.
    pub fn new(
        probe: impl ConnectivityProbe + 'static,
        transport: impl MailTransport + 'static,
    ) -> Self {
        Self {
            probe: Box::new(probe),
            transport: Box::new(transport),
        }
    }

    /// Performs one attempt.
    ///
    /// The session is opened only when the probe reports connectivity and is
    /// closed before returning on every path.
    #[instrument(name = "Fetcher::fetch", skip_all, fields(username = %config.username()))]
    pub async fn fetch(&self, config: &UserConfig) -> FetchOutcome {
        if !self.probe.is_online().await {
            debug!("Connectivity probe failed");
            return FetchOutcome::NoInternet;
        }

        let mut session = match self.transport.open(config).await {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, category = %e.category(), "Failed to open session");
                return FetchOutcome::UnknownFailure(e.detail());
            }
        };

        let scanned = scan(session.as_mut(), config).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close session");
        }

        match scanned {
            Ok(Some(text)) => FetchOutcome::Success(text),
            Ok(None) => FetchOutcome::NoMatchingMessage,
            Err(e) => {
                debug!(error = %e, category = %e.category(), "Fetch attempt failed");
                FetchOutcome::UnknownFailure(e.detail())
            }
        }
    }
}

async fn scan(session: &mut dyn MailSession, config: &UserConfig) -> Result<Option<String>> {
    let matcher = WhitelistMatcher::new(config);
    match selector::select_message(session, &matcher).await? {
        Some(message) => selector::extract_content(&message).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::{Attachment, Message, MessageId};
    use crate::sim::{self, SimMailbox, SimProbe};

    fn config() -> UserConfig {
        UserConfig::builder()
            .username("me@x.co")
            .password("p")
            .imap_url("imap://x")
            .whitelist(["a@b.co"])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_offline_skips_session() {
        let mailbox = SimMailbox::new();
        let fetcher = Fetcher::new(SimProbe::new(false), mailbox.clone());

        assert_eq!(fetcher.fetch(&config()).await, FetchOutcome::NoInternet);
        assert_eq!(mailbox.opens(), 0);
    }

    #[tokio::test]
    async fn test_success_returns_first_attachment() {
        let mailbox = SimMailbox::new();
        mailbox.deliver(sim::message(
            1,
            "a@b.co",
            &[("hello.txt", "Hello"), ("other.txt", "Other")],
        ));
        let fetcher = Fetcher::new(SimProbe::new(true), mailbox.clone());

        assert_eq!(
            fetcher.fetch(&config()).await,
            FetchOutcome::Success("Hello".into())
        );
        assert_eq!(mailbox.opens(), 1);
        assert_eq!(mailbox.closes(), 1);
    }

    #[tokio::test]
    async fn test_no_match() {
        let mailbox = SimMailbox::new();
        mailbox.deliver(sim::message(1, "eve@evil.co", &[("x.txt", "x")]));
        let fetcher = Fetcher::new(SimProbe::new(true), mailbox.clone());

        assert_eq!(
            fetcher.fetch(&config()).await,
            FetchOutcome::NoMatchingMessage
        );
        assert_eq!(mailbox.closes(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_is_unknown() {
        let mailbox = SimMailbox::new();
        mailbox.fail_next_open("server said no");
        let fetcher = Fetcher::new(SimProbe::new(true), mailbox.clone());

        let outcome = fetcher.fetch(&config()).await;
        assert!(
            matches!(&outcome, FetchOutcome::UnknownFailure(d) if d.contains("server said no"))
        );
        assert_eq!(mailbox.closes(), 0);
    }

    #[tokio::test]
    async fn test_read_failure_still_closes() {
        let mailbox = SimMailbox::new();
        mailbox.deliver(sim::message(1, "a@b.co", &[("x.txt", "x")]));
        mailbox.fail_next_read("connection reset");
        let fetcher = Fetcher::new(SimProbe::new(true), mailbox.clone());

        assert!(matches!(
            fetcher.fetch(&config()).await,
            FetchOutcome::UnknownFailure(_)
        ));
        assert_eq!(mailbox.opens(), 1);
        assert_eq!(mailbox.closes(), 1);
    }

    #[tokio::test]
    async fn test_binary_attachment_is_unknown_failure() {
        let mailbox = SimMailbox::new();
        mailbox.deliver(Message {
            id: MessageId(1),
            sender: Some("a@b.co".into()),
            attachments: vec![Attachment::new("img.png", vec![0xff_u8, 0xfe, 0x00])],
        });
        let fetcher = Fetcher::new(SimProbe::new(true), mailbox.clone());

        assert!(matches!(
            fetcher.fetch(&config()).await,
            FetchOutcome::UnknownFailure(_)
        ));
        // The message was consumed even though its content was unusable
        assert_eq!(mailbox.unread(), 0);
        assert_eq!(mailbox.closes(), 1);
    }

    #[test]
    fn test_outcome_kind() {
        assert_eq!(FetchOutcome::Success(String::new()).to_string(), "success");
        assert_eq!(FetchOutcome::NoInternet.kind(), "no_internet");
    }
}
