//! IMAP implementation of the mail transport.
//!
//! Each [`ImapTransport::open`] establishes a fresh TLS connection, logs in and
//! selects `INBOX`. The resulting session lists `UNSEEN` UIDs on first use and
//! then fetches messages one by one with `BODY.PEEK[]`, so nothing is flagged as
//! seen except through [`MailSession::mark_seen`].
//!
//! Every network step is bounded by the matching [`TimeoutConfig`] entry.

use super::connection;
use super::parser;
use super::session::{self, AuthConfig, ImapSession};
use super::{MailSession, MailTransport, Message, MessageId};
use crate::config::{TimeoutConfig, UserConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const MAILBOX: &str = "INBOX";

/// Opens IMAP sessions over implicit TLS.
#[derive(Debug, Clone, Default)]
pub struct ImapTransport {
    timeouts: TimeoutConfig,
}

impl ImapTransport {
    /// Creates a transport with the given per-step timeouts.
    #[must_use]
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self { timeouts }
    }

    /// Returns the configured timeouts.
    #[must_use]
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }
}

#[async_trait]
impl MailTransport for ImapTransport {
    #[instrument(
        name = "ImapTransport::open",
        skip_all,
        fields(
            username = %config.username(),
            imap_host = %config.imap_url().host()
        )
    )]
    async fn open(&self, config: &UserConfig) -> Result<Box<dyn MailSession>> {
        let session = initialize_session(config, &self.timeouts).await?;

        debug!("Session open");

        Ok(Box::new(ImapMailSession {
            session,
            timeouts: self.timeouts.clone(),
            pending: None,
        }))
    }
}

/// Connects, authenticates and selects the inbox.
async fn initialize_session(config: &UserConfig, timeouts: &TimeoutConfig) -> Result<ImapSession> {
    let imap_host = config.imap_url().host();
    let target_addr = config.imap_url().server_address();

    let tls_stream = bounded(
        timeouts.connect,
        connection::establish_tls_connection(imap_host, &target_addr),
        || Error::ConnectTimeout {
            target: target_addr.clone(),
            timeout: timeouts.connect,
        },
    )
    .await?;

    debug!("TLS connection established");

    let auth_config = AuthConfig {
        username: config.username(),
        password: config.password(),
    };

    let mut session = bounded(
        timeouts.auth,
        session::authenticate(tls_stream, &auth_config),
        || Error::AuthTimeout {
            email: config.username().to_string(),
            timeout: timeouts.auth,
        },
    )
    .await?;

    debug!("Authenticated");

    bounded(
        timeouts.select,
        session::select_mailbox(&mut session, MAILBOX),
        || Error::SelectTimeout {
            mailbox: MAILBOX.to_string(),
            timeout: timeouts.select,
        },
    )
    .await?;

    debug!("Selected INBOX");

    Ok(session)
}

/// Runs `fut` with a deadline, mapping expiry to the error built by `on_timeout`.
async fn bounded<T, F>(limit: Duration, fut: F, on_timeout: impl FnOnce() -> Error) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| on_timeout())?
}

/// An open IMAP session walking the unread messages of `INBOX`.
struct ImapMailSession {
    session: ImapSession,
    timeouts: TimeoutConfig,
    /// Unread UIDs not yet yielded; `None` until the first search.
    pending: Option<VecDeque<u32>>,
}

impl ImapMailSession {
    async fn pending(&mut self) -> Result<&mut VecDeque<u32>> {
        if self.pending.is_none() {
            let timeout = self.timeouts.search;
            let uids = bounded(timeout, session::search_unseen(&mut self.session), || {
                Error::SearchTimeout { timeout }
            })
            .await?;
            self.pending = Some(uids.into());
        }
        Ok(self.pending.get_or_insert_with(VecDeque::new))
    }
}

#[async_trait]
impl MailSession for ImapMailSession {
    async fn next_unread(&mut self) -> Result<Option<Message>> {
        loop {
            let Some(uid) = self.pending().await?.pop_front() else {
                return Ok(None);
            };

            let timeout = self.timeouts.message_fetch;
            let raw = bounded(
                timeout,
                session::fetch_message(&mut self.session, uid),
                || Error::FetchTimeout { uid, timeout },
            )
            .await?;

            let Some(raw) = raw else {
                debug!(uid, "Message vanished before fetch, skipping");
                continue;
            };

            match parser::parse_message(uid, &raw) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    // Flag it so a broken message is not refetched on every attempt.
                    warn!(uid, error = %e, "Failed to parse email, skipping message");
                    self.mark_seen(MessageId(uid)).await?;
                }
            }
        }
    }

    async fn mark_seen(&mut self, id: MessageId) -> Result<()> {
        let timeout = self.timeouts.store;
        let uid = id.0;
        bounded(timeout, session::mark_seen(&mut self.session, uid), || {
            Error::StoreTimeout { uid, timeout }
        })
        .await
    }

    async fn close(&mut self) -> Result<()> {
        let timeout = self.timeouts.logout;
        bounded(timeout, session::logout(&mut self.session), || {
            Error::LogoutTimeout { timeout }
        })
        .await
    }
}
