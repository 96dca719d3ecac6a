//! IMAP commands used by the transport, wrapped with crate errors.

use super::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::Session;
use futures::StreamExt;
use tracing::{debug, instrument};

/// Type alias for IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// Login credentials.
pub(crate) struct AuthConfig<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Authenticates to IMAP server and returns a session.
#[instrument(
    name = "session::authenticate",
    skip_all,
    fields(username = %config.username)
)]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    config: &AuthConfig<'_>,
) -> Result<ImapSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    client
        .login(config.username, config.password)
        .await
        .map_err(|e| Error::ImapLogin {
            email: config.username.to_string(),
            source: e.0,
        })
}

/// Selects a mailbox (typically "INBOX").
#[instrument(name = "session::select", skip(session), fields(mailbox = %mailbox))]
pub(crate) async fn select_mailbox(session: &mut ImapSession, mailbox: &str) -> Result<()> {
    debug!("Selecting mailbox");

    session
        .select(mailbox)
        .await
        .map_err(|source| Error::SelectMailbox {
            mailbox: mailbox.to_string(),
            source,
        })?;

    Ok(())
}

/// Lists the UIDs of unread messages, oldest first.
#[instrument(name = "session::search_unseen", skip(session))]
pub(crate) async fn search_unseen(session: &mut ImapSession) -> Result<Vec<u32>> {
    let uids = session
        .uid_search("UNSEEN")
        .await
        .map_err(|source| Error::ImapSearch { source })?;

    let mut uids: Vec<u32> = uids.into_iter().collect();
    uids.sort_unstable();

    debug!(uid_count = uids.len(), "Found unread messages");

    Ok(uids)
}

/// Fetches the raw RFC 822 body of one message without setting `\Seen`.
///
/// Returns `None` if the server answered without a body (the message vanished).
#[instrument(name = "session::fetch_message", skip(session))]
pub(crate) async fn fetch_message(session: &mut ImapSession, uid: u32) -> Result<Option<Vec<u8>>> {
    let mut stream = session
        .uid_fetch(uid.to_string(), "BODY.PEEK[]")
        .await
        .map_err(|source| Error::ImapFetch { uid, source })?
        .boxed();

    let mut body = None;
    // Drain the whole response before the next command.
    while let Some(item) = stream.next().await {
        let fetch = item.map_err(|source| Error::ImapFetch { uid, source })?;
        if body.is_none() {
            body = fetch.body().map(<[u8]>::to_vec);
        }
    }

    Ok(body)
}

/// Adds the `\Seen` flag to one message.
#[instrument(name = "session::mark_seen", skip(session))]
pub(crate) async fn mark_seen(session: &mut ImapSession, uid: u32) -> Result<()> {
    let mut stream = session
        .uid_store(uid.to_string(), "+FLAGS.SILENT (\\Seen)")
        .await
        .map_err(|source| Error::ImapStore { uid, source })?
        .boxed();

    while let Some(item) = stream.next().await {
        item.map_err(|source| Error::ImapStore { uid, source })?;
    }

    Ok(())
}

/// Logs out from IMAP session.
#[instrument(name = "session::logout", skip(session))]
pub(crate) async fn logout(session: &mut ImapSession) -> Result<()> {
    debug!("Logging out");

    session
        .logout()
        .await
        .map_err(|source| Error::ImapLogout { source })?;

    Ok(())
}
