//! Turns raw RFC 822 messages into [`Message`] values.

use super::{Attachment, Message, MessageId};
use crate::error::{Error, Result};
use mailparse::{addrparse_header, parse_mail, DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use tracing::debug;

/// Parses a raw message body fetched for `uid`.
///
/// A missing or unparseable `From` header yields a message without sender rather
/// than an error; only a structurally broken message fails.
pub(crate) fn parse_message(uid: u32, raw: &[u8]) -> Result<Message> {
    let parsed = parse_mail(raw).map_err(|source| Error::ParseEmail { uid, source })?;

    let sender = extract_sender(&parsed);

    let mut attachments = Vec::new();
    collect_attachments(&parsed, &mut attachments)
        .map_err(|source| Error::ParseEmail { uid, source })?;

    debug!(
        uid,
        sender = sender.as_deref().unwrap_or("<none>"),
        attachment_count = attachments.len(),
        "Parsed message"
    );

    Ok(Message {
        id: MessageId(uid),
        sender,
        attachments,
    })
}

/// Returns the first address of the `From` header.
fn extract_sender(parsed: &ParsedMail<'_>) -> Option<String> {
    let header = parsed.headers.get_first_header("From")?;
    let addresses = addrparse_header(header).ok()?;

    addresses.iter().find_map(|addr| match addr {
        MailAddr::Single(info) => Some(info.addr.clone()),
        MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
    })
}

/// Walks the MIME tree depth-first, collecting attachments in document order.
fn collect_attachments(
    part: &ParsedMail<'_>,
    out: &mut Vec<Attachment>,
) -> std::result::Result<(), mailparse::MailParseError> {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_attachments(sub, out)?;
        }
        return Ok(());
    }

    if let Some(filename) = attachment_name(part) {
        out.push(Attachment {
            filename,
            content: part.get_body_raw()?,
        });
    }

    Ok(())
}

/// Returns the file name if `part` is an attachment.
///
/// A leaf part counts as an attachment when its disposition says so, or when it
/// carries a file name (some clients send named parts as `inline`).
fn attachment_name(part: &ParsedMail<'_>) -> Option<String> {
    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned();

    match (disposition.disposition, filename) {
        (DispositionType::Attachment, name) => Some(name.unwrap_or_default()),
        (_, Some(name)) => Some(name),
        (_, None) => None,
    }
}
