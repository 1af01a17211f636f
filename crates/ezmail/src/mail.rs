//! Messages fetched from the server.

use chrono::{DateTime, FixedOffset};
use ezmail_imap::{FetchItem, Flag, SeqNum};
use ezmail_mime::{ContentType, Message};

use crate::{Error, Result};

/// A file carried by a fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    /// Decoded file name.
    pub filename: String,
    /// Declared content type.
    pub content_type: ContentType,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

/// Read-only snapshot of one remote message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMail {
    /// Sequence number at fetch time.
    pub seq: u32,
    /// UID, when the server returned one.
    pub uid: Option<u32>,
    /// Decoded From header.
    pub sender: String,
    /// Decoded Subject header.
    pub subject: String,
    /// Date header, falling back to the server's internal date.
    pub date: Option<DateTime<FixedOffset>>,
    /// First inline `text/plain` part, trimmed.
    pub body: String,
    /// First inline `text/html` part.
    pub html: Option<String>,
    /// Parts with a file name.
    pub attachments: Vec<MailAttachment>,
    /// Flags as sent by the server, e.g. `\Seen`.
    pub flags: Vec<String>,
}

impl FetchedMail {
    /// Builds a snapshot from one FETCH response.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if the response has no body,
    /// [`Error::Mime`] if an attachment cannot be decoded.
    pub fn from_fetch(seq: SeqNum, items: Vec<FetchItem>) -> Result<Self> {
        let mut uid = None;
        let mut flags = Vec::new();
        let mut internal_date = None;
        let mut raw = None;
        for item in items {
            match item {
                FetchItem::Uid(value) => uid = Some(value.get()),
                FetchItem::Flags(value) => flags = value.iter().map(|f| f.as_str().to_string()).collect(),
                FetchItem::InternalDate(value) => internal_date = Some(value),
                FetchItem::Body {
                    section: None,
                    data: Some(data),
                    ..
                } => raw = Some(data),
                _ => {}
            }
        }
        let raw = raw.ok_or_else(|| Error::Protocol(format!("FETCH for message {seq} returned no body")))?;
        let mut mail = Self::parse(&raw)?;
        mail.seq = seq.get();
        mail.uid = uid;
        mail.flags = flags;
        if mail.date.is_none() {
            mail.date = internal_date.as_deref().and_then(parse_internal_date);
        }
        Ok(mail)
    }

    /// Parses a raw RFC 5322 message. `seq`, `uid` and `flags` are left
    /// empty.
    ///
    /// # Errors
    ///
    /// [`Error::Mime`] if the structure or an attachment is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let message = Message::parse(raw)?;

        let body = match message.text_part() {
            Some(part) => part.body_text()?.trim().to_string(),
            None => String::new(),
        };
        let html = message.html_part().map(|part| part.body_text()).transpose()?;

        let attachments = message
            .attachments()
            .into_iter()
            .filter_map(|part| part.filename().map(|filename| (part, filename)))
            .map(|(part, filename)| {
                Ok(MailAttachment {
                    filename,
                    content_type: part.content_type(),
                    data: part.decode_body()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            seq: 0,
            uid: None,
            sender: message.from().unwrap_or_default(),
            subject: message.subject().unwrap_or_default(),
            date: message.date(),
            body,
            html,
            attachments,
            flags: Vec::new(),
        })
    }

    /// Whether any attachment was found.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Whether the server reported `\Seen`.
    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(Flag::Seen.as_str()))
    }

    /// One-line preview of the body, cut to `max_len` characters plus
    /// `...` when longer.
    #[must_use]
    pub fn summary(&self, max_len: usize) -> String {
        let flat = self.body.replace("\r\n", " ").replace('\n', " ");
        let flat = flat.trim();
        if flat.chars().count() <= max_len {
            return flat.to_string();
        }
        let mut cut: String = flat.chars().take(max_len).collect();
        cut.push_str("...");
        cut
    }
}

/// INTERNALDATE, e.g. `17-Jul-1996 02:44:25 -0700`. Servers pad the day
/// with a space.
fn parse_internal_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw.trim(), "%d-%b-%Y %H:%M:%S %z").ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use ezmail_imap::{Flags, Uid};

    const MIXED: &[u8] = b"From: =?utf-8?Q?Ren=C3=A9?= <rene@example.com>\r\n\
Subject: =?utf-8?B?w4l0w6kgcmVwb3J0?=\r\n\
Date: Wed, 1 Oct 2025 09:30:00 +0200\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: multipart/alternative; boundary=\"b2\"\r\n\
\r\n\
--b2\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
  See attached.\r\n\
\r\n\
--b2\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>See attached.</p>\r\n\
--b2--\r\n\
--b1\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--b1--\r\n";

    #[test]
    fn test_parse_mixed() {
        let mail = FetchedMail::parse(MIXED).unwrap();
        assert_eq!(mail.subject, "Été report");
        assert_eq!(mail.sender, "René <rene@example.com>");
        assert_eq!(mail.body, "See attached.");
        assert!(mail.html.as_deref().unwrap().contains("<p>See attached.</p>"));
        assert_eq!(mail.date.unwrap().day(), 1);

        assert!(mail.has_attachments());
        let attachment = &mail.attachments[0];
        assert_eq!(attachment.filename, "report.pdf");
        assert_eq!(attachment.content_type.essence(), "application/pdf");
        assert_eq!(attachment.data, b"%PDF-1.4");
    }

    #[test]
    fn test_parse_unpadded_base64_parts() {
        let raw = b"From: a@example.com\r\n\
Subject: Unpadded\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b\"\r\n\
\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
aGVsbG8gd29ybGQ\r\n\
--b\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"abcd.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
YWJjZA\r\n\
--b--\r\n";
        let mail = FetchedMail::parse(raw).unwrap();
        assert_eq!(mail.body, "hello world");
        assert_eq!(mail.attachments[0].data, b"abcd");
    }

    #[test]
    fn test_from_fetch_items() {
        let flags: Flags = [Flag::Seen, Flag::Flagged].into_iter().collect();
        let items = vec![
            FetchItem::Flags(flags),
            FetchItem::Uid(Uid::new(42).unwrap()),
            FetchItem::InternalDate("17-Jul-1996 02:44:25 -0700".to_string()),
            FetchItem::Body {
                section: None,
                origin: None,
                data: Some(b"From: a@example.com\r\nSubject: Hi\r\n\r\nHello\r\n".to_vec()),
            },
        ];
        let mail = FetchedMail::from_fetch(SeqNum::new(3).unwrap(), items).unwrap();
        assert_eq!(mail.seq, 3);
        assert_eq!(mail.uid, Some(42));
        assert!(mail.is_seen());
        assert_eq!(mail.body, "Hello");
        assert!(mail.html.is_none());
        assert!(!mail.has_attachments());

        let date = mail.date.unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (1996, 7, 17));
    }

    #[test]
    fn test_from_fetch_without_body() {
        let err = FetchedMail::from_fetch(SeqNum::new(1).unwrap(), vec![]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_internal_date_padded_day() {
        assert!(parse_internal_date(" 7-Jul-1996 02:44:25 -0700").is_some());
        assert!(parse_internal_date("garbage").is_none());
    }

    #[test]
    fn test_summary() {
        let mail = FetchedMail {
            body: "Line one\nLine two is longer".to_string(),
            ..FetchedMail::parse(b"Subject: x\r\n\r\n").unwrap()
        };
        assert_eq!(mail.summary(8), "Line one...");
        assert_eq!(mail.summary(100), "Line one Line two is longer");
        assert!(!mail.is_seen());
    }
}
