//! Top-level message accessors.

use crate::error::Result;
use crate::header::Headers;
use crate::part::{Body, Part};
use chrono::{DateTime, FixedOffset};

/// A complete message: the root entity of a MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Wraps a root part.
    #[must_use]
    pub const fn new(root: Part) -> Self {
        Self { root }
    }

    /// Parses a raw RFC 5322 message.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart entity is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Part::parse(raw).map(Self::new)
    }

    /// Root part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Consumes the message, returning the root part.
    #[must_use]
    pub fn into_root(self) -> Part {
        self.root
    }

    /// Top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Mutable top-level headers.
    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.root.headers
    }

    /// Decoded Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers().get_decoded("subject")
    }

    /// Decoded From header.
    #[must_use]
    pub fn from(&self) -> Option<String> {
        self.headers().get_decoded("from")
    }

    /// Decoded To header.
    #[must_use]
    pub fn to(&self) -> Option<String> {
        self.headers().get_decoded("to")
    }

    /// Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers().get("message-id")
    }

    /// Parsed Date header.
    ///
    /// Trailing comments such as `(UTC)` are ignored. Returns `None` when
    /// the header is missing or not RFC 2822.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.headers().get("date")?;
        let trimmed = raw.find('(').map_or(raw, |i| &raw[..i]).trim();
        DateTime::parse_from_rfc2822(trimmed).ok()
    }

    /// First `text/plain` leaf that is not an attachment.
    #[must_use]
    pub fn text_part(&self) -> Option<&Part> {
        self.first_inline_leaf("plain")
    }

    /// First `text/html` leaf that is not an attachment.
    #[must_use]
    pub fn html_part(&self) -> Option<&Part> {
        self.first_inline_leaf("html")
    }

    fn first_inline_leaf(&self, sub_type: &str) -> Option<&Part> {
        self.root
            .leaves()
            .into_iter()
            .find(|part| part.content_type().is("text", sub_type) && !part.is_attachment())
    }

    /// Leaves that carry a file name or are marked as attachments.
    #[must_use]
    pub fn attachments(&self) -> Vec<&Part> {
        self.root
            .leaves()
            .into_iter()
            .filter(|part| part.is_attachment())
            .collect()
    }

    /// Checks whether the root is a multipart entity.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.root.body, Body::Multipart(_))
    }

    /// Serializes the message with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart part has no boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.root.to_bytes()
    }
}

impl From<Part> for Message {
    fn from(root: Part) -> Self {
        Self::new(root)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SIMPLE: &[u8] = b"From: =?utf-8?Q?Ren=C3=A9?= <rene@example.com>\r\n\
To: you@example.com\r\n\
Subject: =?utf-8?B?w4l0w6kgcmVwb3J0?=\r\n\
Date: Wed, 1 Oct 2025 09:30:00 +0200 (CEST)\r\n\
Message-ID: <abc@example.com>\r\n\
\r\n\
Plain body\r\n";

    #[test]
    fn test_single_part_accessors() {
        let message = Message::parse(SIMPLE).unwrap();
        assert_eq!(message.from().unwrap(), "René <rene@example.com>");
        assert_eq!(message.to().unwrap(), "you@example.com");
        assert_eq!(message.subject().unwrap(), "Été report");
        assert_eq!(message.message_id(), Some("<abc@example.com>"));
        assert!(!message.is_multipart());

        let date = message.date().unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2025, 10, 1));
        assert_eq!(date.hour(), 9);

        let text = message.text_part().unwrap().body_text().unwrap();
        assert_eq!(text, "Plain body\r\n");
        assert!(message.html_part().is_none());
        assert!(message.attachments().is_empty());
    }

    #[test]
    fn test_invalid_date() {
        let message = Message::parse(b"Date: yesterday\r\n\r\nx").unwrap();
        assert!(message.date().is_none());
    }

    #[test]
    fn test_attachment_text_is_not_body() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n\r\n",
            "--b\r\n",
            "Content-Type: text/plain; name=notes.txt\r\n",
            "Content-Disposition: attachment; filename=notes.txt\r\n\r\n",
            "attached notes\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "real body\r\n",
            "--b--\r\n"
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.text_part().unwrap().body_text().unwrap(), "real body");
        assert_eq!(message.attachments().len(), 1);
    }
}
