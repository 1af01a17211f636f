//! Turns a composed [`Email`] into a MIME message.
//!
//! Tree shape, innermost first:
//!
//! ```text
//! multipart/mixed                 (only with attachments)
//! ├── multipart/related           (only with inline images)
//! │   ├── multipart/alternative
//! │   │   ├── text/plain
//! │   │   └── text/html
//! │   └── image/*  ...
//! └── attachment ...
//! ```

use chrono::Utc;
use ezmail_mime::encoding::encode_rfc2047;
use ezmail_mime::{ContentDisposition, ContentType, Headers, Message, Part};

use crate::Result;
use crate::composer::{Attachment, Email, InlineImage};

/// Sender and header recipients of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// `From` address.
    pub from: String,
    /// `To` addresses, joined with commas in the header.
    pub to: Vec<String>,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub fn new(from: impl Into<String>, to: Vec<String>) -> Self {
        Self { from: from.into(), to }
    }
}

/// Builds the full message, top-level headers included.
#[must_use]
pub fn assemble(email: &Email, envelope: &Envelope) -> Message {
    let alternative = Part::multipart(
        "alternative",
        vec![
            Part::text(ContentType::text_plain(), &email.plain_body()),
            Part::text(ContentType::text_html(), &email.html_body()),
        ],
    );

    let images: Vec<Part> = email.inline_images().map(image_part).collect();
    let mut root = if images.is_empty() {
        alternative
    } else {
        let mut children = Vec::with_capacity(images.len() + 1);
        children.push(alternative);
        children.extend(images);
        Part::multipart("related", children)
    };

    if !email.attachments().is_empty() {
        let mut children = Vec::with_capacity(email.attachments().len() + 1);
        children.push(root);
        children.extend(email.attachments().iter().map(attachment_part));
        root = Part::multipart("mixed", children);
    }

    let mut headers = Headers::new();
    headers.add("From", envelope.from.as_str());
    headers.add("To", envelope.to.join(", "));
    headers.add("Subject", encode_rfc2047(email.subject()));
    headers.add("Date", Utc::now().to_rfc2822());
    headers.add("Message-ID", message_id(&envelope.from));
    headers.add("MIME-Version", "1.0");
    for (name, value) in root.headers.iter() {
        headers.add(name, value);
    }
    root.headers = headers;

    Message::new(root)
}

impl Email {
    /// Assembles and serializes the message with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mime`](crate::Error::Mime) if serialization fails.
    pub fn to_bytes(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        Ok(assemble(self, envelope).to_bytes()?)
    }
}

fn image_part(image: &InlineImage) -> Part {
    Part::binary(image.content_type.clone(), &image.data)
        .with_header("Content-ID", format!("<{}>", image.cid))
        .with_header(
            "Content-Disposition",
            ContentDisposition::inline()
                .with_filename(image.filename.as_str())
                .to_string(),
        )
}

fn attachment_part(attachment: &Attachment) -> Part {
    Part::binary(attachment.content_type.clone(), &attachment.data).with_header(
        "Content-Disposition",
        ContentDisposition::attachment()
            .with_filename(attachment.filename.as_str())
            .to_string(),
    )
}

fn message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('>').trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost");
    format!("<{:032x}@{domain}>", rand::random::<u128>())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::composer::{Composer, ImageOptions};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn envelope() -> Envelope {
        Envelope::new("sender@example.com", vec!["a@example.com".to_string(), "b@example.com".to_string()])
    }

    fn leaf_types(message: &Message) -> Vec<String> {
        message.root().leaves().iter().map(|p| p.content_type().essence()).collect()
    }

    #[test]
    fn test_html_only_has_two_alternatives() {
        let email = Composer::new().subject("Hello").add_text("<p>Hi</p>").finish().unwrap();
        let message = assemble(&email, &envelope());

        assert!(message.root().content_type().is("multipart", "alternative"));
        assert_eq!(leaf_types(&message), vec!["text/plain", "text/html"]);
        assert_eq!(message.text_part().unwrap().body_text().unwrap().trim(), "Hi");
        assert_eq!(message.html_part().unwrap().body_text().unwrap().trim(), "<p>Hi</p>");
    }

    #[test]
    fn test_header_order() {
        let email = Composer::new().subject("Hello").add_text("<p>Hi</p>").finish().unwrap();
        let message = assemble(&email, &envelope());
        let names: Vec<&str> = message.headers().iter().map(|(name, _)| name).collect();
        assert_eq!(
            names[..6],
            ["From", "To", "Subject", "Date", "Message-ID", "MIME-Version"]
        );
        assert_eq!(message.headers().get("To"), Some("a@example.com, b@example.com"));
        assert!(message.headers().get("Message-ID").unwrap().ends_with("@example.com>"));
        assert!(message.date().is_some());
    }

    #[test]
    fn test_non_ascii_subject_round_trips() {
        let email = Composer::new().subject("Café ☕").add_text("x").finish().unwrap();
        let message = assemble(&email, &envelope());
        assert!(message.headers().get("Subject").unwrap().starts_with("=?"));
        assert_eq!(message.subject().as_deref(), Some("Café ☕"));
    }

    #[test]
    fn test_inline_image_scenario() {
        let email = Composer::new()
            .subject("Test")
            .add_text("<p>Hi</p>")
            .add_image_bytes("logo.png", PNG, ImageOptions::new().width("100px"))
            .unwrap()
            .finish()
            .unwrap();
        let cid = email.inline_images().next().unwrap().cid.clone();

        let bytes = email.to_bytes(&envelope()).unwrap();
        let parsed = Message::parse(&bytes).unwrap();

        assert!(parsed.root().content_type().is("multipart", "related"));
        assert_eq!(leaf_types(&parsed), vec!["text/plain", "text/html", "image/png"]);

        let html = parsed.html_part().unwrap().body_text().unwrap();
        assert_eq!(html.matches(&format!("cid:{cid}")).count(), 1);
        assert!(html.contains("width:100px;"));
        assert_eq!(parsed.text_part().unwrap().body_text().unwrap().trim(), "Hi");

        let image = parsed.root().leaves()[2];
        assert_eq!(image.content_id(), Some(cid.as_str()));
        assert_eq!(image.filename().as_deref(), Some("logo.png"));
        assert!(!image.disposition().unwrap().is_attachment());
        assert_eq!(image.decode_body().unwrap(), PNG);
    }

    #[test]
    fn test_explicit_cid_appears_once_each() {
        let email = Composer::new()
            .add_text("<img src=\"cid:banner\">")
            .add_image_bytes("banner.jpg", PNG, ImageOptions::new().cid("banner"))
            .unwrap()
            .finish()
            .unwrap();
        let text = String::from_utf8(email.to_bytes(&envelope()).unwrap()).unwrap();
        assert_eq!(text.matches("Content-ID: <banner>").count(), 1);

        let parsed = Message::parse(text.as_bytes()).unwrap();
        let html = parsed.html_part().unwrap().body_text().unwrap();
        assert_eq!(html.matches("cid:banner").count(), 1);
    }

    #[test]
    fn test_attachments_wrap_in_mixed() {
        let email = Composer::new()
            .add_text("<p>Report attached</p>")
            .add_image_bytes("logo.gif", PNG, ImageOptions::new())
            .unwrap()
            .add_attachment_bytes("report.pdf", b"%PDF-1.4".to_vec())
            .unwrap()
            .add_attachment_bytes("data.unknownext", vec![0, 1, 2])
            .unwrap()
            .finish()
            .unwrap();

        let parsed = Message::parse(&email.to_bytes(&envelope()).unwrap()).unwrap();
        assert!(parsed.root().content_type().is("multipart", "mixed"));
        assert!(parsed.root().children()[0].content_type().is("multipart", "related"));

        let attachments: Vec<_> = parsed
            .attachments()
            .into_iter()
            .filter(|part| part.disposition().is_some_and(|cd| cd.is_attachment()))
            .collect();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].filename().as_deref(), Some("report.pdf"));
        assert_eq!(attachments[0].content_type().essence(), "application/pdf");
        assert_eq!(attachments[0].decode_body().unwrap(), b"%PDF-1.4");
        assert_eq!(attachments[1].content_type().essence(), "application/octet-stream");
    }

    #[test]
    fn test_explicit_plain_alternative_is_used() {
        let email = Composer::new()
            .add_text("<p>Rich</p>")
            .plain_alternative("Plain version")
            .finish()
            .unwrap();
        let message = assemble(&email, &envelope());
        assert_eq!(message.text_part().unwrap().body_text().unwrap().trim(), "Plain version");
    }

    #[test]
    fn test_message_id_domain() {
        assert!(message_id("Ana <ana@mail.example.org>").ends_with("@mail.example.org>"));
        assert!(message_id("nobody").ends_with("@localhost>"));
    }
}
