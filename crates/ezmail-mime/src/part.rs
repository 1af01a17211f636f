//! MIME entity tree.
//!
//! A [`Part`] is a header block plus either a leaf body or a list of child
//! parts. Messages are parts too; see [`crate::Message`] for the top-level
//! accessors.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{
    decode_base64, decode_charset, decode_quoted_printable, encode_base64_lines,
    encode_quoted_printable,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use rand::Rng;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string. Unknown values map to 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        })
    }
}

/// Body of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Leaf content, still transfer-encoded.
    Single(Vec<u8>),
    /// Child parts of a multipart entity.
    Multipart(Vec<Part>),
}

/// MIME entity: headers plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
}

/// Generates a boundary that cannot occur in Base64 or Quoted-Printable
/// output (`=_` is not a valid QP escape).
#[must_use]
pub fn generate_boundary() -> String {
    let mut rng = rand::thread_rng();
    format!("=_ezmail_{:016x}{:016x}", rng.r#gen::<u64>(), rng.r#gen::<u64>())
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Body) -> Self {
        Self { headers, body }
    }

    /// Builds a text leaf, Quoted-Printable encoded.
    #[must_use]
    pub fn text(content_type: ContentType, text: &str) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", TransferEncoding::QuotedPrintable.to_string());
        Self::new(headers, Body::Single(encode_quoted_printable(text).into_bytes()))
    }

    /// Builds a binary leaf, Base64 encoded.
    #[must_use]
    pub fn binary(content_type: ContentType, data: &[u8]) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", TransferEncoding::Base64.to_string());
        Self::new(headers, Body::Single(encode_base64_lines(data).into_bytes()))
    }

    /// Builds a `multipart/<subtype>` container with a fresh boundary.
    #[must_use]
    pub fn multipart(sub_type: &str, children: Vec<Self>) -> Self {
        let mut headers = Headers::new();
        headers.add(
            "Content-Type",
            ContentType::multipart(sub_type, generate_boundary()).to_string(),
        );
        Self::new(headers, Body::Multipart(children))
    }

    /// Adds a header field and returns the part.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Gets the content type, defaulting to `text/plain` when the header is
    /// missing or unparsable (RFC 2045 section 5.2).
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_default()
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the parsed Content-Disposition, if present and valid.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .and_then(|value| ContentDisposition::parse(value).ok())
    }

    /// File name from Content-Disposition, falling back to the Content-Type
    /// `name` parameter. Encoded words are decoded.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        let from_disposition = self
            .disposition()
            .and_then(|cd| cd.filename().map(str::to_string));
        from_disposition
            .or_else(|| self.content_type().name().map(str::to_string))
            .map(|name| crate::encoding::decode_rfc2047(&name))
            .filter(|name| !name.trim().is_empty())
    }

    /// Content-ID without the surrounding angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.headers
            .get("content-id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
    }

    /// A leaf counts as an attachment when it is marked `attachment` or
    /// carries a file name.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        matches!(self.body, Body::Single(_))
            && (self.disposition().is_some_and(|cd| cd.is_attachment()) || self.filename().is_some())
    }

    /// Child parts, empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            Body::Multipart(children) => children,
            Body::Single(_) => &[],
        }
    }

    /// All leaf parts in depth-first order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        match &self.body {
            Body::Single(_) => out.push(self),
            Body::Multipart(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Decodes a leaf body according to its transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error for multipart parts or invalid Base64.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        let Body::Single(raw) = &self.body else {
            return Err(Error::BodyKind("cannot decode a multipart body"));
        };
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&String::from_utf8_lossy(raw)),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(raw)),
            _ => Ok(raw.clone()),
        }
    }

    /// Decodes a leaf body as text using its charset.
    ///
    /// # Errors
    ///
    /// Returns an error if [`Part::decode_body`] fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        let content_type = self.content_type();
        Ok(decode_charset(content_type.charset().unwrap_or("utf-8"), &decoded))
    }

    /// Serializes the part with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBoundary`] if a multipart part has no boundary.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Appends the serialized part to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBoundary`] if a multipart part has no boundary.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");

        match &self.body {
            Body::Single(raw) => out.extend_from_slice(raw),
            Body::Multipart(children) => {
                let content_type = self.content_type();
                let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
                for child in children {
                    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    child.write_to(out)?;
                    if !out.ends_with(b"\r\n") {
                        out.extend_from_slice(b"\r\n");
                    }
                }
                out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
            }
        }
        Ok(())
    }

    /// Parses an entity from raw bytes, recursing into multipart bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart entity has no boundary or no
    /// delimiter line.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (header_block, body) = split_header_block(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(header_block));
        let mut part = Self::new(headers, Body::Single(Vec::new()));

        let content_type = part.content_type();
        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            let children = split_multipart(body, boundary)?
                .into_iter()
                .map(Self::parse)
                .collect::<Result<Vec<_>>>()?;
            part.body = Body::Multipart(children);
        } else {
            part.body = Body::Single(body.to_vec());
        }

        Ok(part)
    }
}

/// Splits at the first empty line. A block that starts with an empty line
/// has no headers.
fn split_header_block(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = raw.strip_prefix(b"\r\n").or_else(|| raw.strip_prefix(b"\n")) {
        return (&[], body);
    }

    let mut index = 0;
    while let Some(position) = raw[index..].iter().position(|&b| b == b'\n') {
        let line_end = index + position + 1;
        let rest = &raw[line_end..];
        if let Some(body) = rest.strip_prefix(b"\r\n").or_else(|| rest.strip_prefix(b"\n")) {
            return (&raw[..line_end], body);
        }
        index = line_end;
    }

    (raw, &[])
}

/// Returns the raw bytes of each body part between delimiter lines.
///
/// Preamble and epilogue are dropped. A missing close delimiter is
/// tolerated so truncated messages still yield their complete parts.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut closed = false;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i + 1);
        let line = &body[pos..line_end];

        if let Some(rest) = line.strip_prefix(delimiter.as_bytes()) {
            let rest = rest.trim_ascii_end();
            if rest.is_empty() || rest == b"--" {
                if let Some(start) = current {
                    parts.push(strip_line_break(&body[start..pos]));
                }
                if rest == b"--" {
                    closed = true;
                    break;
                }
                current = Some(line_end);
            }
        }
        pos = line_end;
    }

    if !closed && let Some(start) = current {
        parts.push(&body[start..]);
    }

    if parts.is_empty() && current.is_none() {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter line for boundary {boundary:?}"
        )));
    }

    Ok(parts)
}

/// The line break before a delimiter belongs to the delimiter.
fn strip_line_break(bytes: &[u8]) -> &[u8] {
    bytes
        .strip_suffix(b"\r\n")
        .or_else(|| bytes.strip_suffix(b"\n"))
        .unwrap_or(bytes)
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

    const NESTED: &str = concat!(
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is the preamble.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=inner\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: quoted-printable\r\n",
        "\r\n",
        "Caf=C3=A9\r\n",
        "--inner\r\n",
        "Content-Type: text/html\r\n",
        "\r\n",
        "<p>Caf\u{e9}</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERi0=\r\n",
        "--outer--\r\n",
        "epilogue\r\n"
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(TransferEncoding::parse("quoted-printable"), TransferEncoding::QuotedPrintable);
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_parse_nested_multipart() {
        let part = Part::parse(NESTED.as_bytes()).unwrap();
        assert_eq!(part.children().len(), 2);

        let leaves = part.leaves();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].body_text().unwrap(), "Café");
        assert!(leaves[1].content_type().is("text", "html"));
        assert_eq!(leaves[2].filename().as_deref(), Some("report.pdf"));
        assert!(leaves[2].is_attachment());
        assert_eq!(leaves[2].decode_body().unwrap(), b"%PDF-");
    }

    #[test]
    fn test_parse_single_part_without_headers() {
        let part = Part::parse(b"\r\nHello").unwrap();
        assert!(part.headers.is_empty());
        assert_eq!(part.body, Body::Single(b"Hello".to_vec()));
        assert!(part.content_type().is("text", "plain"));
    }

    #[test]
    fn test_parse_missing_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        assert!(matches!(Part::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_parse_no_delimiter() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\nbody only";
        assert!(matches!(Part::parse(raw), Err(Error::InvalidMultipart(_))));
    }

    #[test]
    fn test_parse_truncated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nfirst\r\n--x\r\n\r\nsecond";
        let part = Part::parse(raw).unwrap();
        assert_eq!(part.children().len(), 2);
        assert_eq!(part.children()[1].decode_body().unwrap(), b"second");
    }

    #[test]
    fn test_build_and_reparse() {
        let tree = Part::multipart(
            "alternative",
            vec![
                Part::text(ContentType::text_plain(), "Hello\nWorld"),
                Part::text(ContentType::text_html(), "<p>Hello</p>"),
            ],
        );
        let bytes = tree.to_bytes().unwrap();
        let reparsed = Part::parse(&bytes).unwrap();

        let leaves = reparsed.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].body_text().unwrap(), "Hello\r\nWorld");
        assert_eq!(leaves[1].body_text().unwrap(), "<p>Hello</p>");
    }

    #[test]
    fn test_binary_part_headers() {
        let part = Part::binary(ContentType::new("image", "png"), &[0x89, b'P', b'N', b'G'])
            .with_header("Content-ID", "<logo>")
            .with_header("Content-Disposition", "inline; filename=logo.png");
        assert_eq!(part.transfer_encoding(), TransferEncoding::Base64);
        assert_eq!(part.content_id(), Some("logo"));
        assert_eq!(part.decode_body().unwrap(), vec![0x89, b'P', b'N', b'G']);
        assert_eq!(part.filename().as_deref(), Some("logo.png"));
        assert!(!part.disposition().unwrap().is_attachment());
    }

    #[test]
    fn test_boundaries_are_unique() {
        assert_ne!(generate_boundary(), generate_boundary());
        assert!(generate_boundary().starts_with("=_ezmail_"));
    }

    #[test]
    fn test_write_without_boundary_fails() {
        let part = Part::new(Headers::new(), Body::Multipart(Vec::new()));
        assert!(matches!(part.to_bytes(), Err(Error::MissingBoundary)));
    }
}
