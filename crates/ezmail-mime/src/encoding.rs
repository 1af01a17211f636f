//! MIME encoding and decoding utilities.
//!
//! Base64 and Quoted-Printable (RFC 2045) for bodies, encoded words
//! (RFC 2047) for header values. The decoders are lenient: malformed
//! sequences pass through verbatim instead of failing the whole message.

use crate::error::Result;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::{Engine, alphabet};
use std::fmt::Write as _;

/// Maximum encoded line length, excluding CRLF.
const MAX_LINE_LENGTH: usize = 76;

/// Raw bytes per encoded word. `=?utf-8?B?` plus `?=` is 12 characters and
/// 45 bytes encode to 60, which stays under the 75 character limit.
const ENCODED_WORD_BYTES: usize = 45;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-terminated lines.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + (encoded.len() / MAX_LINE_LENGTH + 1) * 2);
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(MAX_LINE_LENGTH));
        out.push_str(line);
        out.push_str("\r\n");
        rest = tail;
    }
    out
}

/// Decoder that accepts bodies with or without trailing `=` padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
/// Missing padding is tolerated.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input (LF or CRLF) become CRLF hard breaks. Longer
/// lines are wrapped with soft breaks so no encoded line exceeds 76 columns.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut out = String::with_capacity(normalized.len() + normalized.len() / 8);
    let mut lines = normalized.split('\n').peekable();

    while let Some(line) = lines.next() {
        encode_qp_line(line.as_bytes(), &mut out);
        if lines.peek().is_some() {
            out.push_str("\r\n");
        }
    }

    out
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut column = 0;

    for (index, &byte) in line.iter().enumerate() {
        let at_end = index + 1 == line.len();
        // Trailing whitespace would be stripped in transit
        let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
            || (matches!(byte, b' ' | b'\t') && !at_end);
        let width = if literal { 1 } else { 3 };

        // Leave room for the trailing '=' of a soft break
        if column + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            column = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        column += width;
    }
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. An `=` that does not start a valid escape
/// is kept as-is.
#[must_use]
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut index = 0;

    while let Some(&byte) = input.get(index) {
        if byte != b'=' {
            out.push(byte);
            index += 1;
            continue;
        }

        let rest = &input[index + 1..];
        if rest.starts_with(b"\r\n") {
            index += 3;
        } else if rest.starts_with(b"\n") {
            index += 2;
        } else if let [high, low, ..] = rest
            && let (Some(high), Some(low)) = (hex_value(*high), hex_value(*low))
        {
            out.push((high << 4) | low);
            index += 3;
        } else {
            out.push(b'=');
            index += 1;
        }
    }

    out
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Encodes a header value as RFC 2047 encoded words when needed.
///
/// Plain ASCII without line breaks is returned unchanged. Anything else is
/// split into UTF-8 Base64 words separated by spaces, never breaking a
/// character across words.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text.is_ascii() && !text.contains("=?") && !text.contains(['\r', '\n']) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?utf-8?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join(" ")
}

/// Decodes every RFC 2047 encoded word found in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Words that do
/// not parse are left in place.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut after_word = false;

    while let Some(pos) = rest.find("=?") {
        let (before, candidate) = rest.split_at(pos);
        if let Some((decoded, consumed)) = decode_encoded_word(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&decoded);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }

    out.push_str(rest);
    out
}

/// Decodes one `=?charset?encoding?text?=` word at the start of `input`,
/// returning the text and the number of bytes consumed.
fn decode_encoded_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, after) = body.split_once('?')?;
    let (encoding, after) = after.split_once('?')?;
    let end = after.find("?=")?;
    let payload = &after[..end];

    if charset.is_empty() || charset.contains(char::is_whitespace) || payload.contains(char::is_whitespace) {
        return None;
    }

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    let bytes = match encoding {
        "B" | "b" => decode_base64(payload).ok()?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes()),
        _ => return None,
    };

    // RFC 2231 allows a language suffix: utf-8*en
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(charset, &bytes), consumed))
}

/// Converts bytes in the named charset to a string.
///
/// UTF-8 and ASCII are decoded lossily. The Latin-1 family maps each byte
/// to the code point of the same value. Unknown charsets are treated as
/// UTF-8.
#[must_use]
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252" => {
            bytes.iter().copied().map(char::from).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let encoded = encode_base64(b"Hello, World!");
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(decode_base64(&encoded).unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_without_padding() {
        assert_eq!(decode_base64("YWJjZA").unwrap(), b"abcd");
        assert_eq!(decode_base64("aGVsbG8gd29ybGQ\r\n").unwrap(), b"hello world");
        assert!(decode_base64("a$b=").is_err());
    }

    #[test]
    fn test_base64_lines_wrap_at_76() {
        let data = vec![0xA5u8; 200];
        let encoded = encode_base64_lines(&data);
        for line in encoded.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(line.len() <= 76);
        }
        assert!(encoded.ends_with("\r\n"));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
        assert_eq!(encode_quoted_printable("Héllo"), "H=C3=A9llo");
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_hard_breaks() {
        assert_eq!(encode_quoted_printable("one\ntwo\r\nthree"), "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable("end \nnext"), "end=20\r\nnext");
    }

    #[test]
    fn test_quoted_printable_soft_wrap() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(&text);
        assert!(encoded.contains("=\r\n"));
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_decode_malformed() {
        assert_eq!(decode_quoted_printable(b"100=%"), b"100=%");
        assert_eq!(decode_quoted_printable(b"trailing="), b"trailing=");
        assert_eq!(decode_quoted_printable(b"=4"), b"=4");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello"), "Hello");

        let encoded = encode_rfc2047("Héllo");
        assert_eq!(encoded, "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2047_encode_splits_long_values() {
        let text = "ü".repeat(60);
        let encoded = encode_rfc2047(&text);
        let words: Vec<&str> = encoded.split(' ').collect();
        assert!(words.len() > 1);
        for word in words {
            assert!(word.len() <= 75);
        }
        assert_eq!(decode_rfc2047(&encoded), text);
    }

    #[test]
    fn test_rfc2047_encode_line_breaks() {
        let encoded = encode_rfc2047("evil\r\nBcc: x@example.com");
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
    }

    #[test]
    fn test_rfc2047_decode_mixed() {
        assert_eq!(
            decode_rfc2047("Re: =?ISO-8859-1?Q?Andr=E9?= Pirard"),
            "Re: André Pirard"
        );
        assert_eq!(
            decode_rfc2047("=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?="),
            "ab"
        );
        assert_eq!(
            decode_rfc2047("=?ISO-8859-1?Q?a?= b"),
            "a b"
        );
    }

    #[test]
    fn test_rfc2047_decode_invalid_word_kept() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("price =? unknown"), "price =? unknown");
    }

    #[test]
    fn test_decode_charset_latin1() {
        assert_eq!(decode_charset("ISO-8859-1", &[0x4A, 0xF8]), "Jø");
    }

    proptest! {
        #[test]
        fn quoted_printable_lines_stay_short(s in "\\PC*") {
            let encoded = encode_quoted_printable(&s);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= 76);
            }
        }

        #[test]
        fn quoted_printable_is_reversible(s in "\\PC*") {
            let expected = s.replace("\r\n", "\n").replace('\n', "\r\n");
            let decoded = decode_quoted_printable(encode_quoted_printable(&s).as_bytes());
            prop_assert_eq!(String::from_utf8(decoded).unwrap(), expected);
        }

        #[test]
        fn rfc2047_is_reversible(s in "\\PC*") {
            prop_assert_eq!(decode_rfc2047(&encode_rfc2047(&s)), s);
        }

        #[test]
        fn decoders_never_panic(s in ".*") {
            let _ = decode_rfc2047(&s);
            let _ = decode_quoted_printable(s.as_bytes());
        }
    }
}
