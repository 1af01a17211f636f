//! Header parameter lists such as `; charset=utf-8; name="a b.txt"`.
//!
//! Handles quoted strings (RFC 2045) and extended values with
//! continuations (RFC 2231), e.g. `filename*=utf-8''%E2%82%AC.pdf`.

use crate::encoding::decode_charset;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Characters that force a parameter value to be quoted.
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Splits `input` on `separator`, ignoring separators inside quoted strings.
pub fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (index, ch) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                pieces.push(&input[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&input[start..]);
    pieces
}

/// Parses the segments that follow the leading value of a structured header.
pub fn parse<'a>(segments: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    let mut parameters = BTreeMap::new();
    let mut continued: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = unquote(value.trim());
        let (name, extended) = key
            .strip_suffix('*')
            .map_or((key.as_str(), false), |name| (name, true));

        if let Some((base, index)) = name.split_once('*')
            && let Ok(index) = index.parse::<u32>()
        {
            continued
                .entry(base.to_string())
                .or_default()
                .push((index, extended, value));
        } else if extended {
            parameters.insert(name.to_string(), decode_extended(&value));
        } else {
            parameters.entry(name.to_string()).or_insert(value);
        }
    }

    for (name, mut pieces) in continued {
        pieces.sort_by_key(|(index, _, _)| *index);
        let mut charset = String::new();
        let mut bytes = Vec::new();
        for (index, extended, value) in pieces {
            if !extended {
                bytes.extend_from_slice(value.as_bytes());
                continue;
            }
            let encoded = if index == 0 {
                let (set, rest) = split_charset(&value);
                charset = set.to_string();
                rest
            } else {
                value.as_str()
            };
            bytes.extend(percent_decode(encoded));
        }
        parameters.insert(name, decode_charset(&charset, &bytes));
    }

    parameters
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Decodes `charset'language'percent-encoded` into a string.
fn decode_extended(value: &str) -> String {
    let (charset, encoded) = split_charset(value);
    decode_charset(charset, &percent_decode(encoded))
}

fn split_charset(value: &str) -> (&str, &str) {
    let mut fields = value.splitn(3, '\'');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(charset), Some(_language), Some(rest)) => (charset, rest),
        _ => ("utf-8", value),
    }
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while let Some(&byte) = bytes.get(index) {
        if byte == b'%'
            && let Some(hex) = input.get(index + 1..index + 3)
            && hex.bytes().all(|b| b.is_ascii_hexdigit())
            && let Ok(decoded) = u8::from_str_radix(hex, 16)
        {
            out.push(decoded);
            index += 3;
        } else {
            out.push(byte);
            index += 1;
        }
    }
    out
}

/// Writes `; key=value`, quoting or extended-encoding the value as needed.
pub fn write(f: &mut fmt::Formatter<'_>, key: &str, value: &str) -> fmt::Result {
    if !value.is_ascii() {
        write!(f, "; {key}*=utf-8''")?;
        for byte in value.bytes() {
            if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
                f.write_char(char::from(byte))?;
            } else {
                write!(f, "%{byte:02X}")?;
            }
        }
        return Ok(());
    }

    let needs_quotes =
        value.is_empty() || value.contains(|c: char| c.is_ascii_whitespace() || c.is_ascii_control() || TSPECIALS.contains(c));
    if needs_quotes {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        write!(f, "; {key}=\"{escaped}\"")
    } else {
        write!(f, "; {key}={value}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn parse_str(input: &str) -> BTreeMap<String, String> {
        parse(split_unquoted(input, ';'))
    }

    #[test]
    fn test_split_respects_quotes() {
        let pieces = split_unquoted("a; name=\"x;y\"; b=1", ';');
        assert_eq!(pieces, vec!["a", " name=\"x;y\"", " b=1"]);
    }

    #[test]
    fn test_parse_quoted_and_plain() {
        let params = parse_str("charset=UTF-8; name=\"my file.txt\"");
        assert_eq!(params.get("charset").unwrap(), "UTF-8");
        assert_eq!(params.get("name").unwrap(), "my file.txt");
    }

    #[test]
    fn test_parse_escaped_quote() {
        let params = parse_str(r#"filename="say \"hi\".txt""#);
        assert_eq!(params.get("filename").unwrap(), "say \"hi\".txt");
    }

    #[test]
    fn test_parse_extended_overrides_plain() {
        let params = parse_str("filename=\"EURO rates.pdf\"; filename*=utf-8''%E2%82%AC%20rates.pdf");
        assert_eq!(params.get("filename").unwrap(), "€ rates.pdf");
    }

    #[test]
    fn test_parse_continuations() {
        let params = parse_str("filename*0*=utf-8''%C3%A9t%C3%A9; filename*1=\"_report.pdf\"");
        assert_eq!(params.get("filename").unwrap(), "été_report.pdf");
    }
}
