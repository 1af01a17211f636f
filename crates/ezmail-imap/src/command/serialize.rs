//! Command serialization helpers.

use chrono::NaiveDate;

use crate::types::Mailbox;

use super::types::{FetchAttribute, SearchCriteria};

/// Command bytes plus the offsets at which the client must wait for a
/// continuation request (after each synchronizing literal header).
#[derive(Debug, Default)]
pub struct CommandBuffer {
    bytes: Vec<u8>,
    splits: Vec<usize>,
}

impl CommandBuffer {
    pub fn extend(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn literal(&mut self, data: &[u8]) {
        self.extend(format!("{{{}}}\r\n", data.len()).as_bytes());
        self.splits.push(self.bytes.len());
        self.extend(data);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn into_parts(self) -> Vec<Vec<u8>> {
        let mut parts = Vec::with_capacity(self.splits.len() + 1);
        let mut start = 0;
        for split in self.splits {
            parts.push(self.bytes[start..split].to_vec());
            start = split;
        }
        parts.push(self.bytes[start..].to_vec());
        parts
    }
}

/// Writes an astring: atom when possible, quoted string for printable
/// ASCII, literal for anything else (8-bit text, CR, LF).
pub fn write_astring(buf: &mut CommandBuffer, s: &str) {
    if !s.is_ascii() || s.bytes().any(|b| b == b'\r' || b == b'\n') {
        buf.literal(s.as_bytes());
    } else if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend(s.as_bytes());
    }
}

/// Writes a mailbox name.
pub fn write_mailbox(buf: &mut CommandBuffer, mailbox: &Mailbox) {
    write_astring(buf, mailbox.as_str());
}

const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']') || b < 0x20 || b == 0x7F
}

/// Writes a FETCH attribute list. A single attribute goes without parens.
pub fn write_fetch_items(buf: &mut CommandBuffer, items: &[FetchAttribute]) {
    if let [single] = items {
        write_fetch_attribute(buf, single);
        return;
    }

    buf.push(b'(');
    for (i, attr) in items.iter().enumerate() {
        if i > 0 {
            buf.push(b' ');
        }
        write_fetch_attribute(buf, attr);
    }
    buf.push(b')');
}

fn write_fetch_attribute(buf: &mut CommandBuffer, attr: &FetchAttribute) {
    match attr {
        FetchAttribute::Flags => buf.extend(b"FLAGS"),
        FetchAttribute::InternalDate => buf.extend(b"INTERNALDATE"),
        FetchAttribute::Rfc822Size => buf.extend(b"RFC822.SIZE"),
        FetchAttribute::Uid => buf.extend(b"UID"),
        FetchAttribute::Body { section, peek } => {
            buf.extend(if *peek { b"BODY.PEEK[".as_slice() } else { b"BODY[".as_slice() });
            if let Some(s) = section {
                buf.extend(s.as_bytes());
            }
            buf.push(b']');
        }
    }
}

/// Formats a date the way SEARCH expects it (`1-Oct-2025`).
#[must_use]
pub fn format_search_date(date: NaiveDate) -> String {
    date.format("%-d-%b-%Y").to_string()
}

/// Writes SEARCH criteria. `nested` wraps multi-key `And` in parens so it
/// can appear as the operand of `NOT`.
pub fn write_search_criteria(buf: &mut CommandBuffer, criteria: &SearchCriteria, nested: bool) {
    match criteria {
        SearchCriteria::All => buf.extend(b"ALL"),
        SearchCriteria::Seen => buf.extend(b"SEEN"),
        SearchCriteria::Unseen => buf.extend(b"UNSEEN"),
        SearchCriteria::From(s) => write_string_key(buf, b"FROM ", s),
        SearchCriteria::Subject(s) => write_string_key(buf, b"SUBJECT ", s),
        SearchCriteria::Body(s) => write_string_key(buf, b"BODY ", s),
        SearchCriteria::Text(s) => write_string_key(buf, b"TEXT ", s),
        SearchCriteria::On(date) => write_date_key(buf, b"ON ", *date),
        SearchCriteria::Since(date) => write_date_key(buf, b"SINCE ", *date),
        SearchCriteria::Before(date) => write_date_key(buf, b"BEFORE ", *date),
        SearchCriteria::And(items) => match items.as_slice() {
            [] => buf.extend(b"ALL"),
            [single] => write_search_criteria(buf, single, nested),
            _ => {
                if nested {
                    buf.push(b'(');
                }
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    write_search_criteria(buf, item, true);
                }
                if nested {
                    buf.push(b')');
                }
            }
        },
        SearchCriteria::Not(inner) => {
            buf.extend(b"NOT ");
            write_search_criteria(buf, inner, true);
        }
    }
}

fn write_string_key(buf: &mut CommandBuffer, key: &[u8], value: &str) {
    buf.extend(key);
    write_astring(buf, value);
}

fn write_date_key(buf: &mut CommandBuffer, key: &[u8], date: NaiveDate) {
    buf.extend(key);
    buf.extend(format_search_date(date).as_bytes());
}
