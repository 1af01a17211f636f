//! IMAP command builder.
//!
//! Commands serialize either to one buffer or, when they carry
//! synchronizing literals, to the chunks between which the client has to
//! wait for the server's `+` continuation.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Mailbox, SequenceSet};

pub use serialize::format_search_date;
pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, SearchCriteria};

use serialize::{
    CommandBuffer, write_astring, write_fetch_items, write_mailbox, write_search_criteria,
};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command.
    Authenticate {
        /// SASL mechanism name.
        mechanism: String,
        /// Base64 initial response (SASL-IR).
        initial_response: Option<String>,
    },

    // Authenticated State Commands
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },

    // Selected State Commands
    /// CLOSE command.
    Close,
    /// SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// FETCH command.
    Fetch {
        /// Messages to fetch.
        sequence: SequenceSet,
        /// Items to fetch.
        items: Vec<FetchAttribute>,
    },
}

impl Command {
    /// Returns true if the command carries credentials.
    #[must_use]
    pub const fn is_sensitive(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Authenticate { .. })
    }

    /// Command name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::List { .. } => "LIST",
            Self::Select { .. } => "SELECT",
            Self::Close => "CLOSE",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
        }
    }

    /// Serializes the command with the given tag.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        self.build(tag).into_bytes()
    }

    /// Serializes the command into chunks split after each literal header.
    /// A command without literals yields a single chunk.
    #[must_use]
    pub fn serialize_parts(&self, tag: &str) -> Vec<Vec<u8>> {
        self.build(tag).into_parts()
    }

    fn build(&self, tag: &str) -> CommandBuffer {
        let mut buf = CommandBuffer::default();
        buf.extend(tag.as_bytes());
        buf.push(b' ');
        buf.extend(self.name().as_bytes());

        match self {
            Self::Capability | Self::Noop | Self::Logout | Self::StartTls | Self::Close => {}

            Self::Login { username, password } => {
                buf.push(b' ');
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Authenticate {
                mechanism,
                initial_response,
            } => {
                buf.push(b' ');
                buf.extend(mechanism.as_bytes());
                if let Some(response) = initial_response {
                    buf.push(b' ');
                    // Empty initial response is sent as "="
                    if response.is_empty() {
                        buf.push(b'=');
                    } else {
                        buf.extend(response.as_bytes());
                    }
                }
            }

            Self::List { reference, pattern } => {
                buf.push(b' ');
                write_astring(&mut buf, reference);
                buf.push(b' ');
                write_astring(&mut buf, pattern);
            }

            Self::Select { mailbox } => {
                buf.push(b' ');
                write_mailbox(&mut buf, mailbox);
            }

            Self::Search { criteria } => {
                buf.push(b' ');
                if criteria.needs_utf8() {
                    buf.extend(b"CHARSET UTF-8 ");
                }
                write_search_criteria(&mut buf, criteria, false);
            }

            Self::Fetch { sequence, items } => {
                buf.push(b' ');
                buf.extend(sequence.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }
        }

        buf.extend(b"\r\n");
        buf
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_capability_command() {
        assert_eq!(Command::Capability.serialize("A001"), b"A001 CAPABILITY\r\n");
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pass word".to_string(),
        };
        assert_eq!(
            cmd.serialize("A001"),
            b"A001 LOGIN user@example.com \"pass word\"\r\n"
        );
        assert_eq!(cmd.serialize_parts("A001").len(), 1);
        assert!(cmd.is_sensitive());
    }

    #[test]
    fn test_login_with_literal_password() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pässword".to_string(),
        };
        let parts = cmd.serialize_parts("A002");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], b"A002 LOGIN user {9}\r\n");
        assert_eq!(parts[1], "pässword\r\n".as_bytes());
    }

    #[test]
    fn test_authenticate_command() {
        let cmd = Command::Authenticate {
            mechanism: "XOAUTH2".to_string(),
            initial_response: Some("dXNlcj0=".to_string()),
        };
        assert_eq!(cmd.serialize("A003"), b"A003 AUTHENTICATE XOAUTH2 dXNlcj0=\r\n");

        let cmd = Command::Authenticate {
            mechanism: "PLAIN".to_string(),
            initial_response: None,
        };
        assert_eq!(cmd.serialize("A004"), b"A004 AUTHENTICATE PLAIN\r\n");
    }

    #[test]
    fn test_select_command() {
        let cmd = Command::Select {
            mailbox: Mailbox::inbox(),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 SELECT INBOX\r\n");

        let cmd = Command::Select {
            mailbox: Mailbox::new("Sent Items"),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 SELECT \"Sent Items\"\r\n");
    }

    #[test]
    fn test_list_command() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(cmd.serialize("A001"), b"A001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn test_fetch_command() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::single(7).unwrap(),
            items: vec![
                FetchAttribute::Flags,
                FetchAttribute::Uid,
                FetchAttribute::InternalDate,
                FetchAttribute::full_body(true),
            ],
        };
        assert_eq!(
            cmd.serialize("A005"),
            b"A005 FETCH 7 (FLAGS UID INTERNALDATE BODY.PEEK[])\r\n"
        );
    }

    #[test]
    fn test_search_command() {
        let cmd = Command::Search {
            criteria: SearchCriteria::And(vec![
                SearchCriteria::Unseen,
                SearchCriteria::From("boss@example.com".to_string()),
                SearchCriteria::Since(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()),
            ]),
        };
        assert_eq!(
            cmd.serialize("A006"),
            b"A006 SEARCH UNSEEN FROM boss@example.com SINCE 1-Oct-2025\r\n"
        );
    }

    #[test]
    fn test_search_utf8_uses_charset_and_literal() {
        let cmd = Command::Search {
            criteria: SearchCriteria::Subject("Größe".to_string()),
        };
        let parts = cmd.serialize_parts("A007");
        assert_eq!(parts[0], b"A007 SEARCH CHARSET UTF-8 SUBJECT {7}\r\n");
        assert_eq!(parts[1], "Größe\r\n".as_bytes());
    }
}
