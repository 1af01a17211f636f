//! # ezmail-imap
//!
//! An async IMAP4rev1 client (RFC 3501) covering what a mail reader needs:
//! authentication, mailbox listing, selection, search and fetch.
//!
//! ## Features
//!
//! - **Type-state connection management**: compile-time enforcement of valid
//!   IMAP state transitions (`NotAuthenticated` → `Authenticated` → `Selected`)
//! - **LOGIN and SASL**: plain LOGIN plus AUTHENTICATE with an initial
//!   response (XOAUTH2, PLAIN), with or without SASL-IR
//! - **TLS via rustls**: implicit TLS and STARTTLS without OpenSSL
//! - **Sans-I/O parser**: protocol parsing separated from network I/O
//!
//! ## Quick Start
//!
//! ```no_run
//! use ezmail_imap::{Client, Config, FetchAttribute, SearchCriteria, SequenceSet};
//!
//! # async fn run() -> ezmail_imap::Result<()> {
//! let config = Config::new("imap.example.com");
//! let stream = ezmail_imap::connect(&config).await?;
//! let client = Client::from_stream(stream).await?;
//! let mut client = client.login("user@example.com", "password").await?;
//!
//! for folder in client.list("", "*").await? {
//!     println!("{}", folder.mailbox);
//! }
//!
//! let mut inbox = client.select("INBOX").await.map_err(|rejected| rejected.error)?;
//! let unseen = inbox.search(&SearchCriteria::Unseen).await?;
//! if let Some(set) = SequenceSet::from_ids(&unseen) {
//!     let messages = inbox.fetch(&set, &[FetchAttribute::full_body(true)]).await?;
//!     println!("fetched {}", messages.len());
//! }
//! inbox.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login()/authenticate() ──→ Authenticated
//! Authenticated    ── select() ──→ Selected
//! Selected         ── close() ──→ Authenticated
//! ```
//!
//! A rejected `select()` hands the session back in the authenticated state
//! inside [`SelectRejected`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, SearchCriteria, TagGenerator, format_search_date};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, ImapStream, NotAuthenticated, SelectRejected,
    Security, Selected, connect,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    SeqNum, SequenceSet, Status, Tag, Uid, UidValidity,
};
