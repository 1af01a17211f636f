//! # ezmail-smtp
//!
//! Async SMTP submission client (RFC 5321).
//!
//! ## Features
//!
//! - **Type-state connection management**: authentication must happen
//!   before a mail transaction can be started
//! - **TLS support**: implicit TLS (port 465) and STARTTLS
//! - **Authentication**: PLAIN, LOGIN, XOAUTH2
//! - **Extensions**: SIZE, 8BITMIME
//! - **Transaction recovery**: a rejected transaction is reset with RSET so
//!   the session can be reused
//!
//! ## Quick Start
//!
//! ```ignore
//! use ezmail_smtp::{Address, AuthMechanism, Client};
//! use ezmail_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> ezmail_smtp::Result<()> {
//!     let stream = connect("smtp.example.com", 587).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.ehlo("client.example.com").await?;
//!     let client = client.starttls("smtp.example.com").await?;
//!
//!     // Base64 of "\0user\0password"
//!     let mut client = client
//!         .auth(AuthMechanism::Plain, "AHVzZXIAcGFzc3dvcmQ=".into())
//!         .await?;
//!
//!     let from = Address::new("sender@example.com")?;
//!     let to = [Address::new("recipient@example.com")?];
//!     client
//!         .send_mail(&from, &to, b"Subject: Test\r\n\r\nHello!\r\n")
//!         .await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ── auth() / auth_login() ──→ Authenticated ── send_mail() (repeatable)
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders and DATA encoding
//! - [`connection`]: transport and type-state client
//! - [`parser`]: reply parser
//! - [`types`]: addresses, extensions, replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{Authenticated, Client, Connected, ServerInfo, SmtpStream};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
