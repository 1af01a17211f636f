//! # ezmail
//!
//! Compose, send and read email without orchestrating SMTP, IMAP or MIME
//! by hand.
//!
//! This crate provides:
//! - **Message Composer** - HTML and text fragments, `{{ key }}` templates,
//!   inline images referenced by `cid:`, attachments
//! - **MIME Assembler** - `multipart/alternative` wrapped in `related` and
//!   `mixed` as needed
//! - **Sender** - SMTP submission with an optional hourly cap
//! - **Reader** - IMAP search filters and lazily fetched, parsed messages
//! - **Blocking facade** - the same API for synchronous callers
//!
//! Password and `OAuth2` bearer token authentication are supported on both
//! protocols.
//!
//! ```no_run
//! use ezmail::{
//!     Composer, Credentials, FetchFilters, ImageOptions, Reader, ReaderConfig, Sender,
//!     SenderConfig, ServerConfig, StatusFilter,
//! };
//!
//! # async fn run() -> ezmail::Result<()> {
//! let credentials = Credentials::password("me@example.com", "app-password");
//!
//! let email = Composer::new()
//!     .subject("Welcome!")
//!     .add_text("<h1>Hello!</h1>")
//!     .add_image("logo.png", ImageOptions::new().width("120px"))?
//!     .add_attachment("terms.pdf")?
//!     .finish()?;
//!
//! let config = SenderConfig::new(ServerConfig::new("smtp.example.com", 587));
//! let mut sender = Sender::new(config, credentials.clone());
//! sender.connect().await?;
//! sender.send(&email, "you@example.com").await?;
//! sender.disconnect().await;
//!
//! let mut reader = Reader::new(ReaderConfig::new(ServerConfig::new("imap.example.com", 993)), credentials);
//! reader.connect().await?;
//! let filters = FetchFilters::new()
//!     .status(StatusFilter::Unseen)
//!     .since(FetchFilters::parse_date("01-Oct-2025")?);
//! for mail in reader.fetch_messages(&filters).await?.collect_all().await? {
//!     println!("{} | {}", mail.sender, mail.summary(60));
//! }
//! reader.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod assembler;
pub mod blocking;
pub mod composer;
pub mod config;
pub mod credentials;
mod error;
pub mod filters;
pub mod html;
pub mod mail;
pub mod rate_limit;
pub mod reader;
pub mod sender;
pub mod template;

use std::path::Path;

pub use assembler::{Envelope, assemble};
pub use composer::{Attachment, Composer, Email, Fragment, ImageOptions, InlineImage};
pub use config::{ReaderConfig, Security, SenderConfig, ServerConfig};
pub use credentials::{Credentials, Secret};
pub use error::{Error, Result};
pub use filters::{FetchFilters, StatusFilter};
pub use mail::{FetchedMail, MailAttachment};
pub use rate_limit::RateLimiter;
pub use reader::{MessageStream, Reader};
pub use sender::{Recipients, SendReport, Sender};

/// Reads a file given by the caller, reporting a missing one as
/// [`Error::ResourceNotFound`].
pub(crate) fn read_resource(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::ResourceNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}
