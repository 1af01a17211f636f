//! # ezmail-mime
//!
//! MIME entity model and codec used by `ezmail` to assemble outgoing
//! messages and to take apart fetched ones.
//!
//! ## Features
//!
//! - **Entity tree**: [`Part`] with leaf or multipart [`Body`]
//! - **Parsing**: nested multipart with lenient delimiter handling
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words
//! - **Parameters**: quoted values and RFC 2231 extended file names
//! - **Type guessing**: content type from a file extension
//!
//! ## Quick Start
//!
//! ### Parsing
//!
//! ```ignore
//! use ezmail_mime::Message;
//!
//! let message = Message::parse(raw_bytes)?;
//! println!("Subject: {}", message.subject().unwrap_or_default());
//! if let Some(text) = message.text_part() {
//!     println!("{}", text.body_text()?);
//! }
//! for attachment in message.attachments() {
//!     println!("{:?}", attachment.filename());
//! }
//! ```
//!
//! ### Building
//!
//! ```ignore
//! use ezmail_mime::{ContentType, Part};
//!
//! let body = Part::multipart(
//!     "alternative",
//!     vec![
//!         Part::text(ContentType::text_plain(), "Hello"),
//!         Part::text(ContentType::text_html(), "<p>Hello</p>"),
//!     ],
//! )
//! .with_header("Subject", "Greetings");
//!
//! let bytes = body.to_bytes()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod disposition;
mod error;
mod header;
mod message;
mod params;
mod part;

pub mod encoding;
pub mod mime_type;

pub use content_type::ContentType;
pub use disposition::{ContentDisposition, DispositionType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::Message;
pub use part::{Body, Part, TransferEncoding, generate_boundary};
