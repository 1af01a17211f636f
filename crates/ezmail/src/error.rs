//! Error types for the facade.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by composing, sending and reading mail.
#[derive(Debug, Error)]
pub enum Error {
    /// A file given by path does not exist.
    #[error("file not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    /// A template could not be rendered.
    #[error("failed to render template {template}: {reason}")]
    TemplateRender {
        /// Template file name, or `<inline>` for in-memory sources.
        template: String,
        /// What went wrong.
        reason: String,
    },

    /// Caller input was rejected before any network activity.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The server could not be reached, the connection broke or timed out.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server refused the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The SMTP server rejected the mail transaction.
    #[error("delivery failed{}: {message}", .code.map(|c| format!(" ({c})")).unwrap_or_default())]
    Delivery {
        /// SMTP reply code, when the server sent one.
        code: Option<u16>,
        /// Server message.
        message: String,
    },

    /// The hourly sending limit was reached.
    #[error("rate limit of {limit} emails per hour exceeded")]
    RateLimitExceeded {
        /// Configured messages per hour.
        limit: u32,
    },

    /// SELECT was refused for this mailbox.
    #[error("mailbox not found: {0}")]
    MailboxNotFound(String),

    /// The server said something this client did not expect.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A fetched message could not be parsed.
    #[error("MIME error: {0}")]
    Mime(#[from] ezmail_mime::Error),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps an IMAP error outside of authentication and SELECT, where
    /// NO and BAD have no more specific meaning.
    pub(crate) fn from_imap(err: ezmail_imap::Error) -> Self {
        use ezmail_imap::Error as Imap;
        match err {
            Imap::Io(_) | Imap::Tls(_) | Imap::InvalidDnsName(_) | Imap::Timeout(_) | Imap::Bye(_) => {
                Self::Connection(err.to_string())
            }
            other => Self::Protocol(other.to_string()),
        }
    }

    /// Maps an SMTP error raised by a mail transaction.
    pub(crate) fn from_smtp(err: ezmail_smtp::Error) -> Self {
        use ezmail_smtp::Error as Smtp;
        match err {
            Smtp::Rejected { code, message } => Self::Delivery {
                code: Some(code),
                message,
            },
            Smtp::MessageTooLarge { .. } => Self::Delivery {
                code: None,
                message: err.to_string(),
            },
            Smtp::InvalidAddress(reason) => Self::InvalidInput(reason),
            Smtp::Protocol(reason) | Smtp::NotSupported(reason) => Self::Protocol(reason),
            Smtp::Io(_) | Smtp::Tls(_) | Smtp::ConnectionClosed => Self::Connection(err.to_string()),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
