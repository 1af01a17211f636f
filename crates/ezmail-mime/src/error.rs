//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid content type.
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid content disposition.
    #[error("invalid content disposition: {0}")]
    InvalidDisposition(String),

    /// Base64 decode error.
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// A multipart entity has no boundary parameter.
    #[error("missing boundary in multipart entity")]
    MissingBoundary,

    /// Invalid multipart structure.
    #[error("invalid multipart structure: {0}")]
    InvalidMultipart(String),

    /// The operation needs a leaf part but got a multipart one, or the reverse.
    #[error("unexpected body kind: {0}")]
    BodyKind(&'static str),
}
