//! Content type lookup by file extension.

use std::path::Path;

use crate::content_type::ContentType;

/// Guesses a content type from a file name's extension.
///
/// Returns `None` for unknown or missing extensions.
#[must_use]
pub fn guess_from_path(path: impl AsRef<Path>) -> Option<ContentType> {
    let mime = mime_guess::from_path(path).first()?;
    let (main, sub) = mime.essence_str().split_once('/')?;
    Some(ContentType::new(main, sub))
}

/// Like [`guess_from_path`], falling back to `application/octet-stream`.
#[must_use]
pub fn guess_or_octet_stream(path: impl AsRef<Path>) -> ContentType {
    guess_from_path(path).unwrap_or_else(|| ContentType::new("application", "octet-stream"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(guess_from_path("logo.PNG").unwrap().essence(), "image/png");
        assert_eq!(guess_from_path("/tmp/photo.jpeg").unwrap().essence(), "image/jpeg");
        assert_eq!(guess_from_path("report.pdf").unwrap().essence(), "application/pdf");
        assert_eq!(guess_from_path("icon.svg").unwrap().essence(), "image/svg+xml");
    }

    #[test]
    fn test_less_common_extensions() {
        assert_eq!(guess_from_path("book.epub").unwrap().essence(), "application/epub+zip");
        assert!(guess_from_path("photo.webp").unwrap().is_image());
    }

    #[test]
    fn test_unknown_extension() {
        assert!(guess_from_path("archive.qqqzz").is_none());
        assert!(guess_from_path("Makefile").is_none());
        assert_eq!(guess_or_octet_stream("notes.qqqzz").essence(), "application/octet-stream");
    }
}
