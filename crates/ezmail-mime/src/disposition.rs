//! Content-Disposition header (RFC 2183).

use crate::error::{Error, Result};
use crate::params;
use std::collections::BTreeMap;
use std::fmt;

/// Presentation style of a body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionType {
    /// Displayed as part of the message.
    Inline,
    /// Kept separate from the message body.
    Attachment,
    /// Any other token.
    Other(String),
}

impl DispositionType {
    fn as_str(&self) -> &str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
            Self::Other(token) => token,
        }
    }
}

/// Parsed Content-Disposition header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub kind: DispositionType,
    /// Parameters keyed by lowercase name.
    pub parameters: BTreeMap<String, String>,
}

impl ContentDisposition {
    /// `inline` disposition without parameters.
    #[must_use]
    pub const fn inline() -> Self {
        Self {
            kind: DispositionType::Inline,
            parameters: BTreeMap::new(),
        }
    }

    /// `attachment` disposition without parameters.
    #[must_use]
    pub const fn attachment() -> Self {
        Self {
            kind: DispositionType::Attachment,
            parameters: BTreeMap::new(),
        }
    }

    /// Sets the `filename` parameter.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.parameters.insert("filename".to_string(), filename.into());
        self
    }

    /// Returns the `filename` parameter (already RFC 2231 decoded).
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }

    /// Checks for the `attachment` type.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == DispositionType::Attachment
    }

    /// Parses a header value such as `attachment; filename="a.pdf"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the disposition type is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let mut segments = params::split_unquoted(s, ';').into_iter();
        let token = segments.next().unwrap_or_default().trim().to_ascii_lowercase();

        let kind = match token.as_str() {
            "" => return Err(Error::InvalidDisposition(s.to_string())),
            "inline" => DispositionType::Inline,
            "attachment" => DispositionType::Attachment,
            _ => DispositionType::Other(token),
        };

        Ok(Self {
            kind,
            parameters: params::parse(segments),
        })
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        for (key, value) in &self.parameters {
            params::write(f, key, value)?;
        }
        Ok(())
    }
}
