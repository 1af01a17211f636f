//! Command-related type definitions.

use chrono::NaiveDate;

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// UID.
    Uid,
    /// Body section.
    Body {
        /// Section specifier; `None` for the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
    },
}

impl FetchAttribute {
    /// The whole message, optionally without setting `\Seen`.
    #[must_use]
    pub const fn full_body(peek: bool) -> Self {
        Self::Body {
            section: None,
            peek,
        }
    }
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with `\Seen`.
    Seen,
    /// Messages without `\Seen`.
    Unseen,
    /// FROM header contains the string.
    From(String),
    /// Subject contains the string.
    Subject(String),
    /// Body contains the string.
    Body(String),
    /// Header or body contains the string.
    Text(String),
    /// Internal date is on the day.
    On(NaiveDate),
    /// Internal date is on or after the day.
    Since(NaiveDate),
    /// Internal date is before the day.
    Before(NaiveDate),
    /// All criteria must match.
    And(Vec<Self>),
    /// The criterion must not match.
    Not(Box<Self>),
}

impl SearchCriteria {
    /// Returns true if any string argument is non-ASCII, which requires
    /// `CHARSET UTF-8`.
    #[must_use]
    pub fn needs_utf8(&self) -> bool {
        match self {
            Self::From(s) | Self::Subject(s) | Self::Body(s) | Self::Text(s) => !s.is_ascii(),
            Self::And(items) => items.iter().any(Self::needs_utf8),
            Self::Not(inner) => inner.needs_utf8(),
            Self::All
            | Self::Seen
            | Self::Unseen
            | Self::On(_)
            | Self::Since(_)
            | Self::Before(_) => false,
        }
    }
}
