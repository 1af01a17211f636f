//! Command tags and the non-zero numeric identifiers IMAP hands out.

use std::fmt;
use std::num::NonZeroU32;

/// Tag correlating a command with its tagged completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(String);

impl Tag {
    /// Wraps a tag string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a raw response line starts with this tag followed by a
    /// space, i.e. is the completion of the tagged command.
    #[must_use]
    pub fn begins(&self, line: &[u8]) -> bool {
        line.strip_prefix(self.0.as_bytes())
            .is_some_and(|rest| rest.first() == Some(&b' '))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declares a `NonZeroU32` newtype. Zero is never a valid identifier on the
/// wire, so construction returns `None` for it.
macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Returns `None` for 0.
            #[must_use]
            pub const fn new(n: u32) -> Option<Self> {
                match NonZeroU32::new(n) {
                    Some(n) => Some(Self(n)),
                    None => None,
                }
            }

            /// The numeric value.
            #[must_use]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonzero_id!(
    /// Position of a message in the selected mailbox. Shifts on expunge.
    SeqNum
);

nonzero_id!(
    /// Message identifier that stays stable while UIDVALIDITY does.
    Uid
);

nonzero_id!(
    /// Mailbox epoch. A change invalidates every cached UID.
    UidValidity
);
