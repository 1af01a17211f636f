//! Sequential command tags.

use crate::types::Tag;

/// Hands out `A0001`, `A0002`, ... for one connection.
///
/// The counter wraps rather than overflowing. A tag only has to differ from
/// the one command in flight.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    issued: u32,
}

impl TagGenerator {
    /// Starts a sequence with `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, issued: 0 }
    }

    /// The next tag.
    #[must_use]
    pub fn next(&mut self) -> Tag {
        self.issued = self.issued.wrapping_add(1);
        Tag::new(format!("{}{:04}", self.prefix, self.issued))
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_and_padding() {
        let mut tags = TagGenerator::new('X');
        assert_eq!(tags.next().as_str(), "X0001");
        for _ in 0..98 {
            let _ = tags.next();
        }
        assert_eq!(tags.next().as_str(), "X0100");
    }

    #[test]
    fn test_wraps_without_panicking() {
        let mut tags = TagGenerator {
            prefix: 'A',
            issued: u32::MAX,
        };
        assert_eq!(tags.next().as_str(), "A0000");
        assert_eq!(tags.next().as_str(), "A0001");
    }
}
