//! Small HTML helpers for message bodies.

/// Shown as the plain-text alternative when the HTML has no text at all.
pub const EMPTY_TEXT_PLACEHOLDER: &str = "Content not available.";

/// Escapes text for inclusion in HTML and turns newlines into `<br>`.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("<br>");
            }
            '\n' => out.push_str("<br>"),
            other => out.push(other),
        }
    }
    out
}

/// Derives the plain-text alternative of an HTML body.
///
/// Tags are removed, the common entities decoded and whitespace runs
/// collapsed. Returns [`EMPTY_TEXT_PLACEHOLDER`] if nothing is left.
#[must_use]
pub fn to_plain_text(html: &str) -> String {
    let text = decode_entities(&strip_tags(html));
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        EMPTY_TEXT_PLACEHOLDER.to_string()
    } else {
        collapsed
    }
}

/// Removes every `<...>` span with at least one character inside. A `<`
/// without a closing `>`, or `<>`, stays as text.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) if close > 0 => rest = &after[close + 1..],
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

const ENTITIES: [(&str, &str); 6] = [
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&nbsp;", " "),
    ("&amp;", "&"),
];

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        if let Some((entity, replacement)) = ENTITIES.iter().find(|(e, _)| candidate.starts_with(e)) {
            out.push_str(replacement);
            rest = &candidate[entity.len()..];
        } else {
            out.push('&');
            rest = &candidate[1..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b & c\nnext"), "a &lt; b &amp; c<br>next");
        assert_eq!(escape_text("x\r\ny"), "x<br>y");
    }

    #[test]
    fn test_to_plain_text() {
        assert_eq!(to_plain_text("<p>Hi</p>"), "Hi");
        assert_eq!(
            to_plain_text("<h1>Hello!</h1>\n<p>Welcome   to <b>our</b> platform.</p>"),
            "Hello! Welcome to our platform."
        );
        assert_eq!(to_plain_text("Tom &amp; Jerry&nbsp;&lt;3"), "Tom & Jerry <3");
    }

    #[test]
    fn test_to_plain_text_keeps_stray_brackets() {
        assert_eq!(to_plain_text("a <> b"), "a <> b");
        assert_eq!(to_plain_text("1 < 2"), "1 < 2");
    }

    #[test]
    fn test_empty_falls_back() {
        assert_eq!(to_plain_text("<img src=\"cid:logo\"><br>"), EMPTY_TEXT_PLACEHOLDER);
        assert_eq!(to_plain_text("   "), EMPTY_TEXT_PLACEHOLDER);
    }

    #[test]
    fn test_entities_decode_once() {
        assert_eq!(to_plain_text("&amp;lt;"), "&lt;");
    }

    proptest! {
        #[test]
        fn plain_text_has_no_tags_or_runs(html in ".{0,200}") {
            let text = to_plain_text(&html);
            prop_assert!(!text.is_empty());
            prop_assert!(!text.contains("  "));
            prop_assert_eq!(text.trim(), text.as_str());
        }

        #[test]
        fn escaped_text_survives_stripping(text in "[a-zA-Z0-9<>&\" ]{1,60}") {
            let plain = to_plain_text(&escape_text(&text));
            let expected = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !expected.is_empty() {
                prop_assert_eq!(plain, expected);
            }
        }
    }
}
