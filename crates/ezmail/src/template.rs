//! `{{ name }}` placeholder templates.
//!
//! Placeholders may carry whitespace inside the braces. `{{{{` emits a
//! literal `{{`. Every placeholder must be bound, an unbound one is an
//! error rather than an empty string.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};
use std::path::Path;

use crate::{Error, Result};

/// Name reported for templates rendered from memory.
pub const INLINE_TEMPLATE: &str = "<inline>";

/// Renders `source`, substituting values from `vars`.
///
/// `name` only appears in error messages.
///
/// # Errors
///
/// Returns [`Error::TemplateRender`] for an unbound placeholder, an empty
/// placeholder or an unterminated `{{`.
pub fn render<K, V, H>(name: &str, source: &str, vars: &HashMap<K, V, H>) -> Result<String>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    H: BuildHasher,
{
    let fail = |reason: String| Error::TemplateRender {
        template: name.to_string(),
        reason,
    };

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        if let Some(escaped) = after.strip_prefix("{{") {
            out.push_str("{{");
            rest = escaped;
            continue;
        }

        let end = after
            .find("}}")
            .ok_or_else(|| fail(format!("unterminated placeholder at byte {start}")))?;
        let key = after[..end].trim();
        if key.is_empty() {
            return Err(fail(format!("empty placeholder at byte {start}")));
        }
        let value = vars
            .get(key)
            .ok_or_else(|| fail(format!("missing value for '{key}'")))?;
        out.push_str(value.as_ref());
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Reads and renders an `.html` template file.
///
/// # Errors
///
/// Returns [`Error::ResourceNotFound`] if the file is missing,
/// [`Error::InvalidInput`] if it is not `.html`, plus any error of
/// [`render`].
pub fn render_file<K, V, H>(path: &Path, vars: &HashMap<K, V, H>) -> Result<String>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    H: BuildHasher,
{
    let source = crate::read_resource(path)?;
    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if !is_html {
        return Err(Error::InvalidInput(format!(
            "template {} must have a .html extension",
            path.display()
        )));
    }
    let source = String::from_utf8(source).map_err(|_| Error::TemplateRender {
        template: path.display().to_string(),
        reason: "template is not valid UTF-8".to_string(),
    })?;

    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    render(&name, &source, vars)
}
