//! Message composition.
//!
//! [`Composer`] collects body fragments, inline images and attachments in
//! call order and produces an immutable [`Email`]. Files are read when they
//! are added, so a bad path fails here instead of halfway through a send.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasher, Hash};
use std::path::Path;

use ezmail_mime::ContentType;
use ezmail_mime::mime_type::{guess_from_path, guess_or_octet_stream};

use crate::html::{escape_text, to_plain_text};
use crate::template::{self, INLINE_TEMPLATE};
use crate::{Error, Result, read_resource};

/// Layout and identity of an inline image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageOptions {
    /// CSS width, e.g. `"200px"` or `"50%"`.
    pub width: Option<String>,
    /// CSS height.
    pub height: Option<String>,
    /// Content-ID the caller's HTML refers to as `cid:<id>`. When unset an
    /// id is generated and an `<img>` tag is inserted at this position.
    pub cid: Option<String>,
}

impl ImageOptions {
    /// Options with nothing set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the width.
    #[must_use]
    pub fn width(mut self, width: impl Into<String>) -> Self {
        self.width = Some(width.into());
        self
    }

    /// Sets the height.
    #[must_use]
    pub fn height(mut self, height: impl Into<String>) -> Self {
        self.height = Some(height.into());
        self
    }

    /// Sets an explicit Content-ID.
    #[must_use]
    pub fn cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }
}

/// An image shown inside the HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Content-ID, without angle brackets.
    pub cid: String,
    /// File name announced in Content-Disposition.
    pub filename: String,
    /// `image/*` type guessed from the file name.
    pub content_type: ContentType,
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// CSS width of the generated tag.
    pub width: Option<String>,
    /// CSS height of the generated tag.
    pub height: Option<String>,
    /// Whether the composer generated the id and the `<img>` tag.
    pub generated: bool,
}

impl InlineImage {
    /// The `<img>` tag inserted for generated ids.
    #[must_use]
    pub fn tag(&self) -> String {
        let mut style = String::new();
        if let Some(width) = &self.width {
            style.push_str(&format!("width:{width};"));
        }
        if let Some(height) = &self.height {
            style.push_str(&format!("height:{height};"));
        }
        if style.is_empty() {
            format!("<br><img src=\"cid:{}\"><br>", self.cid)
        } else {
            format!("<br><img src=\"cid:{}\" style=\"{style}\"><br>", self.cid)
        }
    }
}

/// A file attached to the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name announced in Content-Disposition.
    pub filename: String,
    /// Type guessed from the extension.
    pub content_type: ContentType,
    /// Raw bytes.
    pub data: Vec<u8>,
}

/// One piece of the body, in the order it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// HTML inserted verbatim.
    Html(String),
    /// Text, escaped into the HTML body.
    Text(String),
    /// Inline image.
    Image(InlineImage),
}

/// A composed message, ready to be assembled and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    subject: String,
    fragments: Vec<Fragment>,
    plain: Option<String>,
    attachments: Vec<Attachment>,
}

impl Email {
    /// Subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Body fragments in order.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The HTML body: every fragment concatenated, with tags for images
    /// whose id was generated.
    #[must_use]
    pub fn html_body(&self) -> String {
        let mut html = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Html(markup) => html.push_str(markup),
                Fragment::Text(text) => html.push_str(&escape_text(text)),
                Fragment::Image(image) if image.generated => html.push_str(&image.tag()),
                Fragment::Image(_) => {}
            }
        }
        html
    }

    /// The explicit plain alternative, or one derived from the HTML body.
    #[must_use]
    pub fn plain_body(&self) -> String {
        self.plain
            .clone()
            .unwrap_or_else(|| to_plain_text(&self.html_body()))
    }

    /// Inline images in order.
    pub fn inline_images(&self) -> impl Iterator<Item = &InlineImage> {
        self.fragments.iter().filter_map(|fragment| match fragment {
            Fragment::Image(image) => Some(image),
            _ => None,
        })
    }

    /// Attachments in order.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

/// Consuming builder for [`Email`].
///
/// ```
/// use ezmail::{Composer, ImageOptions};
///
/// let email = Composer::new()
///     .subject("Welcome!")
///     .add_text("<h1>Hello!</h1>")
///     .add_image_bytes("logo.png", vec![0x89, b'P', b'N', b'G'], ImageOptions::new().width("100px"))?
///     .add_attachment_bytes("notes.txt", b"see you".to_vec())?
///     .finish()?;
///
/// assert_eq!(email.inline_images().count(), 1);
/// # Ok::<(), ezmail::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Composer {
    subject: String,
    fragments: Vec<Fragment>,
    plain: Option<String>,
    attachments: Vec<Attachment>,
}

impl Composer {
    /// Starts an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Appends HTML verbatim.
    #[must_use]
    pub fn add_text(mut self, html: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Html(html.into()));
        self
    }

    /// Appends plain text, escaped for HTML with newlines as `<br>`.
    #[must_use]
    pub fn add_plain_text(mut self, text: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Text(text.into()));
        self
    }

    /// Sets the `text/plain` alternative instead of deriving it.
    #[must_use]
    pub fn plain_alternative(mut self, text: impl Into<String>) -> Self {
        self.plain = Some(text.into());
        self
    }

    /// Renders an `.html` template file and appends it as HTML.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`], [`Error::InvalidInput`] for another
    /// extension, or [`Error::TemplateRender`].
    pub fn use_template<K, V, H>(self, path: impl AsRef<Path>, vars: &HashMap<K, V, H>) -> Result<Self>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<str>,
        H: BuildHasher,
    {
        let html = template::render_file(path.as_ref(), vars)?;
        Ok(self.add_text(html))
    }

    /// Renders an in-memory template and appends it as HTML.
    ///
    /// # Errors
    ///
    /// [`Error::TemplateRender`].
    pub fn render_template<K, V, H>(self, source: &str, vars: &HashMap<K, V, H>) -> Result<Self>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<str>,
        H: BuildHasher,
    {
        let html = template::render(INLINE_TEMPLATE, source, vars)?;
        Ok(self.add_text(html))
    }

    /// Adds an inline image from a file.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`], or [`Error::InvalidInput`] when the
    /// extension is not a known image type or the cid is malformed.
    pub fn add_image(self, path: impl AsRef<Path>, options: ImageOptions) -> Result<Self> {
        let path = path.as_ref();
        let data = read_resource(path)?;
        self.add_image_bytes(file_name(path), data, options)
    }

    /// Adds an inline image from memory. `name` picks the content type.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when `name` is not a known image type or the
    /// cid is malformed.
    pub fn add_image_bytes(
        mut self,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
        options: ImageOptions,
    ) -> Result<Self> {
        let filename = name.into();
        let content_type = guess_from_path(&filename)
            .filter(ContentType::is_image)
            .ok_or_else(|| Error::InvalidInput(format!("{filename} is not a recognized image type")))?;

        let (cid, generated) = match options.cid {
            Some(cid) => {
                validate_cid(&cid)?;
                (cid, false)
            }
            None => (self.generate_cid(), true),
        };

        self.fragments.push(Fragment::Image(InlineImage {
            cid,
            filename,
            content_type,
            data: data.into(),
            width: options.width,
            height: options.height,
            generated,
        }));
        Ok(self)
    }

    /// Attaches a file.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceNotFound`] if the file is missing.
    pub fn add_attachment(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_resource(path)?;
        self.add_attachment_bytes(file_name(path), data)
    }

    /// Attaches bytes under a file name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an empty file name.
    pub fn add_attachment_bytes(mut self, filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Result<Self> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(Error::InvalidInput("attachment file name is empty".to_string()));
        }
        self.attachments.push(Attachment {
            content_type: guess_or_octet_stream(&filename),
            filename,
            data: data.into(),
        });
        Ok(self)
    }

    /// Drops all body fragments and inline images.
    #[must_use]
    pub fn clear_body(mut self) -> Self {
        self.fragments.clear();
        self
    }

    /// Drops all attachments.
    #[must_use]
    pub fn clear_attachments(mut self) -> Self {
        self.attachments.clear();
        self
    }

    /// Checks inline image references and produces the message.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if two images share an id, or if an id is
    /// not referenced exactly once as `cid:<id>` in the HTML body.
    pub fn finish(self) -> Result<Email> {
        let email = Email {
            subject: self.subject,
            fragments: self.fragments,
            plain: self.plain,
            attachments: self.attachments,
        };

        let html = email.html_body();
        let mut seen = HashSet::new();
        for image in email.inline_images() {
            if !seen.insert(image.cid.as_str()) {
                return Err(Error::InvalidInput(format!("duplicate inline image id {}", image.cid)));
            }
            let references = count_cid_references(&html, &image.cid);
            if references != 1 {
                return Err(Error::InvalidInput(format!(
                    "inline image {} must be referenced exactly once as cid:{}, found {references}",
                    image.filename, image.cid
                )));
            }
        }
        Ok(email)
    }

    fn generate_cid(&self) -> String {
        loop {
            let cid = format!("img{:08x}", rand::random::<u32>());
            let taken = self
                .fragments
                .iter()
                .any(|f| matches!(f, Fragment::Image(image) if image.cid == cid));
            if !taken {
                return cid;
            }
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

const fn is_cid_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | '$' | '%' | '+' | '=')
}

fn validate_cid(cid: &str) -> Result<()> {
    if cid.is_empty() || !cid.chars().all(is_cid_char) {
        return Err(Error::InvalidInput(format!("invalid content id {cid:?}")));
    }
    Ok(())
}

/// Counts `cid:<id>` occurrences not followed by another id character, so
/// `cid:logo` does not match inside `cid:logo2`.
fn count_cid_references(html: &str, cid: &str) -> usize {
    let needle = format!("cid:{cid}");
    html.match_indices(&needle)
        .filter(|(at, _)| !html[at + needle.len()..].starts_with(is_cid_char))
        .count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_fragments_keep_order() {
        let email = Composer::new()
            .subject("Order")
            .add_text("<h1>One</h1>")
            .add_plain_text("two & three\nfour")
            .add_text("<p>five</p>")
            .finish()
            .unwrap();
        assert_eq!(email.html_body(), "<h1>One</h1>two &amp; three<br>four<p>five</p>");
        // Tags are dropped without inserting separators.
        assert_eq!(email.plain_body(), "Onetwo & threefourfive");

        let spaced = Composer::new()
            .add_text("<h1>One</h1>\n")
            .add_text("<p>two  <b>three</b></p>")
            .finish()
            .unwrap();
        assert_eq!(spaced.plain_body(), "One two three");
    }

    #[test]
    fn test_generated_cid_inserts_tag() {
        let email = Composer::new()
            .add_text("<p>Hi</p>")
            .add_image_bytes("logo.png", PNG, ImageOptions::new().width("100px"))
            .unwrap()
            .finish()
            .unwrap();

        let image = email.inline_images().next().unwrap();
        assert!(image.generated);
        assert_eq!(image.cid.len(), 11);
        assert!(image.cid.starts_with("img"));
        assert!(image.cid[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(
            email.html_body(),
            format!("<p>Hi</p><br><img src=\"cid:{}\" style=\"width:100px;\"><br>", image.cid)
        );
        assert_eq!(image.content_type.essence(), "image/png");
    }

    #[test]
    fn test_tag_without_size_has_no_style() {
        let email = Composer::new()
            .add_image_bytes("a.jpg", PNG, ImageOptions::new())
            .unwrap()
            .finish()
            .unwrap();
        let image = email.inline_images().next().unwrap();
        assert_eq!(image.tag(), format!("<br><img src=\"cid:{}\"><br>", image.cid));
    }

    #[test]
    fn test_explicit_cid_must_be_referenced_once() {
        let ok = Composer::new()
            .add_text("<img src=\"cid:logo\">")
            .add_image_bytes("logo.png", PNG, ImageOptions::new().cid("logo"))
            .unwrap()
            .finish();
        assert!(ok.is_ok());

        let missing = Composer::new()
            .add_text("<p>no image here</p>")
            .add_image_bytes("logo.png", PNG, ImageOptions::new().cid("logo"))
            .unwrap()
            .finish();
        assert!(matches!(missing, Err(Error::InvalidInput(_))));

        let twice = Composer::new()
            .add_text("<img src=\"cid:logo\"><img src=\"cid:logo\">")
            .add_image_bytes("logo.png", PNG, ImageOptions::new().cid("logo"))
            .unwrap()
            .finish();
        assert!(matches!(twice, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_prefix_cid_is_not_a_reference() {
        let result = Composer::new()
            .add_text("<img src=\"cid:logo2\">")
            .add_image_bytes("logo.png", PNG, ImageOptions::new().cid("logo"))
            .unwrap()
            .finish();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_cid() {
        let result = Composer::new()
            .add_text("<img src=\"cid:logo\">")
            .add_image_bytes("a.png", PNG, ImageOptions::new().cid("logo"))
            .unwrap()
            .add_image_bytes("b.png", PNG, ImageOptions::new().cid("logo"))
            .unwrap()
            .finish();
        assert!(matches!(result, Err(Error::InvalidInput(ref msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_accepts_any_guessable_image_type() {
        let email = Composer::new()
            .add_image_bytes("photo.webp", PNG, ImageOptions::new())
            .unwrap()
            .add_image_bytes("scan.tif", PNG, ImageOptions::new())
            .unwrap()
            .finish()
            .unwrap();
        let types: Vec<String> = email.inline_images().map(|i| i.content_type.essence()).collect();
        assert_eq!(types, vec!["image/webp", "image/tiff"]);
    }

    #[test]
    fn test_rejects_non_image() {
        let result = Composer::new().add_image_bytes("report.pdf", PNG, ImageOptions::new());
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let result = Composer::new().add_image_bytes("a.png", PNG, ImageOptions::new().cid("has space"));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_missing_files() {
        let result = Composer::new().add_attachment("/nonexistent/report.pdf");
        assert!(matches!(result, Err(Error::ResourceNotFound(ref p)) if p.ends_with("report.pdf")));

        let result = Composer::new().add_image("/nonexistent/logo.png", ImageOptions::new());
        assert!(matches!(result, Err(Error::ResourceNotFound(_))));
    }

    #[test]
    fn test_attachment_from_file() {
        let dir = std::env::temp_dir().join(format!("ezmail-composer-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let email = Composer::new().add_attachment(&path).unwrap().finish().unwrap();
        let attachment = &email.attachments()[0];
        assert_eq!(attachment.filename, "report.pdf");
        assert_eq!(attachment.content_type.essence(), "application/pdf");
        assert_eq!(attachment.data, b"%PDF-1.4");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_clear() {
        let email = Composer::new()
            .add_text("<p>old</p>")
            .add_attachment_bytes("a.bin", vec![1, 2, 3])
            .unwrap()
            .clear_body()
            .clear_attachments()
            .add_text("<p>new</p>")
            .finish()
            .unwrap();
        assert_eq!(email.html_body(), "<p>new</p>");
        assert!(email.attachments().is_empty());
    }

    #[test]
    fn test_render_template_and_plain_alternative() {
        let vars: HashMap<&str, &str> = [("name", "Ana")].into_iter().collect();
        let email = Composer::new()
            .render_template("<p>Hi {{ name }}</p>", &vars)
            .unwrap()
            .plain_alternative("Hi Ana (plain)")
            .finish()
            .unwrap();
        assert_eq!(email.html_body(), "<p>Hi Ana</p>");
        assert_eq!(email.plain_body(), "Hi Ana (plain)");
    }

    #[test]
    fn test_empty_body_plain_placeholder() {
        let email = Composer::new().finish().unwrap();
        assert_eq!(email.plain_body(), crate::html::EMPTY_TEXT_PLACEHOLDER);
    }
}
