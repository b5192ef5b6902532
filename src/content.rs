//! Rich note content.
use std::{collections::HashMap, fmt};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    enml_text, enml_to_html, expand_empty_root, markdown_to_html, media_hashes, plain_text_to_enml_body,
    sanitize_html_to_enml_body, validate_enml, wrap_enml, MediaLink, NoteError, RenderedHtml,
    Resource, Result,
};

/// Content that can be turned into the main HTML document of a web archive.
///
/// `resolve` maps a media hash to the location the page loads it from.
pub trait ArchivableContent: Send + Sync {
    fn render_html(
        &self,
        resolve: &mut dyn FnMut(&str) -> Option<MediaLink>,
    ) -> Result<RenderedHtml>;
}

/// The content of a note, held as an ENML document.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NoteContent {
    enml: String,
}

impl Default for NoteContent {
    fn default() -> Self {
        NoteContent {
            enml: wrap_enml(""),
        }
    }
}

impl NoteContent {
    /// Plain text, escaped, one `<div>` per line
    pub fn from_plain_text(text: &str) -> Self {
        NoteContent {
            enml: wrap_enml(&plain_text_to_enml_body(text)),
        }
    }

    /// Markdown rendered to HTML and then sanitized
    pub fn from_markdown(markdown: &str) -> Result<Self> {
        Self::from_sanitized_html(&markdown_to_html(markdown))
    }

    /// Arbitrary HTML with everything ENML forbids stripped out
    pub fn from_sanitized_html(html: &str) -> Result<Self> {
        let body = sanitize_html_to_enml_body(html)?;
        debug!("Sanitized {} bytes of HTML into {} bytes of ENML", html.len(), body.len());
        Ok(NoteContent {
            enml: wrap_enml(&body),
        })
    }

    /// An ENML document taken as is. A self-closing `<en-note/>` root is
    /// stored as an open and close pair.
    pub fn from_enml(enml: impl Into<String>) -> Result<Self> {
        let enml = enml.into();
        validate_enml(&enml)?;
        Ok(NoteContent {
            enml: expand_empty_root(&enml),
        })
    }

    /// The full ENML document
    pub fn enml(&self) -> &str {
        &self.enml
    }

    pub fn into_enml(self) -> String {
        self.enml
    }

    /// True when the document has neither text nor media.
    pub fn is_empty(&self) -> bool {
        self.media_hashes().is_empty() && enml_text(&self.enml).is_empty()
    }

    /// Hashes of the resources the content embeds, in document order.
    pub fn media_hashes(&self) -> Vec<String> {
        media_hashes(&self.enml)
    }

    /// The document text without markup.
    pub fn plain_text(&self) -> String {
        enml_text(&self.enml)
    }

    /// Appends an `<en-media>` reference to the resource at the end of the note.
    pub fn append_media(&mut self, resource: &Resource) {
        self.append_enml(&format!("<div>{}</div>", resource.media_tag()));
    }

    /// Appends an ENML fragment right before the closing root tag.
    pub fn append_enml(&mut self, fragment: &str) {
        self.enml = expand_empty_root(&self.enml);
        match self.enml.to_ascii_lowercase().rfind("</en-note>") {
            Some(idx) => self.enml.insert_str(idx, fragment),
            // from_enml guarantees a closing tag
            None => self.enml.push_str(fragment),
        }
    }

    /// Displayable HTML, with media pointing at `resource_dir/<hash>.<ext>`.
    pub fn to_html(&self, resources: &[Resource], resource_dir: &str) -> Result<String> {
        let by_hash: HashMap<String, &Resource> = resources
            .iter()
            .map(|resource| (resource.data_hash(), resource))
            .collect();

        let rendered = self.render_html(&mut |hash| {
            by_hash
                .get(hash)
                .map(|resource| media_link(resource, resource_dir))
        })?;
        Ok(rendered.html)
    }
}

impl ArchivableContent for NoteContent {
    fn render_html(
        &self,
        resolve: &mut dyn FnMut(&str) -> Option<MediaLink>,
    ) -> Result<RenderedHtml> {
        enml_to_html(&self.enml, resolve)
    }
}

/// Archive-relative link for a resource stored under `resource_dir`.
pub fn media_link(resource: &Resource, resource_dir: &str) -> MediaLink {
    MediaLink {
        href: resource_entry_path(resource, resource_dir),
        mime_type: resource.mime_type().to_string(),
        name: resource.display_name(),
    }
}

/// Path of a resource entry inside a web archive.
pub fn resource_entry_path(resource: &Resource, resource_dir: &str) -> String {
    format!(
        "{}/{}.{}",
        resource_dir.trim_end_matches('/'),
        resource.data_hash(),
        resource.extension()
    )
}

impl fmt::Debug for NoteContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteContent")
            .field("len", &self.enml.len())
            .field("media", &self.media_hashes().len())
            .finish()
    }
}

impl From<NoteContent> for String {
    fn from(content: NoteContent) -> String {
        content.enml
    }
}

impl TryFrom<String> for NoteContent {
    type Error = NoteError;

    fn try_from(enml: String) -> Result<Self> {
        NoteContent::from_enml(enml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ENML_HEADER;

    #[test]
    fn default_is_empty_document() {
        let content = NoteContent::default();
        assert!(content.enml().starts_with(ENML_HEADER));
        assert!(content.enml().ends_with("<en-note></en-note>"));
        assert!(content.is_empty());
    }

    #[test]
    fn plain_text_content() {
        let content = NoteContent::from_plain_text("hello\nworld");
        assert!(content
            .enml()
            .ends_with("<en-note><div>hello</div><div>world</div></en-note>"));
        assert_eq!(content.plain_text(), "hello world");
        assert!(!content.is_empty());
    }

    #[test]
    fn markdown_content_is_valid_enml() {
        let content = NoteContent::from_markdown("# Title\n\nSome *text*.").unwrap();
        assert!(content.enml().contains("<h1>Title</h1>"));
        assert!(content.enml().contains("<em>text</em>"));
    }

    #[test]
    fn from_enml_requires_root() {
        assert!(NoteContent::from_enml("<div>nope</div>").is_err());
        assert!(NoteContent::from_enml(wrap_enml("<div>ok</div>")).is_ok());
    }

    #[test]
    fn self_closing_root_accepts_appends() {
        let mut content = NoteContent::from_enml(format!("{}<en-note/>", ENML_HEADER)).unwrap();
        assert!(content.is_empty());
        assert!(content.enml().ends_with("<en-note></en-note>"));

        content.append_enml("<div>later</div>");
        assert!(content.enml().ends_with("<en-note><div>later</div></en-note>"));
        assert_eq!(content.plain_text(), "later");

        let parsed: NoteContent =
            serde_json::from_value(serde_json::json!(format!("{}<en-note />", ENML_HEADER)))
                .unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn appended_media_is_referenced() {
        let resource = Resource::new(vec![9, 9, 9], "image/gif");
        let mut content = NoteContent::from_plain_text("pic:");
        content.append_media(&resource);

        assert_eq!(content.media_hashes(), vec![resource.data_hash()]);
        assert!(content.enml().ends_with("</en-note>"));
        assert!(!content.is_empty());
    }

    #[test]
    fn media_only_note_is_not_empty() {
        let resource = Resource::new(vec![1], "image/png");
        let mut content = NoteContent::default();
        content.append_media(&resource);
        assert!(!content.is_empty());
    }

    #[test]
    fn html_links_to_resource_dir() {
        let resource = Resource::new(vec![1, 2], "image/png");
        let mut content = NoteContent::default();
        content.append_media(&resource);

        let html = content.to_html(&[resource.clone()], "media/").unwrap();
        assert!(html.contains(&format!(r#"src="media/{}.png""#, resource.data_hash())));
    }

    #[test]
    fn serializes_as_plain_enml_string() {
        let content = NoteContent::from_plain_text("x");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json.as_str().unwrap(), content.enml());

        let bad = serde_json::from_str::<NoteContent>(r#""<p>no root</p>""#);
        assert!(bad.is_err());
    }
}
