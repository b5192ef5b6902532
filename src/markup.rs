//! ENML conversions.
//!
//! ENML is the XML dialect note content is stored in: an `<en-note>` root
//! holding a restricted subset of XHTML plus the `en-media`, `en-todo` and
//! `en-crypt` elements. This module turns plain text, Markdown and arbitrary
//! HTML into ENML, and ENML back into HTML that a web view can display.
use std::sync::LazyLock;

use lol_html::{
    doc_comments, element,
    html_content::{ContentType, Element},
    HtmlRewriter, Settings,
};
use log::{debug, trace, warn};
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

use crate::{NoteError, Result};

/// XML declaration and doctype that open every ENML document.
pub const ENML_HEADER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "\n",
    r#"<!DOCTYPE en-note SYSTEM "http://xml.evernote.com/pub/enml2.dtd">"#,
    "\n"
);

/// Elements dropped together with everything inside them.
const REMOVED_ELEMENTS: &str = "applet, base, basefont, bgsound, button, embed, frame, frameset, \
     head, iframe, isindex, link, meta, noscript, object, optgroup, option, param, \
     plaintext, script, select, style, textarea, title, xml";

/// Elements replaced by their content.
const UNWRAPPED_ELEMENTS: &str =
    "html, body, blink, dir, fieldset, form, ilayer, label, layer, legend, marquee, menu, noframes";

/// Attributes never allowed on ENML elements.
const REMOVED_ATTRIBUTES: &[&str] = &["id", "class", "accesskey", "data", "dynsrc", "tabindex"];

static PROLOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(<\?xml[^>]*\?>\s*)?(<!DOCTYPE[^>]*>\s*)?").expect("valid prolog regex")
});

static SELF_CLOSING_EN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(en-media|en-todo)\b([^>]*?)\s*/>").expect("valid en-* regex")
});

static VOID_ELEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(br|hr|img|col|area|wbr)\b([^>]*?)\s*/?>")
        .expect("valid void element regex")
});

static EMPTY_EN_NOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<en-note\b([^>]*?)\s*/>").expect("valid empty en-note regex")
});

static EN_NOTE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<en-note\b[^>]*>").expect("valid en-note regex"));

static MEDIA_HASH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<en-media\b[^>]*?\bhash\s*=\s*["']([0-9a-f]+)["']"#)
        .expect("valid en-media regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

/// Where an `<en-media>` element points once the note is rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLink {
    /// URL or archive-relative path of the resource
    pub href: String,
    /// MIME type of the resource
    pub mime_type: String,
    /// Human readable name, used as link text for non-images
    pub name: String,
}

impl MediaLink {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// HTML produced from ENML, plus the media hashes it referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHtml {
    /// HTML fragment, rooted at `<div class="en-note">`
    pub html: String,
    /// Hashes of every `<en-media>` element, in document order
    pub referenced_hashes: Vec<String>,
    /// Hashes the resolver did not know about
    pub missing_hashes: Vec<String>,
}

/// Wraps an ENML body in the header and `<en-note>` root.
pub fn wrap_enml(body: &str) -> String {
    format!("{}<en-note>{}</en-note>", ENML_HEADER, body)
}

/// Rewrites a self-closing `<en-note/>` root into an open and close pair.
pub fn expand_empty_root(enml: &str) -> String {
    EMPTY_EN_NOTE_RE
        .replace(enml, "<en-note${1}></en-note>")
        .into_owned()
}

/// Checks that a string looks like an ENML document.
///
/// A self-closing `<en-note/>` root is accepted as an empty note.
pub fn validate_enml(enml: &str) -> Result<()> {
    if EMPTY_EN_NOTE_RE.is_match(enml) {
        return Ok(());
    }
    if !EN_NOTE_OPEN_RE.is_match(enml) {
        return Err(NoteError::InvalidContent {
            message: "missing <en-note> root element".to_string(),
        });
    }
    if !enml.to_ascii_lowercase().contains("</en-note>") {
        return Err(NoteError::InvalidContent {
            message: "unterminated <en-note> root element".to_string(),
        });
    }
    Ok(())
}

/// Escapes plain text into an ENML body, one `<div>` per line.
pub fn plain_text_to_enml_body(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                "<div><br/></div>".to_string()
            } else {
                format!("<div>{}</div>", html_escape::encode_text(line))
            }
        })
        .collect()
}

/// Renders Markdown to HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

/// Strips everything ENML forbids from an HTML document and returns an ENML
/// body (the part that goes inside `<en-note>`).
///
/// Check box inputs survive as `<en-todo>`; every other form control, script
/// and embedded frame is removed with its content.
pub fn sanitize_html_to_enml_body(html: &str) -> Result<String> {
    let html = PROLOG_RE.replace(html, "");

    let sanitized = rewrite(
        &html,
        Settings {
            element_content_handlers: vec![
                element!("input", |el| {
                    let is_checkbox = el
                        .get_attribute("type")
                        .is_some_and(|t| t.eq_ignore_ascii_case("checkbox"));
                    if is_checkbox {
                        let checked = el.has_attribute("checked");
                        el.replace(
                            &format!(r#"<en-todo checked="{}"/>"#, checked),
                            ContentType::Html,
                        );
                    } else {
                        el.remove();
                    }
                    Ok(())
                }),
                element!(REMOVED_ELEMENTS, |el| {
                    trace!("Dropping <{}> from sanitized HTML", el.tag_name());
                    el.remove();
                    Ok(())
                }),
                element!(UNWRAPPED_ELEMENTS, |el| {
                    el.remove_and_keep_content();
                    Ok(())
                }),
                element!("*", |el| {
                    for name in REMOVED_ATTRIBUTES {
                        el.remove_attribute(name);
                    }
                    strip_scripted_attributes(el);
                    Ok(())
                }),
            ],
            document_content_handlers: vec![doc_comments!(|comment| {
                comment.remove();
                Ok(())
            })],
            strict: false,
            ..Settings::default()
        },
    )?;

    Ok(close_void_elements(sanitized.trim()))
}

/// Converts an ENML document into displayable HTML.
///
/// `resolve` maps a media hash to the place the rendered page should load it
/// from. Hashes it cannot resolve are rendered as an empty placeholder and
/// reported in [`RenderedHtml::missing_hashes`].
pub fn enml_to_html<F>(enml: &str, mut resolve: F) -> Result<RenderedHtml>
where
    F: FnMut(&str) -> Option<MediaLink>,
{
    validate_enml(enml)?;

    let body = expand_empty_root(&PROLOG_RE.replace(enml, ""));
    let body = SELF_CLOSING_EN_RE.replace_all(&body, "<${1}${2}></${1}>");

    let mut referenced_hashes = Vec::new();
    let mut missing_hashes = Vec::new();

    let html = rewrite(
        &body,
        Settings {
            element_content_handlers: vec![
                // ENML taken as is may still carry script
                element!(REMOVED_ELEMENTS, |el| {
                    debug!("Dropping <{}> from rendered ENML", el.tag_name());
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    strip_scripted_attributes(el);
                    Ok(())
                }),
                element!("en-note", |el| {
                    el.set_tag_name("div")?;
                    el.set_attribute("class", "en-note")?;
                    Ok(())
                }),
                element!("en-media", |el| {
                    let hash = el
                        .get_attribute("hash")
                        .unwrap_or_default()
                        .to_ascii_lowercase();
                    let replacement = match resolve(&hash) {
                        Some(link) => media_html(&link, el.get_attribute("style").as_deref()),
                        None => {
                            warn!("No resource attached for media hash {}", hash);
                            missing_hashes.push(hash.clone());
                            format!(
                                r#"<span class="en-media-missing" data-hash="{}"></span>"#,
                                html_escape::encode_double_quoted_attribute(&hash)
                            )
                        }
                    };
                    referenced_hashes.push(hash);
                    el.replace(&replacement, ContentType::Html);
                    Ok(())
                }),
                element!("en-todo", |el| {
                    let checked = el
                        .get_attribute("checked")
                        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
                    let input = if checked {
                        r#"<input type="checkbox" disabled="disabled" checked="checked"/>"#
                    } else {
                        r#"<input type="checkbox" disabled="disabled"/>"#
                    };
                    el.replace(input, ContentType::Html);
                    Ok(())
                }),
                element!("en-crypt", |el| {
                    el.replace(
                        r#"<span class="en-crypt">[encrypted content]</span>"#,
                        ContentType::Html,
                    );
                    Ok(())
                }),
            ],
            strict: false,
            ..Settings::default()
        },
    )?;

    debug!(
        "Rendered ENML to {} bytes of HTML ({} media references)",
        html.len(),
        referenced_hashes.len()
    );

    Ok(RenderedHtml {
        html: html.trim().to_string(),
        referenced_hashes,
        missing_hashes,
    })
}

/// Hashes referenced by `<en-media>` elements, in document order.
pub fn media_hashes(enml: &str) -> Vec<String> {
    MEDIA_HASH_RE
        .captures_iter(enml)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}

/// Text left in an ENML document once every tag is removed.
pub fn enml_text(enml: &str) -> String {
    let body = PROLOG_RE.replace(enml, "");
    let text = TAG_RE.replace_all(&body, " ");
    html_escape::decode_html_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn media_html(link: &MediaLink, style: Option<&str>) -> String {
    let href = html_escape::encode_double_quoted_attribute(&link.href);
    let style = style
        .map(|s| format!(r#" style="{}""#, html_escape::encode_double_quoted_attribute(s)))
        .unwrap_or_default();

    if link.is_image() {
        format!(
            r#"<img src="{}" alt="{}"{}/>"#,
            href,
            html_escape::encode_double_quoted_attribute(&link.name),
            style
        )
    } else {
        format!(
            r#"<a class="en-attachment" href="{}" type="{}"{}>{}</a>"#,
            href,
            html_escape::encode_double_quoted_attribute(&link.mime_type),
            style,
            html_escape::encode_text(&link.name)
        )
    }
}

/// Drops event handler attributes and `javascript:` links.
fn strip_scripted_attributes(el: &mut Element<'_, '_>) {
    let handlers: Vec<String> = el
        .attributes()
        .iter()
        .map(|attr| attr.name())
        .filter(|name| name.starts_with("on"))
        .collect();
    for name in handlers {
        el.remove_attribute(&name);
    }

    for attr in ["href", "src"] {
        let scripted = el.get_attribute(attr).is_some_and(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("javascript:")
        });
        if scripted {
            el.remove_attribute(attr);
        }
    }
}

fn close_void_elements(html: &str) -> String {
    VOID_ELEMENT_RE.replace_all(html, "<${1}${2}/>").into_owned()
}

fn rewrite(input: &str, settings: Settings<'_, '_>) -> Result<String> {
    let mut output = Vec::with_capacity(input.len());
    let mut rewriter = HtmlRewriter::new(settings, |chunk: &[u8]| output.extend_from_slice(chunk));

    rewriter.write(input.as_bytes())?;
    rewriter.end()?;

    String::from_utf8(output).map_err(|e| NoteError::Rewrite {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(hash: &str, mime: &str) -> MediaLink {
        MediaLink {
            href: format!("resources/{}.bin", hash),
            mime_type: mime.to_string(),
            name: "file".to_string(),
        }
    }

    #[test]
    fn plain_text_is_escaped_line_by_line() {
        let body = plain_text_to_enml_body("a < b\n\nend");
        assert_eq!(body, "<div>a &lt; b</div><div><br/></div><div>end</div>");
    }

    #[test]
    fn sanitizer_drops_scripts_and_handlers() {
        let body = sanitize_html_to_enml_body(
            r#"<html><head><title>x</title></head><body><p id="p1" class="c" onclick="evil()">Hi<script>alert(1)</script></p><a href="javascript:void(0)">x</a></body></html>"#,
        )
        .unwrap();

        assert_eq!(body, "<p>Hi</p><a>x</a>");
    }

    #[test]
    fn sanitizer_turns_checkboxes_into_todos() {
        let body = sanitize_html_to_enml_body(
            r#"<ul><li><input type="checkbox" checked disabled>done</li><li><input type="text" value="x">text</li></ul>"#,
        )
        .unwrap();

        assert!(body.contains(r#"<en-todo checked="true"/>done"#));
        assert!(!body.contains("<input"));
    }

    #[test]
    fn sanitizer_closes_void_elements() {
        let body = sanitize_html_to_enml_body("<p>a<br>b</p><hr><img src=\"x.png\">").unwrap();
        assert_eq!(body, r#"<p>a<br/>b</p><hr/><img src="x.png"/>"#);
    }

    #[test]
    fn sanitizer_strips_comments() {
        let body = sanitize_html_to_enml_body("<p>a<!-- hidden -->b</p>").unwrap();
        assert_eq!(body, "<p>ab</p>");
    }

    #[test]
    fn markdown_task_list_becomes_todos() {
        let html = markdown_to_html("- [x] ship\n- [ ] test\n");
        let body = sanitize_html_to_enml_body(&html).unwrap();
        assert!(body.contains(r#"<en-todo checked="true"/>"#));
        assert!(body.contains(r#"<en-todo checked="false"/>"#));
    }

    #[test]
    fn renders_en_note_root_as_div() {
        let rendered = enml_to_html(&wrap_enml("<div>hello</div>"), |_| None).unwrap();
        assert_eq!(rendered.html, r#"<div class="en-note"><div>hello</div></div>"#);
        assert!(rendered.referenced_hashes.is_empty());
    }

    #[test]
    fn renders_images_and_attachments() {
        let enml = wrap_enml(concat!(
            r#"<en-media type="image/png" hash="aa"/>"#,
            r#"<en-media type="application/pdf" hash="bb" />"#
        ));
        let rendered = enml_to_html(&enml, |hash| match hash {
            "aa" => Some(link("aa", "image/png")),
            "bb" => Some(link("bb", "application/pdf")),
            _ => None,
        })
        .unwrap();

        assert!(rendered.html.contains(r#"<img src="resources/aa.bin" alt="file"/>"#));
        assert!(rendered
            .html
            .contains(r#"<a class="en-attachment" href="resources/bb.bin" type="application/pdf">file</a>"#));
        assert_eq!(rendered.referenced_hashes, vec!["aa", "bb"]);
        assert!(rendered.missing_hashes.is_empty());
    }

    #[test]
    fn unknown_media_becomes_placeholder() {
        let enml = wrap_enml(r#"<p>before</p><en-media type="image/png" hash="cc"/><p>after</p>"#);
        let rendered = enml_to_html(&enml, |_| None).unwrap();

        assert!(rendered.html.contains(r#"<span class="en-media-missing" data-hash="cc"></span>"#));
        assert!(rendered.html.contains("<p>after</p>"));
        assert_eq!(rendered.missing_hashes, vec!["cc"]);
    }

    #[test]
    fn renders_todos_and_crypt() {
        let enml = wrap_enml(concat!(
            r#"<div><en-todo checked="true"/>a</div>"#,
            r#"<div><en-todo/>b</div>"#,
            r#"<en-crypt hint="pw">BASE64DATA</en-crypt>"#
        ));
        let rendered = enml_to_html(&enml, |_| None).unwrap();

        assert!(rendered
            .html
            .contains(r#"<input type="checkbox" disabled="disabled" checked="checked"/>a"#));
        assert!(rendered.html.contains(r#"<input type="checkbox" disabled="disabled"/>b"#));
        assert!(rendered.html.contains("[encrypted content]"));
        assert!(!rendered.html.contains("BASE64DATA"));
    }

    #[test]
    fn self_closing_root_is_an_empty_note() {
        let enml = format!("{}<en-note style=\"x\"/>", ENML_HEADER);
        assert!(validate_enml(&enml).is_ok());
        assert!(expand_empty_root(&enml).ends_with(r#"<en-note style="x"></en-note>"#));

        let rendered = enml_to_html(&enml, |_| None).unwrap();
        assert!(rendered.html.starts_with(r#"<div"#));
        assert!(rendered.html.ends_with("</div>"));
        assert!(rendered.html.contains(r#"class="en-note""#));
    }

    #[test]
    fn rendering_drops_script_from_enml() {
        let enml = wrap_enml(concat!(
            r#"<div onclick="steal()">safe</div>"#,
            r#"<script>alert(1)</script>"#,
            r#"<a href=" JavaScript:run()">link</a>"#,
            r#"<img src="javascript:x" onerror="steal()"/>"#,
            r#"<iframe src="https://example.com"></iframe>"#
        ));
        let rendered = enml_to_html(&enml, |_| None).unwrap();

        assert!(rendered.html.contains("<div>safe</div>"));
        assert!(rendered.html.contains("<a>link</a>"));
        assert!(!rendered.html.contains("script"));
        assert!(!rendered.html.contains("alert"));
        assert!(!rendered.html.contains("steal"));
        assert!(!rendered.html.contains("iframe"));
        assert!(!rendered.html.to_ascii_lowercase().contains("javascript"));
    }

    #[test]
    fn rejects_documents_without_root() {
        let err = enml_to_html("<div>loose</div>", |_| None).unwrap_err();
        assert!(matches!(err, NoteError::InvalidContent { .. }));
    }

    #[test]
    fn extracts_media_hashes_in_order() {
        let enml = wrap_enml(r#"<en-media hash="B2" type="image/png"/><en-media type="x" hash="a1"/>"#);
        assert_eq!(media_hashes(&enml), vec!["b2", "a1"]);
    }

    #[test]
    fn text_ignores_markup() {
        let enml = wrap_enml("<div>Hello&amp;</div><div><b>world</b></div>");
        assert_eq!(enml_text(&enml), "Hello& world");
    }
}
