//! Self-contained web archives of a note.
//!
//! A web archive is a single zip container holding the rendered HTML page
//! and every resource it loads, so an embedded web view can display a note
//! without touching the network. Entries are written with fixed timestamps
//! and in a fixed order, so the same note always yields the same bytes.
use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    io::{Cursor, Read, Write},
    path::Path,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::{
    content::{media_link, resource_entry_path},
    ArchivableContent, ArchiveConfig, NoteError, Resource, Result,
};

/// MIME type of the data produced by web archive generation.
pub const WEB_ARCHIVE_DATA_MIME_TYPE: &str = "application/x-webarchive+zip";

/// Name of the manifest entry inside an archive.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Layout version written into the manifest.
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

const DEFAULT_STYLE: &str = "\
body { font-family: -apple-system, BlinkMacSystemFont, \"Segoe UI\", Roboto, sans-serif; \
line-height: 1.5; margin: 1rem; word-wrap: break-word; }
img { max-width: 100%; height: auto; }
.en-media-missing { display: inline-block; width: 1em; height: 1em; background: #ddd; }
.en-crypt { color: #888; font-style: italic; }
.en-attachments { border-top: 1px solid #ddd; margin-top: 1.5rem; padding-top: 0.5rem; }
";

/// The page an archive opens on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainResource {
    pub path: String,
    pub mime_type: String,
    pub text_encoding: String,
}

/// A resource entry the main page loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subresource {
    pub path: String,
    pub mime_type: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub size: u64,
    /// Whether the note content embeds the resource
    pub referenced: bool,
}

/// Table of contents stored as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub version: u32,
    pub title: String,
    pub main_resource: MainResource,
    pub subresources: Vec<Subresource>,
}

/// The finished archive blob.
#[derive(Clone, PartialEq, Eq)]
pub struct WebArchiveData {
    bytes: Vec<u8>,
}

impl WebArchiveData {
    /// Wraps bytes previously produced by [`WebArchiveBuilder::build`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        WebArchiveData { bytes }
    }

    /// Always [`WEB_ARCHIVE_DATA_MIME_TYPE`].
    pub fn mime_type(&self) -> &'static str {
        WEB_ARCHIVE_DATA_MIME_TYPE
    }

    /// The raw archive bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the data, returning the raw archive bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Size of the archive in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no bytes are held
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writes the archive to `path`, replacing any existing file atomically.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&self.bytes)?;
        temp.persist(path).map_err(|e| NoteError::Io(e.error))?;
        info!("Wrote {} byte web archive to {}", self.bytes.len(), path.display());
        Ok(())
    }

    /// Parses the archive back into its entries.
    pub fn open(&self) -> Result<WebArchive> {
        WebArchive::read(&self.bytes)
    }
}

impl fmt::Debug for WebArchiveData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebArchiveData")
            .field("mime_type", &self.mime_type())
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Assembles the archive for one piece of content and its resources.
pub struct WebArchiveBuilder<'a> {
    config: &'a ArchiveConfig,
    title: &'a str,
    content: &'a dyn ArchivableContent,
    resources: &'a [Resource],
}

impl<'a> WebArchiveBuilder<'a> {
    pub fn new(
        config: &'a ArchiveConfig,
        title: &'a str,
        content: &'a dyn ArchivableContent,
        resources: &'a [Resource],
    ) -> Self {
        Self {
            config,
            title,
            content,
            resources,
        }
    }

    pub fn build(&self) -> Result<WebArchiveData> {
        self.config.validate()?;

        // Identical attachments share one entry.
        let mut unique: Vec<(String, &Resource)> = Vec::with_capacity(self.resources.len());
        let mut seen = HashSet::new();
        for resource in self.resources {
            let hash = resource.data_hash();
            if seen.insert(hash.clone()) {
                unique.push((hash, resource));
            }
        }
        let by_hash: HashMap<&str, &Resource> =
            unique.iter().map(|(hash, r)| (hash.as_str(), *r)).collect();

        let resource_dir = self.config.resource_dir.as_str();
        let rendered = self.content.render_html(&mut |hash| {
            by_hash.get(hash).map(|r| media_link(r, resource_dir))
        })?;
        if !rendered.missing_hashes.is_empty() {
            warn!(
                "{} media reference(s) have no attached resource",
                rendered.missing_hashes.len()
            );
        }

        let referenced: HashSet<&str> = rendered
            .referenced_hashes
            .iter()
            .map(String::as_str)
            .collect();
        let unreferenced: Vec<&Resource> = unique
            .iter()
            .filter(|(hash, _)| !referenced.contains(hash.as_str()))
            .map(|(_, r)| *r)
            .collect();

        let page = self.page(&rendered.html, &unreferenced);

        let method = if self.config.compress {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        let options = SimpleFileOptions::default()
            .compression_method(method)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        zip.start_file(self.config.main_document.as_str(), options)?;
        zip.write_all(page.as_bytes())?;

        let mut subresources = Vec::with_capacity(unique.len());
        for (hash, resource) in &unique {
            let path = resource_entry_path(resource, resource_dir);
            zip.start_file(path.as_str(), options)?;
            zip.write_all(resource.data())?;

            subresources.push(Subresource {
                path,
                mime_type: resource.mime_type().to_string(),
                hash: hash.clone(),
                filename: resource.filename().map(str::to_string),
                source_url: resource.source_url().map(str::to_string),
                size: resource.size() as u64,
                referenced: referenced.contains(hash.as_str()),
            });
        }

        let manifest = ArchiveManifest {
            version: ARCHIVE_FORMAT_VERSION,
            title: self.title.to_string(),
            main_resource: MainResource {
                path: self.config.main_document.clone(),
                mime_type: "text/html".to_string(),
                text_encoding: "UTF-8".to_string(),
            },
            subresources,
        };
        zip.start_file(MANIFEST_ENTRY, options)?;
        zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

        let bytes = zip.finish()?.into_inner();
        debug!(
            "Built web archive for {:?}: {} bytes, {} subresources",
            self.title,
            bytes.len(),
            manifest.subresources.len()
        );

        Ok(WebArchiveData { bytes })
    }

    fn page(&self, body: &str, unreferenced: &[&Resource]) -> String {
        let mut style = String::new();
        if self.config.include_default_style {
            style.push_str(DEFAULT_STYLE);
        }
        if let Some(extra) = &self.config.extra_css {
            style.push_str(extra);
            style.push('\n');
        }

        let mut attachments = String::new();
        if self.config.list_unreferenced_resources && !unreferenced.is_empty() {
            attachments.push_str("<div class=\"en-attachments\"><ul>");
            for resource in unreferenced {
                let link = media_link(resource, &self.config.resource_dir);
                attachments.push_str(&format!(
                    r#"<li><a class="en-attachment" href="{}" type="{}">{}</a></li>"#,
                    html_escape::encode_double_quoted_attribute(&link.href),
                    html_escape::encode_double_quoted_attribute(&link.mime_type),
                    html_escape::encode_text(&link.name)
                ));
            }
            attachments.push_str("</ul></div>\n");
        }

        let style_block = if style.is_empty() {
            String::new()
        } else {
            format!("<style>\n{}</style>\n", style)
        };

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{}</title>\n{}</head>\n<body>\n{}\n{}</body>\n</html>\n",
            html_escape::encode_text(self.title),
            style_block,
            body,
            attachments
        )
    }
}

/// A web archive read back into memory.
#[derive(Debug, Clone)]
pub struct WebArchive {
    manifest: ArchiveManifest,
    main_html: String,
    entries: HashMap<String, Vec<u8>>,
}

impl WebArchive {
    /// Reads and checks an archive.
    pub fn read(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.insert(name, data);
        }

        let manifest_bytes = entries
            .remove(MANIFEST_ENTRY)
            .ok_or_else(|| NoteError::ArchiveFormat {
                message: format!("missing {}", MANIFEST_ENTRY),
            })?;
        let manifest: ArchiveManifest = serde_json::from_slice(&manifest_bytes)?;

        if manifest.version != ARCHIVE_FORMAT_VERSION {
            return Err(NoteError::ArchiveFormat {
                message: format!("unsupported archive version {}", manifest.version),
            });
        }

        let main_bytes = entries
            .remove(&manifest.main_resource.path)
            .ok_or_else(|| NoteError::ArchiveFormat {
                message: format!("missing main resource {}", manifest.main_resource.path),
            })?;
        let main_html = String::from_utf8(main_bytes).map_err(|e| NoteError::ArchiveFormat {
            message: format!("main resource is not UTF-8: {}", e),
        })?;

        for sub in &manifest.subresources {
            match entries.get(&sub.path) {
                Some(data) if data.len() as u64 == sub.size => {}
                Some(data) => {
                    return Err(NoteError::ArchiveFormat {
                        message: format!(
                            "{} is {} bytes, manifest says {}",
                            sub.path,
                            data.len(),
                            sub.size
                        ),
                    })
                }
                None => {
                    return Err(NoteError::ArchiveFormat {
                        message: format!("missing subresource {}", sub.path),
                    })
                }
            }
        }

        Ok(WebArchive {
            manifest,
            main_html,
            entries,
        })
    }

    /// Reads an archive file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(NoteError::FileNotFound {
                file_path: path.display().to_string(),
            });
        }
        Self::read(&fs::read(path)?)
    }

    /// The parsed `manifest.json`
    pub fn manifest(&self) -> &ArchiveManifest {
        &self.manifest
    }

    /// The main HTML document
    pub fn main_html(&self) -> &str {
        &self.main_html
    }

    /// A subresource by its archive path
    pub fn subresource(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    /// Looks a subresource up by the hash of its data.
    pub fn subresource_by_hash(&self, hash: &str) -> Result<&[u8]> {
        self.manifest
            .subresources
            .iter()
            .find(|sub| sub.hash == hash)
            .and_then(|sub| self.subresource(&sub.path))
            .ok_or_else(|| NoteError::ResourceNotFound {
                hash: hash.to_string(),
            })
    }
}
