//! Binary attachments carried by a note.
use std::{fmt, fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{guess_mime_type, NoteError, Result};

/// A binary attachment (image, document, audio...) associated with a note.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Raw bytes of the attachment
    #[serde(with = "hex_bytes")]
    data: Vec<u8>,
    /// MIME type of the data
    mime_type: String,
    /// Original file name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    /// Where the data was obtained from, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_url: Option<String>,
}

impl Resource {
    /// Creates a resource from raw bytes and a MIME type
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Resource {
            data: data.into(),
            mime_type: mime_type.into(),
            filename: None,
            source_url: None,
        }
    }

    /// Reads a file and guesses its MIME type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(NoteError::FileNotFound {
                file_path: path.display().to_string(),
            });
        }

        let data = fs::read(path)?;
        let mime_type = guess_mime_type(path);
        debug!(
            "Loaded resource {} ({} bytes, {})",
            path.display(),
            data.len(),
            mime_type
        );

        let mut resource = Resource::new(data, mime_type);
        resource.filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(resource)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }

    /// The raw bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// MIME type of the data
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Original file name, if known
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// URL the data was fetched from, if any
    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    /// Size of the data in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Lowercase hex SHA-256 of the data; content refers to resources by it.
    pub fn data_hash(&self) -> String {
        hex::encode(Sha256::digest(&self.data))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// The `<en-media>` element that embeds this resource in note content.
    pub fn media_tag(&self) -> String {
        format!(
            r#"<en-media type="{}" hash="{}"/>"#,
            html_escape::encode_double_quoted_attribute(&self.mime_type),
            self.data_hash()
        )
    }

    /// Name to show for the resource when it is rendered as a link.
    pub fn display_name(&self) -> String {
        self.filename
            .clone()
            .unwrap_or_else(|| format!("{}.{}", &self.data_hash()[..12], self.extension()))
    }

    /// File extension used when the resource is written into an archive.
    pub fn extension(&self) -> &str {
        crate::extension_for_mime(&self.mime_type)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("mime_type", &self.mime_type)
            .field("size", &self.data.len())
            .field("filename", &self.filename)
            .field("source_url", &self.source_url)
            .finish()
    }
}

/// Serializes byte buffers as lowercase hex strings.
pub(crate) mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(D::Error::custom)
    }
}
