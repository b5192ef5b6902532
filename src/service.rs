//! Mapping between [`Note`] and the note shape exchanged with the service.
//!
//! Upload and download clients live outside this crate; they send and
//! receive [`ServiceNote`] values and use the conversions here.
use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{Note, NoteContent, NoteError, Resource, Result};

/// Maximum title length accepted by the service, in characters.
pub const NOTE_TITLE_MAX_LEN: usize = 255;

/// Maximum tag name length accepted by the service, in characters.
pub const TAG_NAME_MAX_LEN: usize = 100;

/// Title used when a note is uploaded without one.
pub const UNTITLED_NOTE_TITLE: &str = "Untitled Note";

/// Reminder and provenance attributes of a service note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteAttributes {
    /// Set when the note is a reminder; milliseconds since the epoch
    pub reminder_order: Option<i64>,
    pub reminder_time: Option<i64>,
    pub reminder_done_time: Option<i64>,
    pub source_url: Option<String>,
}

/// A resource as carried by a service note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResource {
    #[serde(with = "crate::resource::hex_bytes")]
    pub body: Vec<u8>,
    pub mime: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    /// Hex hash of `body`
    #[serde(default)]
    pub body_hash: String,
}

/// The note shape an upload client sends and a download client receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceNote {
    pub guid: Option<String>,
    pub title: String,
    /// ENML document
    pub content: String,
    pub tag_guids: Vec<String>,
    pub tag_names: Vec<String>,
    pub resources: Vec<ServiceResource>,
    pub attributes: NoteAttributes,
}

impl From<&Resource> for ServiceResource {
    fn from(resource: &Resource) -> Self {
        ServiceResource {
            body: resource.data().to_vec(),
            mime: resource.mime_type().to_string(),
            file_name: resource.filename().map(str::to_string),
            source_url: resource.source_url().map(str::to_string),
            body_hash: resource.data_hash(),
        }
    }
}

impl From<ServiceResource> for Resource {
    fn from(service: ServiceResource) -> Self {
        let mut resource = Resource::new(service.body, service.mime);
        if let Some(name) = service.file_name {
            resource = resource.with_filename(name);
        }
        if let Some(url) = service.source_url {
            resource = resource.with_source_url(url);
        }
        resource
    }
}

/// Trims a title and fits it to the service limits.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return UNTITLED_NOTE_TITLE.to_string();
    }
    if trimmed.chars().count() <= NOTE_TITLE_MAX_LEN {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(NOTE_TITLE_MAX_LEN).collect();
    truncated.trim_end().to_string()
}

/// Checks one tag name against the service limits and returns it trimmed.
pub fn validate_tag_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();
    if length == 0 || length > TAG_NAME_MAX_LEN || trimmed.contains(',') {
        return Err(NoteError::InvalidTag {
            name: name.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Valid, trimmed tag names with case-insensitive duplicates removed.
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        match validate_tag_name(name) {
            Ok(tag) => {
                let duplicate = normalized
                    .iter()
                    .any(|existing| existing.to_lowercase() == tag.to_lowercase());
                if !duplicate {
                    normalized.push(tag);
                }
            }
            Err(e) => warn!("Skipping tag: {}", e),
        }
    }
    normalized
}

impl Note {
    /// Builds the note an upload client sends.
    pub fn to_service_note(&self) -> ServiceNote {
        let reminder_order = self
            .is_reminder()
            .then(|| Utc::now().timestamp_millis());

        let service = ServiceNote {
            guid: None,
            title: normalize_title(self.title()),
            content: self.content().enml().to_string(),
            tag_guids: Vec::new(),
            tag_names: normalize_tag_names(self.tag_names()),
            resources: self.resources().iter().map(ServiceResource::from).collect(),
            attributes: NoteAttributes {
                reminder_order,
                ..NoteAttributes::default()
            },
        };
        debug!(
            "Prepared {:?} for upload with {} tag(s) and {} resource(s)",
            service.title,
            service.tag_names.len(),
            service.resources.len()
        );
        service
    }

    /// Builds a note from a downloaded service note.
    ///
    /// Tag names and resources are left empty even when the service note
    /// carries them; callers that want the resources attach them with
    /// [`Note::add_resource`].
    pub fn from_service_note(service: ServiceNote) -> Result<Note> {
        let content = if service.content.trim().is_empty() {
            NoteContent::default()
        } else {
            NoteContent::from_enml(service.content)?
        };

        let mut note = Note::with_content(service.title, content);
        note.set_is_reminder(service.attributes.reminder_order.is_some());
        Ok(note)
    }
}
