//! The note data holder.
//!
//! A [`Note`] is a fully specified note: it does not point at any note on the
//! service. Build one to upload, or get one back from a download.
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::{
    ArchiveConfig, GenerateWebArchiveDataCompletion, NoteContent, NoteError, Resource, Result,
    WebArchiveBuilder, WebArchiveData,
};

/// Represents a single note in our system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Note {
    /// Note title
    title: String,
    /// Note content as ENML
    content: NoteContent,
    /// Names of the tags to attach on upload. Not filled in by downloads.
    tag_names: Vec<String>,
    /// Whether the note is a reminder
    is_reminder: bool,
    /// Attached resources, in attach order
    resources: Vec<Resource>,
}

impl Note {
    /// Creates an empty note
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a note with the given title and content
    pub fn with_content(title: impl Into<String>, content: NoteContent) -> Self {
        Note {
            title: title.into(),
            content,
            ..Self::default()
        }
    }

    /// The note title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Replaces the note title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// The note content as ENML
    pub fn content(&self) -> &NoteContent {
        &self.content
    }

    /// Mutable access to the content, for appending media or markup
    pub fn content_mut(&mut self) -> &mut NoteContent {
        &mut self.content
    }

    /// Replaces the note content
    pub fn set_content(&mut self, content: NoteContent) {
        self.content = content;
    }

    /// Tag names to attach on upload. If a tag with the name already exists
    /// on the service it is reused, otherwise it is created; that resolution
    /// is done by the upload client, see [`crate::resolve_tag_names`].
    pub fn tag_names(&self) -> &[String] {
        &self.tag_names
    }

    /// Replaces the tag names to attach on upload
    pub fn set_tag_names(&mut self, tag_names: Vec<String>) {
        self.tag_names = tag_names;
    }

    /// Whether the note is a reminder
    pub fn is_reminder(&self) -> bool {
        self.is_reminder
    }

    /// Marks the note as a reminder, or clears the mark
    pub fn set_is_reminder(&mut self, is_reminder: bool) {
        self.is_reminder = is_reminder;
    }

    /// The resources currently attached to this note.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Attaches a fully specified resource after the existing ones.
    pub fn add_resource(&mut self, resource: Resource) {
        debug!(
            "Attaching {} resource ({} bytes) to note {:?}",
            resource.mime_type(),
            resource.size(),
            self.title
        );
        self.resources.push(resource);
    }

    /// Removes all resources currently attached.
    pub fn remove_all_resources(&mut self) {
        self.resources.clear();
    }

    /// Renders the content into a web archive that an embedded web view can
    /// load with [`crate::WEB_ARCHIVE_DATA_MIME_TYPE`].
    ///
    /// Only locally held content and resources are used, so this can be
    /// awaited directly without a progress indicator.
    pub async fn generate_web_archive_data(&self) -> Result<WebArchiveData> {
        self.generate_web_archive_data_with(&ArchiveConfig::default())
            .await
    }

    /// [`Note::generate_web_archive_data`] with explicit archive settings.
    pub async fn generate_web_archive_data_with(
        &self,
        config: &ArchiveConfig,
    ) -> Result<WebArchiveData> {
        self.build_web_archive_data(config)
    }

    fn build_web_archive_data(&self, config: &ArchiveConfig) -> Result<WebArchiveData> {
        WebArchiveBuilder::new(config, &self.title, &self.content, &self.resources).build()
    }

    /// Snapshots the note and generates its web archive on the tokio runtime.
    ///
    /// The returned handle resolves exactly once. Must be called from within
    /// a runtime.
    pub fn spawn_web_archive_data(
        &self,
        config: ArchiveConfig,
    ) -> tokio::task::JoinHandle<Result<WebArchiveData>> {
        let snapshot = self.clone();
        tokio::spawn(async move { snapshot.generate_web_archive_data_with(&config).await })
    }

    /// Callback flavour of [`Note::spawn_web_archive_data`].
    ///
    /// Works with or without a tokio runtime. Inside one, generation runs as
    /// a task and `completion` runs on a runtime worker; outside, both run on
    /// a dedicated thread. `completion` runs once when generation succeeds.
    /// Failures are logged and the callback is not invoked.
    pub fn generate_web_archive_data_then(&self, completion: GenerateWebArchiveDataCompletion) {
        let title = self.title.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = self.spawn_web_archive_data(ArchiveConfig::default());
                runtime.spawn(async move {
                    complete(&title, join_archive_task(handle).await, completion);
                });
            }
            Err(_) => {
                debug!("No tokio runtime, generating archive for {:?} on a thread", title);
                let snapshot = self.clone();
                std::thread::spawn(move || {
                    let result = snapshot.build_web_archive_data(&ArchiveConfig::default());
                    complete(&title, result, completion);
                });
            }
        }
    }
}

fn complete(
    title: &str,
    result: Result<WebArchiveData>,
    completion: GenerateWebArchiveDataCompletion,
) {
    match result {
        Ok(data) => completion(data),
        Err(e) => error!("Web archive generation for {:?} failed: {}", title, e),
    }
}

/// Awaits a spawned generation task, folding join failures into [`NoteError`].
pub async fn join_archive_task(
    handle: tokio::task::JoinHandle<Result<WebArchiveData>>,
) -> Result<WebArchiveData> {
    handle.await.map_err(|e| NoteError::TaskFailed {
        message: e.to_string(),
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WEB_ARCHIVE_DATA_MIME_TYPE;
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };
    use tokio::sync::oneshot;

    fn resource(n: u8) -> Resource {
        Resource::new(vec![n; 3], "application/octet-stream")
    }

    #[test]
    fn new_note_is_empty() {
        let note = Note::new();
        assert!(note.resources().is_empty());
        assert!(note.tag_names().is_empty());
        assert!(!note.is_reminder());
        assert_eq!(note.title(), "");
        assert!(note.content().is_empty());
    }

    #[test]
    fn resources_keep_call_order() {
        let mut note = Note::new();
        for n in 0..5 {
            note.add_resource(resource(n));
        }
        // no de-duplication
        note.add_resource(resource(0));

        assert_eq!(note.resources().len(), 6);
        let firsts: Vec<u8> = note.resources().iter().map(|r| r.data()[0]).collect();
        assert_eq!(firsts, vec![0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn remove_all_resources_is_idempotent() {
        let mut note = Note::new();
        note.remove_all_resources();
        assert!(note.resources().is_empty());

        note.add_resource(resource(1));
        note.add_resource(resource(2));
        note.remove_all_resources();
        assert!(note.resources().is_empty());
        note.remove_all_resources();
        assert!(note.resources().is_empty());
    }

    #[test]
    fn tag_names_round_trip() {
        let mut note = Note::new();
        let tags = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        note.set_tag_names(tags.clone());
        assert_eq!(note.tag_names(), tags.as_slice());

        note.set_tag_names(Vec::new());
        assert!(note.tag_names().is_empty());
    }

    #[test]
    fn reminder_toggles() {
        let mut note = Note::new();
        assert!(!note.is_reminder());
        note.set_is_reminder(true);
        assert!(note.is_reminder());
        note.set_is_reminder(false);
        assert!(!note.is_reminder());
    }

    #[test]
    fn title_and_content_setters() {
        let mut note = Note::new();
        note.set_title("Plans");
        note.set_content(NoteContent::from_plain_text("step one"));
        note.content_mut().append_enml("<div>step two</div>");

        assert_eq!(note.title(), "Plans");
        assert_eq!(note.content().plain_text(), "step one step two");
    }

    #[tokio::test]
    async fn generates_archive_for_minimal_content() {
        let note = Note::with_content("Hi", NoteContent::from_plain_text("hello"));
        let data = note.generate_web_archive_data().await.unwrap();

        assert_eq!(data.mime_type(), WEB_ARCHIVE_DATA_MIME_TYPE);
        assert!(!data.is_empty());
        assert!(data.open().unwrap().main_html().contains("hello"));
    }

    #[tokio::test]
    async fn spawned_generation_uses_snapshot() {
        let mut note = Note::with_content("Snap", NoteContent::from_plain_text("before"));
        let handle = note.spawn_web_archive_data(ArchiveConfig::default());
        note.set_content(NoteContent::from_plain_text("after"));

        let data = join_archive_task(handle).await.unwrap();
        let html = data.open().unwrap().main_html().to_string();
        assert!(html.contains("before"));
        assert!(!html.contains("after"));
    }

    #[tokio::test]
    async fn callback_runs_exactly_once() {
        let note = Note::with_content("Cb", NoteContent::from_plain_text("x"));
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        let counter = Arc::clone(&calls);
        note.generate_web_archive_data_then(Box::new(move |data| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(data);
        }));

        let data = rx.await.unwrap();
        assert_eq!(data.mime_type(), WEB_ARCHIVE_DATA_MIME_TYPE);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_works_without_runtime() {
        let note = Note::with_content("Plain", NoteContent::from_plain_text("no runtime"));
        let (tx, rx) = std::sync::mpsc::channel();

        note.generate_web_archive_data_then(Box::new(move |data| {
            let _ = tx.send(data);
        }));

        let data = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(data.open().unwrap().main_html().contains("no runtime"));
        // the sender is dropped after the single call
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn json_round_trip() {
        let mut note = Note::with_content("J", NoteContent::from_plain_text("body"));
        note.set_is_reminder(true);
        note.add_resource(resource(7));

        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn missing_json_fields_default() {
        let note: Note = serde_json::from_str(r#"{"title": "only title"}"#).unwrap();
        assert_eq!(note.title(), "only title");
        assert!(note.resources().is_empty());
        assert!(!note.is_reminder());
    }
}
