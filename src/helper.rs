use std::{fs, path::Path};

use log::{debug, error, info, trace, LevelFilter};

use crate::{Note, Result};

/// Known MIME types keyed by lowercase file extension.
const MIME_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("json", "application/json"),
    ("zip", "application/zip"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("m4a", "audio/mp4"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
];

/// Sets up env_logger for the binary.
pub fn initialize_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    builder.format_timestamp_secs().format_module_path(true);
    if verbose {
        builder.filter_module("notekit", LevelFilter::Debug);
    }
    // try_init so repeated calls (tests, embedding) do not panic
    if builder.try_init().is_ok() {
        info!("Logger initialized");
    }
}

// Helper method for parsing tags
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Guesses a MIME type from a file extension.
pub fn guess_mime_type(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| mime.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Extension used for a MIME type when writing resources to disk.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(_, mime)| *mime == essence)
        .map(|(ext, _)| *ext)
        .unwrap_or("bin")
}

/// Helper method to load a single note from a JSON file
pub fn load_note_from_file(path: &Path) -> Result<Note> {
    debug!("Loading note from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open note file {}: {}", path.display(), e);
        e
    })?;

    let note: Note = serde_json::from_str(&content)?;
    trace!("Successfully loaded note: {:?}", note.title());
    Ok(note)
}

/// Writes a note as pretty JSON
pub fn save_note_to_file(note: &Note, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(note)?;
    fs::write(path, json)?;
    debug!("Saved note {:?} to {}", note.title(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoteContent, Resource};
    use std::path::PathBuf;

    #[test]
    fn parse_tags_trims_and_skips_empty() {
        assert_eq!(
            parse_tags(Some(" work, ,rust ,".to_string())),
            vec!["work".to_string(), "rust".to_string()]
        );
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn mime_guessing_is_case_insensitive() {
        assert_eq!(guess_mime_type(&PathBuf::from("a/B.JPG")), "image/jpeg");
        assert_eq!(guess_mime_type(&PathBuf::from("noext")), "application/octet-stream");
    }

    #[test]
    fn extension_ignores_parameters() {
        assert_eq!(extension_for_mime("text/html; charset=utf-8"), "html");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/x-unknown"), "bin");
    }

    #[test]
    fn note_file_round_trip_keeps_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.json");

        let mut note = Note::with_content("Groceries", NoteContent::from_plain_text("milk"));
        note.set_tag_names(vec!["home".to_string()]);
        note.add_resource(Resource::new(vec![1, 2, 3], "image/png"));
        save_note_to_file(&note, &path).unwrap();

        let loaded = load_note_from_file(&path).unwrap();
        assert_eq!(loaded, note);
    }
}
